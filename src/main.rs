//! Spread scanner entry point.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use strum::IntoEnumIterator;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spread_scanner::api::{create_router, AppState};
use spread_scanner::config::Config;
use spread_scanner::exchange::{build_adapter, SharedAdapter};
use spread_scanner::market::{ExchangeId, Instrument};
use spread_scanner::metrics;
use spread_scanner::network::{EnricherSettings, NetworkEnricher};
use spread_scanner::notify::LogPublisher;
use spread_scanner::poller::{HealthRegistry, PollOutcome, Poller, PollerHandle, PollerSettings};
use spread_scanner::scanner::{ArbitrageScanner, QueryFacade, ScanConfig};
use spread_scanner::spread::{FilterCriteria, SpreadCalculator};
use spread_scanner::store::QuoteStore;
use spread_scanner::utils::{format_percent, shutdown_signal, stopped};

/// Cross-exchange crypto spread scanner.
#[derive(Parser, Debug)]
#[command(name = "spread-scanner")]
#[command(about = "Polls exchange tickers and serves ranked cross-exchange spreads")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll exchanges and serve the HTTP API (default).
    Run {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// List supported exchanges and their poll intervals.
    ListExchanges,

    /// Poll every exchange once and print ranked spreads.
    Scan {
        /// Lowest spread percentage to print.
        #[arg(long, default_value = "0")]
        min_profit: Decimal,

        /// Lowest acceptable smaller-leg volume.
        #[arg(long, default_value = "0")]
        min_volume: Decimal,

        /// Rows to print.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only these instruments, e.g. BTC/USDT.
        #[arg(long, value_delimiter = ',')]
        pairs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // .env may carry RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("spread_scanner=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::ListExchanges) => cmd_list_exchanges(),
        Some(Command::Scan {
            min_profit,
            min_volume,
            limit,
            pairs,
        }) => cmd_scan(min_profit, min_volume, limit, pairs).await,
        Some(Command::Run { port }) => cmd_run(port.or(args.port)).await,
        None => cmd_run(args.port).await,
    }
}

/// Load and validate configuration.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

fn build_adapters(config: &Config) -> anyhow::Result<Vec<SharedAdapter>> {
    config
        .enabled_exchanges()
        .into_iter()
        .map(|id| build_adapter(id, config).with_context(|| format!("building {} adapter", id)))
        .collect()
}

fn build_pollers(
    config: &Config,
    adapters: &[SharedAdapter],
    store: &Arc<QuoteStore>,
    health: &HealthRegistry,
    pairs: Arc<[Instrument]>,
) -> anyhow::Result<Vec<Poller>> {
    let overrides: HashMap<ExchangeId, std::time::Duration> =
        config.interval_overrides().map_err(|e| anyhow::anyhow!(e))?;

    Ok(adapters
        .iter()
        .map(|adapter| {
            let settings = PollerSettings::from_config(config, adapter, &overrides, pairs.clone());
            Poller::new(adapter.clone(), store.clone(), health.clone(), settings)
        })
        .collect())
}

fn build_facade(
    config: &Config,
    adapters: &[SharedAdapter],
    store: Arc<QuoteStore>,
    health: HealthRegistry,
) -> Arc<QueryFacade> {
    let enricher = Arc::new(NetworkEnricher::new(
        adapters.iter().cloned(),
        EnricherSettings::from_config(config),
    ));
    Arc::new(QueryFacade::new(
        store,
        SpreadCalculator::new(config.quote_ttl()),
        enricher,
        health,
        config.max_concurrent_queries,
    ))
}

/// Main service: pollers, scanner and HTTP API until a signal or a poller failure.
async fn cmd_run(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;
    if let Some(port) = port_override {
        config.port = port;
    }

    // Initialize metrics
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;
    metrics::init_metrics();

    let pairs: Arc<[Instrument]> = config
        .poll_instruments()
        .map_err(|e| anyhow::anyhow!(e))?
        .into();
    let adapters = build_adapters(&config)?;
    let store = Arc::new(QuoteStore::new(adapters.iter().map(|a| a.id())));
    let health = HealthRegistry::new();

    info!(
        exchanges = ?store.exchanges(),
        pairs = pairs.len(),
        quote_ttl_secs = config.quote_ttl_secs,
        "Configuration loaded successfully"
    );

    let pollers = build_pollers(&config, &adapters, &store, &health, pairs)?;
    let facade = build_facade(&config, &adapters, store, health);

    let mut poll_handle = PollerHandle::spawn(pollers);
    info!(pollers = poll_handle.len(), "Pollers started");

    // Background scanner
    let scanner = ArbitrageScanner::new(
        facade.clone(),
        Arc::new(LogPublisher),
        ScanConfig::from_config(&config),
        config.scan_interval(),
    );
    let app_state = AppState::new(facade, scanner.config_handle()).with_prometheus(prometheus);
    let mut scanner_handle = tokio::spawn(scanner.run(poll_handle.subscribe()));

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);
    let mut server_shutdown = poll_handle.subscribe();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { stopped(&mut server_shutdown).await })
            .await
    });

    // Supervise until a signal or an early poller or scanner exit
    let mut failure = None;
    let mut scanner_done = false;
    tokio::select! {
        _ = shutdown_signal() => info!("Shutting down..."),
        Some(result) = poll_handle.join_next() => match result {
            Ok(exchange) => warn!(exchange = %exchange, "Poller exited unexpectedly"),
            Err(e) => {
                error!(error = %e, "Poller failed, shutting down");
                failure = Some(e);
            }
        },
        result = &mut scanner_handle => {
            scanner_done = true;
            match result {
                Ok(()) => warn!("Scanner exited unexpectedly"),
                Err(e) => {
                    error!(error = %e, "Scanner failed, shutting down");
                    failure = Some(e.into());
                }
            }
        }
    }

    let stopped_cleanly = poll_handle.shutdown().await;
    if !scanner_done {
        if let Err(e) = scanner_handle.await {
            warn!(error = %e, "Scanner task panicked");
        }
    }
    match server_handle.await {
        Ok(Err(e)) => warn!(error = %e, "HTTP server error"),
        Err(e) => warn!(error = %e, "HTTP server task panicked"),
        Ok(Ok(())) => {}
    }

    if let Some(e) = failure {
        return Err(e.into());
    }
    stopped_cleanly?;

    info!("Shutdown complete");
    Ok(())
}

fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("SPREAD SCANNER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let pairs = config.poll_instruments().map_err(|e| anyhow::anyhow!(e))?;
    let overrides = config.interval_overrides().map_err(|e| anyhow::anyhow!(e))?;

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!(
        "  Exchanges: {}",
        config
            .enabled_exchanges()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    if pairs.is_empty() {
        println!("  Pairs: all listed");
    } else {
        println!(
            "  Pairs: {}",
            pairs.iter().map(Instrument::symbol).collect::<Vec<_>>().join(", ")
        );
    }
    let signed: Vec<String> = config
        .enabled_exchanges()
        .into_iter()
        .filter(|id| config.credentials(*id).is_some())
        .map(|id| id.to_string())
        .collect();
    println!(
        "  Signed network info: {}",
        if signed.is_empty() { "none".to_string() } else { signed.join(", ") }
    );
    for (exchange, interval) in &overrides {
        println!("  Poll interval {}: {}ms", exchange, interval.as_millis());
    }
    println!("  Adapter timeout: {}ms", config.adapter_timeout_ms);
    println!("  Quote TTL: {}s", config.quote_ttl_secs);
    println!("  Degrade after: {} failures", config.degrade_after_failures);
    println!("  Network info TTL: {}s", config.network_info_ttl_secs);
    println!("  Max concurrent queries: {}", config.max_concurrent_queries);
    println!(
        "  Scanner: {} (every {}s, notify >= {})",
        if config.scanner_enabled { "Enabled" } else { "Disabled" },
        config.scan_interval_secs,
        format_percent(config.notify_threshold_percent)
    );
    println!("  Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

fn cmd_list_exchanges() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let enabled = config.enabled_exchanges();

    println!("{:<10} {:>12} {:>9}", "EXCHANGE", "INTERVAL", "ENABLED");
    for id in ExchangeId::iter() {
        let adapter = build_adapter(id, &config)?;
        println!(
            "{:<10} {:>10}ms {:>9}",
            id,
            adapter.default_poll_interval().as_millis(),
            if enabled.contains(&id) { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// One-shot: poll every adapter once, then print the ranked spreads.
async fn cmd_scan(
    min_profit: Decimal,
    min_volume: Decimal,
    limit: usize,
    pairs: Vec<String>,
) -> anyhow::Result<()> {
    let config = load_config()?;
    let instruments: Arc<[Instrument]> = config
        .poll_instruments()
        .map_err(|e| anyhow::anyhow!(e))?
        .into();
    let adapters = build_adapters(&config)?;
    let store = Arc::new(QuoteStore::new(adapters.iter().map(|a| a.id())));
    let health = HealthRegistry::new();
    let pollers = build_pollers(&config, &adapters, &store, &health, instruments)?;

    println!("Polling {} exchanges...", pollers.len());
    let outcomes = futures::future::join_all(pollers.into_iter().map(|mut poller| async move {
        let exchange = poller.exchange();
        (exchange, poller.poll_once().await)
    }))
    .await;

    for (exchange, outcome) in outcomes {
        match outcome? {
            PollOutcome::Published { quotes, .. } => println!("  {:<8} {} quotes", exchange, quotes),
            PollOutcome::Failed(e) => println!("  {:<8} FAILED: {}", exchange, e),
        }
    }

    let facade = build_facade(&config, &adapters, store, health);
    let criteria = FilterCriteria {
        pairs: (!pairs.is_empty()).then_some(pairs),
        min_profit_percent: Some(min_profit),
        min_volume: Some(min_volume),
        limit: Some(limit.max(1)),
        ..Default::default()
    };
    let opportunities = facade.best_spreads(&criteria).await?;

    println!("======================================================================");
    println!(
        "{:<4} {:<12} {:<8} {:>14} {:<8} {:>14} {:>9}",
        "#", "PAIR", "BUY", "ASK", "SELL", "BID", "SPREAD"
    );
    for (rank, opp) in opportunities.iter().enumerate() {
        println!(
            "{:<4} {:<12} {:<8} {:>14} {:<8} {:>14} {:>9}",
            rank + 1,
            opp.instrument.symbol(),
            opp.buy_exchange,
            opp.buy_price.normalize(),
            opp.sell_exchange,
            opp.sell_price.normalize(),
            format_percent(opp.spread_percentage)
        );
    }
    if opportunities.is_empty() {
        println!("No opportunities above {}", format_percent(min_profit));
    }
    println!("======================================================================");

    Ok(())
}
