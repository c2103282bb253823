//! Invariants that must hold for any market, checked over a generated one.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::OffsetDateTime;

use spread_scanner::market::{ExchangeId, Quote};
use spread_scanner::spread::{spread_percentage, FilterCriteria, SpreadOpportunity};

use crate::common::Harness;

const EXCHANGES: [ExchangeId; 4] = [
    ExchangeId::Bybit,
    ExchangeId::Kucoin,
    ExchangeId::Gateio,
    ExchangeId::Okx,
];

const PAIRS: [&str; 5] = ["BTC/USDT", "ETH/USDT", "SOL/USDT", "XRP/USDT", "DOGE/USDT"];

/// Deterministic market with a spread of prices and volumes per exchange.
async fn generated_market() -> Harness {
    let mut h = Harness::new(&EXCHANGES);
    for (e, &exchange) in EXCHANGES.iter().enumerate() {
        for (p, pair) in PAIRS.iter().enumerate() {
            let base = Decimal::from(100 * (p as i64 + 1));
            // Skew prices per exchange so both directions appear.
            let skew = Decimal::from(((e * 7 + p * 3) % 11) as i64) - dec!(5);
            let bid = base + skew;
            let ask = bid + dec!(0.5);
            let volume = Decimal::from(((e * 5 + p * 2) % 9 + 1) as i64);
            h.mock(exchange).set_quote(pair, bid, ask, volume);
        }
    }
    h.poll_all().await;
    h
}

fn assert_ranked(result: &[SpreadOpportunity]) {
    for pair in result.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let a_vol = a.buy_volume.min(a.sell_volume);
        let b_vol = b.buy_volume.min(b.sell_volume);
        assert!(
            a.spread_percentage > b.spread_percentage
                || (a.spread_percentage == b.spread_percentage
                    && (a_vol > b_vol || (a_vol == b_vol && a.instrument <= b.instrument))),
            "{} ranked before {}",
            a.id,
            b.id
        );
    }
}

#[tokio::test]
async fn every_opportunity_respects_the_filter() {
    let h = generated_market().await;

    let criteria = FilterCriteria {
        min_profit_percent: Some(dec!(0.5)),
        max_profit_percent: Some(dec!(4)),
        min_volume: Some(dec!(2)),
        ..Default::default()
    };
    let result = h.facade.best_spreads(&criteria).await.unwrap();
    assert!(!result.is_empty());

    for opp in &result {
        assert_ne!(opp.buy_exchange, opp.sell_exchange);
        assert_eq!(Some(opp.spread_percentage), spread_percentage(opp.buy_price, opp.sell_price));
        assert!(opp.spread_percentage >= dec!(0.5) && opp.spread_percentage <= dec!(4));
        assert!(opp.buy_volume.min(opp.sell_volume) >= dec!(2));
    }
    assert_ranked(&result);
}

#[tokio::test]
async fn unfiltered_results_are_positive_and_ranked() {
    let h = generated_market().await;

    let result = h.facade.best_spreads(&FilterCriteria::default()).await.unwrap();

    assert!(result.iter().all(|o| o.spread_percentage > Decimal::ZERO));
    assert_ranked(&result);
}

#[tokio::test]
async fn best_per_instrument_and_limit() {
    let h = generated_market().await;

    let all = h.facade.best_spreads(&FilterCriteria::default()).await.unwrap();
    let best = h
        .facade
        .best_spreads(&FilterCriteria {
            best_per_instrument: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let instruments: BTreeSet<_> = best.iter().map(|o| o.instrument.clone()).collect();
    assert_eq!(instruments.len(), best.len());
    assert_eq!(best[0], all[0]);

    let limited = h
        .facade
        .best_spreads(&FilterCriteria {
            limit: Some(3),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.as_slice(), &all[..3.min(all.len())]);
}

#[tokio::test]
async fn stale_quotes_never_appear() {
    let mut h = Harness::new(&[ExchangeId::Mexc, ExchangeId::Okx]);
    h.mock(ExchangeId::Mexc).set_quote("BTC/USDT", dec!(99), dec!(100), dec!(1));
    h.mock(ExchangeId::Okx).insert_quote(
        Quote::new(
            ExchangeId::Okx,
            "BTC/USDT".parse().unwrap(),
            dec!(110),
            dec!(111),
            dec!(1),
        )
        .observed_at(OffsetDateTime::now_utc() - time::Duration::minutes(5)),
    );
    h.poll_all().await;

    assert!(h.facade.best_spreads(&FilterCriteria::default()).await.unwrap().is_empty());
    // Stale quotes are still known pairs, they just never compute.
    assert_eq!(h.facade.available_pairs(), vec!["BTC/USDT"]);
}
