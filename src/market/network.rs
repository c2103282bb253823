//! Normalization of exchange-specific transfer network names.
//!
//! Every exchange spells the same chain differently ("ETH", "ERC20",
//! "Ethereum(ERC20)"). Both legs of an opportunity must use the same names so
//! the presentation layer can match withdraw and deposit networks.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

static EXACT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("ETH", "ERC20"),
        ("ERC20", "ERC20"),
        ("ERC-20", "ERC20"),
        ("ETHEREUM", "ERC20"),
        ("ETHEREUM ERC20", "ERC20"),
        ("ETH-ERC20", "ERC20"),
        ("BNB", "BEP20"),
        ("BSC", "BEP20"),
        ("BEP20", "BEP20"),
        ("BNB SMART CHAIN", "BEP20"),
        ("BINANCE SMART CHAIN", "BEP20"),
        ("MATIC", "POLYGON"),
        ("POLYGON", "POLYGON"),
        ("TRC20", "TRC20"),
        ("TRON", "TRC20"),
        ("SOL", "SOL"),
        ("SOLANA", "SOL"),
        ("ARB", "ARBITRUM"),
        ("ARBITRUM", "ARBITRUM"),
        ("ARBITRUM ONE", "ARBITRUM"),
        ("BASE", "BASE"),
        ("BASE MAINNET", "BASE"),
        ("OP", "OPTIMISM"),
        ("OPTIMISM", "OPTIMISM"),
        ("OP MAINNET", "OPTIMISM"),
        ("ZKSYNC ERA", "ZKSYNC"),
        ("ZKSYNC LITE", "ZKSYNC"),
        ("ZKSYNCERA", "ZKSYNC"),
        ("MANTLE NETWORK", "MANTLE"),
        ("TERRA CLASSIC", "TERRA"),
        ("DOGECOIN", "DOGE"),
        ("HEDERA", "HBAR"),
        ("FLR", "FLARE"),
        ("BITCOIN CASH", "BCH"),
        ("CHILIZ CHAIN", "CHILIZ"),
        ("ELROND", "EGLD"),
    ]
    .into_iter()
    .collect()
});

/// Substring fallbacks, checked in order when no exact alias matches.
const CONTAINS: &[(&[&str], &str)] = &[
    (&["ERC20"], "ERC20"),
    (&["BEP20"], "BEP20"),
    (&["TRC20"], "TRC20"),
    (&["SOL"], "SOL"),
    (&["MATIC", "POLYGON"], "POLYGON"),
    (&["ARB"], "ARBITRUM"),
    (&["BASE"], "BASE"),
    (&["OPTI", "OP MAINNET"], "OPTIMISM"),
    (&["ZKSYNC"], "ZKSYNC"),
    (&["MANTLE"], "MANTLE"),
    (&["STARKNET"], "STARKNET"),
    (&["TON"], "TON"),
    (&["TERRA"], "TERRA"),
    (&["XRP"], "XRP"),
    (&["DOGE"], "DOGE"),
    (&["HBAR", "HEDERA"], "HBAR"),
    (&["BITCOIN CASH", "BCH"], "BCH"),
    (&["CHILIZ"], "CHILIZ"),
    (&["SUI"], "SUI"),
    (&["EGLD", "ELROND"], "EGLD"),
];

/// Map a raw network name onto its canonical spelling.
///
/// Unknown names come back trimmed and upper-cased.
pub fn normalize_network(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();

    // "ETHEREUM(ERC20)" and "BNB SMART CHAIN (BEP20)" both carry the standard
    // in parentheses; try the full name first so that information survives.
    if let Some(canonical) = EXACT.get(upper.as_str()) {
        return (*canonical).to_string();
    }
    if let Some(canonical) = CONTAINS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| upper.contains(n)))
        .map(|(_, canonical)| *canonical)
    {
        return canonical.to_string();
    }

    let stripped = PARENTHESIZED.replace_all(&upper, "").trim().to_string();
    EXACT
        .get(stripped.as_str())
        .map(|c| (*c).to_string())
        .unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_aliases_map_to_canonical() {
        assert_eq!(normalize_network("ETH"), "ERC20");
        assert_eq!(normalize_network("bsc"), "BEP20");
        assert_eq!(normalize_network("Tron"), "TRC20");
        assert_eq!(normalize_network("  solana "), "SOL");
    }

    #[test]
    fn parenthesized_standard_is_recognized() {
        assert_eq!(normalize_network("Ethereum(ERC20)"), "ERC20");
        assert_eq!(normalize_network("BNB Smart Chain (BEP20)"), "BEP20");
        assert_eq!(normalize_network("Arbitrum One(ARB)"), "ARBITRUM");
    }

    #[test]
    fn parenthesized_noise_is_stripped() {
        assert_eq!(normalize_network("Aptos(APT)"), "APTOS");
    }

    #[test]
    fn unknown_network_is_uppercased() {
        assert_eq!(normalize_network("kaspa"), "KASPA");
    }
}
