//! Symbol canonicalization and the curated ticker dictionary.
//!
//! Canonical form is `BASE/QUOTE` (e.g., `BTC/USDT`). Everything downstream
//! of the adapters consumes the canonical form only.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Rewrite a symbol into canonical `BASE/QUOTE` form.
///
/// Inputs lacking a `/` are rewritten to `BASE/USDT`; inputs already
/// containing `/` pass through unchanged. The output always contains
/// exactly one `/`.
#[must_use]
pub fn canonicalize(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.contains('/') {
        trimmed.to_string()
    } else {
        format!("{}/USDT", trimmed.to_ascii_uppercase())
    }
}

/// Curated tickers with name aliases. Tickers match case-sensitively
/// (or with a `$` prefix); aliases match case-insensitively. The split
/// keeps short tickers like ONE or OP from matching ordinary words.
const TICKERS: &[(&str, &[&str])] = &[
    ("BTC", &["bitcoin", "xbt"]),
    ("ETH", &["ethereum", "ether"]),
    ("SOL", &["solana"]),
    ("BNB", &["binance coin"]),
    ("XRP", &["ripple"]),
    ("ADA", &["cardano"]),
    ("DOGE", &["dogecoin"]),
    ("SHIB", &["shiba inu", "shiba"]),
    ("AVAX", &["avalanche"]),
    ("DOT", &["polkadot"]),
    ("MATIC", &["polygon"]),
    ("LINK", &["chainlink"]),
    ("LTC", &["litecoin"]),
    ("UNI", &["uniswap"]),
    ("ATOM", &["cosmos"]),
    ("XLM", &["stellar"]),
    ("ETC", &["ethereum classic"]),
    ("NEAR", &["near protocol"]),
    ("ALGO", &["algorand"]),
    ("FIL", &["filecoin"]),
    ("VET", &["vechain"]),
    ("ICP", &["internet computer"]),
    ("HBAR", &["hedera"]),
    ("APT", &["aptos"]),
    ("ARB", &["arbitrum"]),
    ("OP", &["optimism"]),
    ("SUI", &[]),
    ("INJ", &["injective"]),
    ("TIA", &["celestia"]),
    ("SEI", &[]),
    ("AAVE", &[]),
    ("MKR", &["maker"]),
    ("SNX", &["synthetix"]),
    ("CRV", &["curve"]),
    ("COMP", &["compound"]),
    ("SUSHI", &["sushiswap"]),
    ("YFI", &["yearn"]),
    ("GRT", &["the graph"]),
    ("SAND", &["sandbox", "the sandbox"]),
    ("MANA", &["decentraland"]),
    ("AXS", &["axie", "axie infinity"]),
    ("GALA", &[]),
    ("ENJ", &["enjin"]),
    ("CHZ", &["chiliz"]),
    ("FLOW", &[]),
    ("XTZ", &["tezos"]),
    ("EOS", &[]),
    ("KSM", &["kusama"]),
    ("ZEC", &["zcash"]),
    ("DASH", &[]),
    ("XMR", &["monero"]),
    ("NEO", &[]),
    ("IOTA", &[]),
    ("QNT", &["quant"]),
    ("EGLD", &["elrond", "multiversx"]),
    ("FTM", &["fantom"]),
    ("ONE", &["harmony"]),
    ("ZIL", &["zilliqa"]),
    ("KAVA", &[]),
    ("RUNE", &["thorchain"]),
    ("CAKE", &["pancakeswap"]),
    ("LDO", &["lido"]),
    ("RPL", &["rocket pool"]),
    ("IMX", &["immutable"]),
    ("STX", &["stacks"]),
    ("RNDR", &["render"]),
    ("FET", &["fetch.ai", "fetch ai"]),
    ("OCEAN", &["ocean protocol"]),
    ("AGIX", &["singularitynet"]),
    ("AR", &["arweave"]),
    ("ROSE", &["oasis"]),
    ("KDA", &["kadena"]),
    ("MINA", &[]),
    ("GMX", &[]),
    ("DYDX", &[]),
    ("PEPE", &[]),
    ("WIF", &["dogwifhat"]),
    ("BONK", &[]),
    ("FLOKI", &[]),
    ("JUP", &["jupiter"]),
    ("PYTH", &[]),
    ("JTO", &["jito"]),
    ("W", &["wormhole"]),
    ("ENA", &["ethena"]),
    ("ONDO", &[]),
    ("TON", &["toncoin"]),
    ("TRX", &["tron"]),
    ("BCH", &["bitcoin cash"]),
    ("APE", &["apecoin"]),
    ("LRC", &["loopring"]),
    ("ENS", &[]),
    ("BAT", &["basic attention"]),
    ("ZRX", &["0x"]),
    ("1INCH", &[]),
    ("BAL", &["balancer"]),
    ("REN", &[]),
    ("CELO", &[]),
    ("HNT", &["helium"]),
    ("AKT", &["akash"]),
    ("TAO", &["bittensor"]),
    ("WLD", &["worldcoin"]),
    ("BLUR", &[]),
    ("STRK", &["starknet"]),
];

static DICTIONARY: Lazy<SymbolDictionary> = Lazy::new(SymbolDictionary::curated);

/// Dictionary mapping tickers and name aliases to canonical pairs.
pub struct SymbolDictionary {
    /// Ticker -> canonical pair (case-sensitive match).
    tickers: HashMap<&'static str, String>,
    /// Lowercased alias -> canonical pair.
    aliases: HashMap<String, String>,
}

impl SymbolDictionary {
    /// Build the curated dictionary.
    #[must_use]
    pub fn curated() -> Self {
        let mut tickers = HashMap::with_capacity(TICKERS.len());
        let mut aliases = HashMap::new();
        for (ticker, names) in TICKERS {
            let canonical = canonicalize(ticker);
            tickers.insert(*ticker, canonical.clone());
            for name in *names {
                aliases.insert((*name).to_string(), canonical.clone());
            }
        }
        Self { tickers, aliases }
    }

    /// Shared curated instance.
    #[must_use]
    pub fn shared() -> &'static Self {
        &DICTIONARY
    }

    /// Number of known tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Look up a single token. `$`-prefixed tokens are tried as tickers
    /// after stripping the prefix.
    #[must_use]
    pub fn lookup_token(&self, token: &str) -> Option<&str> {
        let bare = token.strip_prefix('$').unwrap_or(token);
        if let Some(canonical) = self.tickers.get(bare) {
            return Some(canonical);
        }
        self.aliases.get(&bare.to_lowercase()).map(String::as_str)
    }

    /// Extract all mentioned symbols from free text, in order of first
    /// appearance, deduplicated. Multi-word aliases are matched against
    /// the lowercased text.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();

        for token in text.split(|c: char| !(c.is_alphanumeric() || c == '$' || c == '.')) {
            if token.is_empty() {
                continue;
            }
            if let Some(canonical) = self.lookup_token(token) {
                if !found.iter().any(|f| f == canonical) {
                    found.push(canonical.to_string());
                }
            }
        }

        // Multi-word aliases don't survive tokenization; scan the text.
        let lowered = text.to_lowercase();
        for (alias, canonical) in &self.aliases {
            if alias.contains(' ') && lowered.contains(alias.as_str()) {
                if !found.iter().any(|f| f == canonical) {
                    found.push(canonical.clone());
                }
            }
        }

        found
    }

    /// First unambiguous symbol hit, used by enrichment.
    #[must_use]
    pub fn extract_first(&self, text: &str) -> Option<String> {
        self.extract(text).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_bare_ticker() {
        assert_eq!(canonicalize("SHIB"), "SHIB/USDT");
        assert_eq!(canonicalize("btc"), "BTC/USDT");
    }

    #[test]
    fn test_canonicalize_pass_through() {
        assert_eq!(canonicalize("BTC/USDT"), "BTC/USDT");
        assert_eq!(canonicalize("ETH/BTC"), "ETH/BTC");
    }

    #[test]
    fn test_canonical_form_has_one_slash() {
        for input in ["SHIB", "BTC/USDT", "doge", "ETH/BTC"] {
            let canonical = canonicalize(input);
            assert_eq!(canonical.matches('/').count(), 1, "input {input}");
        }
    }

    #[test]
    fn test_dictionary_size() {
        // Curated list stays around a hundred tickers.
        assert!(SymbolDictionary::shared().len() >= 100);
    }

    #[test]
    fn test_extract_ticker_and_alias() {
        let dict = SymbolDictionary::shared();
        assert_eq!(
            dict.extract("BTC breaking out, ethereum lagging"),
            vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()]
        );
    }

    #[test]
    fn test_extract_dollar_prefix() {
        let dict = SymbolDictionary::shared();
        assert_eq!(dict.extract_first("loading up on $SOL"), Some("SOL/USDT".to_string()));
    }

    #[test]
    fn test_short_ticker_not_matched_lowercase() {
        let dict = SymbolDictionary::shared();
        // "one" as an ordinary word must not match the ONE ticker.
        assert!(dict.extract("no one expected this").is_empty());
        assert_eq!(dict.extract_first("ONE pumping"), Some("ONE/USDT".to_string()));
    }

    #[test]
    fn test_multi_word_alias() {
        let dict = SymbolDictionary::shared();
        assert_eq!(
            dict.extract_first("Shiba Inu volume doubled"),
            Some("SHIB/USDT".to_string())
        );
    }
}
