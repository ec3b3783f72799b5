//! Ticker to security-key mapping.
//!
//! Stored as a TOML file with a single `[tickers]` table. Lookups are
//! case-insensitive on the ticker. All-digit keys shorter than the canonical
//! width are zero-padded on load, since some upstream listings drop the
//! leading zeros of the company key.

use crate::domain::{SecurityKey, SECURITY_KEY_WIDTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("read ticker map: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse ticker map TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize ticker map: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The ticker mapping table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerMap {
    pub tickers: BTreeMap<String, SecurityKey>,
}

impl TickerMap {
    /// Build a map, normalizing tickers to upper case and padding numeric keys.
    pub fn new(entries: impl IntoIterator<Item = (String, SecurityKey)>) -> Self {
        let tickers = entries
            .into_iter()
            .map(|(t, k)| (t.trim().to_uppercase(), pad_key(k)))
            .collect();
        Self { tickers }
    }

    /// Load a ticker map from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MappingError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a ticker map from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, MappingError> {
        let raw: TickerMap = toml::from_str(content)?;
        Ok(Self::new(raw.tickers))
    }

    /// Serialize the map to TOML.
    pub fn to_toml(&self) -> Result<String, MappingError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn get(&self, ticker: &str) -> Option<&SecurityKey> {
        self.tickers.get(&ticker.trim().to_uppercase())
    }

    /// Mapped security keys, in ticker order. A key may repeat.
    pub fn keys(&self) -> impl Iterator<Item = &SecurityKey> {
        self.tickers.values()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// The 50-name US large-cap universe the platform scores against.
    pub fn default_us() -> Self {
        let entries = [
            ("HON", "001300001"),
            ("AMD", "001161001"),
            ("AMGN", "001602001"),
            ("AAPL", "001690001"),
            ("BRK.B", "002176002"),
            ("JPM", "002968001"),
            ("CVX", "002991001"),
            ("CAT", "002817001"),
            ("KO", "003144001"),
            ("DIS", "003980001"),
            ("XOM", "004503001"),
            ("GE", "005047001"),
            ("HD", "005680001"),
            ("JNJ", "006266001"),
            ("INTC", "006008001"),
            ("IBM", "006066001"),
            ("LRCX", "006565001"),
            ("LLY", "006730001"),
            ("BAC", "007647001"),
            ("MCD", "007154001"),
            ("MRK", "007257001"),
            ("WFC", "008007001"),
            ("NKE", "007906001"),
            ("PEP", "008479001"),
            ("T", "009899001"),
            ("ABBV", "016101001"),
            ("PG", "008762001"),
            ("TXN", "010499001"),
            ("TMO", "010530001"),
            ("UNH", "010903001"),
            ("MSFT", "012141001"),
            ("ORCL", "012142001"),
            ("LIN", "025124001"),
            ("QCOM", "024800001"),
            ("BABA", "020530090"),
            ("ANET", "020748001"),
            ("UBER", "035077001"),
            ("WMT", "011259001"),
            ("COST", "029028001"),
            ("ASML", "061214090"),
            ("AMZN", "064768001"),
            ("NFLX", "147579001"),
            ("NVDA", "117768001"),
            ("V", "179534001"),
            ("MA", "160225001"),
            ("GOOGL", "160329001"),
            ("META", "170617001"),
            ("CRM", "157855001"),
            ("TSLA", "184996001"),
            ("AVGO", "180711001"),
        ];
        Self::new(
            entries
                .into_iter()
                .map(|(t, k)| (t.to_string(), SecurityKey::from(k))),
        )
    }
}

fn pad_key(key: SecurityKey) -> SecurityKey {
    let raw = key.as_str().trim();
    if !raw.is_empty() && raw.len() < SECURITY_KEY_WIDTH && raw.bytes().all(|b| b.is_ascii_digit())
    {
        SecurityKey(format!("{raw:0>width$}", width = SECURITY_KEY_WIDTH))
    } else {
        SecurityKey(raw.to_string())
    }
}
