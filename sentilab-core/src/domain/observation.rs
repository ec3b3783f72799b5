use super::SecurityKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One sentiment reading for a security on a calendar date.
///
/// `sentiment` is conventionally in [-1, 1] but nothing downstream relies on
/// that; the engine normalizes per session regardless of scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub security_key: SecurityKey,
    pub date: NaiveDate,
    pub sentiment: f64,
    /// Mention count or similar. Carried through, not used for positions.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Observation {
    pub fn new(security_key: impl Into<SecurityKey>, date: NaiveDate, sentiment: f64) -> Self {
        Self {
            security_key: security_key.into(),
            date,
            sentiment,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// A ticker mention whose text has already been scored by an external model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMention {
    pub ticker: String,
    pub date: NaiveDate,
    pub sentiment: f64,
    /// Post score (upvotes) of the source post, if known.
    #[serde(default)]
    pub score: Option<f64>,
}
