//! Observation store: a validated, unordered bag of sentiment observations.

use crate::domain::{Observation, SecurityKey};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("observation {index}: empty security key")]
    EmptyKey { index: usize },

    #[error("observation {index} ({key} on {date}): non-finite sentiment {value}")]
    NonFiniteSentiment {
        index: usize,
        key: SecurityKey,
        date: NaiveDate,
        value: f64,
    },

    #[error("observation {index} ({key} on {date}): invalid weight {value}")]
    InvalidWeight {
        index: usize,
        key: SecurityKey,
        date: NaiveDate,
        value: f64,
    },
}

/// Validated observations. Order of insertion carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    observations: Vec<Observation>,
}

impl ObservationStore {
    /// Validate and wrap a set of observations.
    pub fn new(observations: Vec<Observation>) -> Result<Self, ObservationError> {
        for (index, obs) in observations.iter().enumerate() {
            validate(index, obs)?;
        }
        Ok(Self { observations })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, obs: Observation) -> Result<(), ObservationError> {
        validate(self.observations.len(), &obs)?;
        self.observations.push(obs);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Observations with `start <= date <= end`.
    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Observation> {
        self.observations
            .iter()
            .filter(|o| o.date >= start && o.date <= end)
            .collect()
    }

    /// Distinct security keys, sorted.
    pub fn securities(&self) -> BTreeSet<&SecurityKey> {
        self.observations.iter().map(|o| &o.security_key).collect()
    }

    /// Earliest and latest observation date, if any.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.iter().map(|o| o.date).min()?;
        let last = self.observations.iter().map(|o| o.date).max()?;
        Some((first, last))
    }

    /// Collapse the whole store to one mean sentiment per (security, date).
    pub fn daily_means(&self) -> BTreeMap<(SecurityKey, NaiveDate), f64> {
        daily_means(self.observations.iter())
    }
}

/// Mean sentiment per (security, date).
///
/// Duplicate keys are averaged rather than resolved by position, so the
/// result does not depend on input order.
pub fn daily_means<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
) -> BTreeMap<(SecurityKey, NaiveDate), f64> {
    let mut acc: BTreeMap<(SecurityKey, NaiveDate), Vec<f64>> = BTreeMap::new();
    for obs in observations {
        acc.entry((obs.security_key.clone(), obs.date))
            .or_default()
            .push(obs.sentiment);
    }
    acc.into_iter()
        .map(|(k, mut values)| (k, stable_mean(&mut values)))
        .collect()
}

/// Order-independent mean of finite values. Empty input gives 0.0.
///
/// Values are sorted before summing so the result is bit-identical for any
/// input order. When the plain sum overflows, the values are scaled by
/// their peak magnitude first, which keeps the mean finite.
pub fn stable_mean(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean.is_finite() {
        return mean;
    }
    let peak = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let scaled = values.iter().map(|v| v / peak).sum::<f64>() / n;
    scaled * peak
}

fn validate(index: usize, obs: &Observation) -> Result<(), ObservationError> {
    if obs.security_key.as_str().is_empty() {
        return Err(ObservationError::EmptyKey { index });
    }
    if !obs.sentiment.is_finite() {
        return Err(ObservationError::NonFiniteSentiment {
            index,
            key: obs.security_key.clone(),
            date: obs.date,
            value: obs.sentiment,
        });
    }
    if let Some(w) = obs.weight {
        if !w.is_finite() || w < 0.0 {
            return Err(ObservationError::InvalidWeight {
                index,
                key: obs.security_key.clone(),
                date: obs.date,
                value: w,
            });
        }
    }
    Ok(())
}
