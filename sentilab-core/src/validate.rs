//! Start-end independence validation.
//!
//! Re-runs the engine from two earlier start dates with the same end date and
//! checks that the overlapping sessions agree cell for cell. A difference
//! means extra history changed positions it should not have touched: either
//! look-ahead through the shift, or state leaking across the fill horizon.
//!
//! The later run starts flat and with an empty fill state, so its first
//! `fill_horizon + 1` overlapping sessions can legitimately differ from the
//! earlier run. Those burn-in sessions are excluded from the comparison; past
//! them the engine output depends only on observations both runs can see.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::data::ObservationStore;
use crate::domain::{shift_back, DateError, SecurityKey};
use crate::engine::{EngineError, PositionEngine, FORWARD_FILL_HORIZON};
use crate::matrix::PositionMatrix;

/// Total absolute difference tolerated across all compared cells.
pub const VALIDATION_THRESHOLD: f64 = 1.0;

/// Calendar-day offsets subtracted from the requested start.
pub const LOOKBACK_OFFSETS_DAYS: [u64; 2] = [100, 50];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("lookback date: {0}")]
    Date(#[from] DateError),

    #[error("engine run failed: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub lookback_offsets_days: [u64; 2],
    pub threshold: f64,
    /// Leading overlap sessions excluded from the comparison.
    pub burn_in_sessions: usize,
    /// How many securities to report when the check fails.
    pub worst_count: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            lookback_offsets_days: LOOKBACK_OFFSETS_DAYS,
            threshold: VALIDATION_THRESHOLD,
            burn_in_sessions: FORWARD_FILL_HORIZON + 1,
            worst_count: 3,
        }
    }
}

impl ValidatorConfig {
    /// Defaults with the burn-in matched to an engine's fill horizon.
    pub fn for_horizon(fill_horizon: usize) -> Self {
        Self {
            burn_in_sessions: fill_horizon + 1,
            ..Self::default()
        }
    }
}

/// Largest single-cell difference observed for one security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDiff {
    pub security_key: SecurityKey,
    pub max_abs_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    /// Difference over the compared sessions; this is what `passed` gates on.
    pub total_abs_diff: f64,
    /// Difference over the whole overlap, burn-in included.
    pub overlap_abs_diff: f64,
    pub threshold: f64,
    /// Sessions common to both runs.
    pub overlap_sessions: usize,
    /// Overlap sessions actually compared (after burn-in).
    pub compared_sessions: usize,
    pub max_cell_diff: f64,
    /// Worst offenders, populated only when the check fails.
    pub worst_securities: Vec<SecurityDiff>,
    pub lookback_starts: [NaiveDate; 2],
    pub end_date: NaiveDate,
}

pub struct StartEndValidator<'a> {
    engine: &'a PositionEngine,
    config: ValidatorConfig,
}

impl<'a> StartEndValidator<'a> {
    /// Validator with defaults matched to the engine's fill horizon.
    pub fn new(engine: &'a PositionEngine) -> Self {
        let config = ValidatorConfig::for_horizon(engine.config().fill_horizon);
        Self { engine, config }
    }

    pub fn with_config(engine: &'a PositionEngine, config: ValidatorConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(
        &self,
        observations: &ObservationStore,
        start: NaiveDate,
        end: NaiveDate,
        leverage: f64,
    ) -> Result<ValidationReport, ValidationError> {
        info!(%start, %end, "running start-end validation");

        let [offset_a, offset_b] = self.config.lookback_offsets_days;
        let start_a = shift_back(start, offset_a)?;
        let start_b = shift_back(start, offset_b)?;

        let run_a = self
            .engine
            .generate_positions(observations, start_a, end, leverage)?;
        let run_b = self
            .engine
            .generate_positions(observations, start_b, end, leverage)?;

        let report = compare_runs(&run_a, &run_b, &self.config, [start_a, start_b], end);

        if report.passed {
            info!(
                total_diff = report.total_abs_diff,
                threshold = report.threshold,
                compared = report.compared_sessions,
                "start-end validation passed"
            );
        } else {
            error!(
                total_diff = report.total_abs_diff,
                threshold = report.threshold,
                worst = ?report.worst_securities,
                "start-end validation failed"
            );
        }

        Ok(report)
    }
}

/// Compare two engine runs over their common sessions.
///
/// A security missing from one run counts as a flat position there.
pub fn compare_runs(
    run_a: &PositionMatrix,
    run_b: &PositionMatrix,
    config: &ValidatorConfig,
    lookback_starts: [NaiveDate; 2],
    end_date: NaiveDate,
) -> ValidationReport {
    let overlap: Vec<NaiveDate> = match (
        run_a.first_session().zip(run_b.first_session()),
        run_a.last_session().zip(run_b.last_session()),
    ) {
        (Some((first_a, first_b)), Some((last_a, last_b))) => {
            let from = first_a.max(first_b);
            let to = last_a.min(last_b);
            let in_b: BTreeSet<NaiveDate> = run_b.slice(from, to).sessions().iter().copied().collect();
            run_a
                .slice(from, to)
                .sessions()
                .iter()
                .copied()
                .filter(|d| in_b.contains(d))
                .collect()
        }
        _ => Vec::new(),
    };

    let keys: BTreeSet<&SecurityKey> = run_a.columns().iter().chain(run_b.columns()).collect();

    let mut total = 0.0_f64;
    let mut overlap_total = 0.0_f64;
    let mut max_cell = 0.0_f64;
    let mut per_security: BTreeMap<&SecurityKey, f64> = BTreeMap::new();

    let compared_sessions = overlap.len().saturating_sub(config.burn_in_sessions);

    for (index, date) in overlap.iter().enumerate() {
        for key in &keys {
            let a = run_a.position(*date, key).unwrap_or(0.0);
            let b = run_b.position(*date, key).unwrap_or(0.0);
            let diff = (a - b).abs();
            overlap_total += diff;
            if index < config.burn_in_sessions {
                continue;
            }
            total += diff;
            max_cell = max_cell.max(diff);
            let worst = per_security.entry(*key).or_insert(0.0);
            *worst = worst.max(diff);
        }
    }

    let passed = total <= config.threshold;

    let worst_securities = if passed {
        Vec::new()
    } else {
        let mut ranked: Vec<SecurityDiff> = per_security
            .into_iter()
            .filter(|(_, diff)| *diff > 0.0)
            .map(|(key, diff)| SecurityDiff {
                security_key: key.clone(),
                max_abs_diff: diff,
            })
            .collect();
        ranked.sort_by(|a, b| b.max_abs_diff.total_cmp(&a.max_abs_diff));
        ranked.truncate(config.worst_count);
        ranked
    };

    ValidationReport {
        passed,
        total_abs_diff: total,
        overlap_abs_diff: overlap_total,
        threshold: config.threshold,
        overlap_sessions: overlap.len(),
        compared_sessions,
        max_cell_diff: max_cell,
        worst_securities,
        lookback_starts,
        end_date,
    }
}
