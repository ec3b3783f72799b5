//! Position engine: sparse sentiment observations → dense, shifted, clipped
//! dollar positions on the trading-session axis.
//!
//! Pipeline per call:
//! 1. fetch sessions from the injected calendar (and check them)
//! 2. filter observations to `[start, end]`
//! 3. average duplicate (security, date) readings
//! 4. pivot and reindex onto the sessions
//! 5. forward-fill up to `fill_horizon` sessions, neutral beyond
//! 6. normalize each session to unit absolute weight
//! 7. scale by `notional_base * leverage`
//! 8. shift one session forward (first row is always flat)
//! 9. clip to `±max_position`
//! 10. drop columns with malformed keys
//!
//! The engine holds no state between calls. Empty inputs produce an empty
//! shape, never an error; only collaborator failures and invalid parameters
//! are reported as errors.

pub mod transform;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{check_sessions, daily_means, CalendarError, CalendarResolver, ObservationStore};
use crate::domain::SECURITY_KEY_WIDTH;
use crate::matrix::PositionMatrix;

use transform::{
    align_to_sessions, clip, forward_fill_bounded, normalize_rows, sanitize_columns, scale,
    shift_forward,
};

/// Gross notional at leverage 1.0, in currency units.
pub const NOTIONAL_BASE: f64 = 1e8;

/// Per-security position ceiling imposed by the platform. Independent of leverage.
pub const MAX_POSITION: f64 = 1e8;

/// Sessions a stale reading may be carried forward.
pub const FORWARD_FILL_HORIZON: usize = 5;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("calendar resolver failed: {0}")]
    Calendar(#[from] CalendarError),

    #[error("leverage must be finite and positive, got {0}")]
    InvalidLeverage(f64),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Engine parameters. Defaults are the platform contract values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub notional_base: f64,
    pub max_position: f64,
    pub fill_horizon: usize,
    pub key_width: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notional_base: NOTIONAL_BASE,
            max_position: MAX_POSITION,
            fill_horizon: FORWARD_FILL_HORIZON,
            key_width: SECURITY_KEY_WIDTH,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.notional_base.is_finite() && self.notional_base > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "notional_base must be finite and positive, got {}",
                self.notional_base
            )));
        }
        if !(self.max_position.is_finite() && self.max_position > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "max_position must be finite and positive, got {}",
                self.max_position
            )));
        }
        if self.key_width == 0 {
            return Err(EngineError::InvalidConfig("key_width must be >= 1".into()));
        }
        Ok(())
    }
}

/// The position engine, bound to a calendar resolver.
#[derive(Clone)]
pub struct PositionEngine {
    calendar: Arc<dyn CalendarResolver>,
    config: EngineConfig,
}

impl PositionEngine {
    /// Engine with contract defaults.
    pub fn new(calendar: Arc<dyn CalendarResolver>) -> Self {
        Self {
            calendar,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(
        calendar: Arc<dyn CalendarResolver>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { calendar, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &dyn CalendarResolver {
        self.calendar.as_ref()
    }

    /// Generate the position matrix for sessions in `[start, end]`.
    pub fn generate_positions(
        &self,
        observations: &ObservationStore,
        start: NaiveDate,
        end: NaiveDate,
        leverage: f64,
    ) -> Result<PositionMatrix, EngineError> {
        if !(leverage.is_finite() && leverage > 0.0) {
            return Err(EngineError::InvalidLeverage(leverage));
        }
        let gross = self.config.notional_base * leverage;
        if !gross.is_finite() {
            return Err(EngineError::InvalidLeverage(leverage));
        }

        let sessions = self.calendar.sessions(start, end)?;
        check_sessions(self.calendar.name(), &sessions, start, end)?;
        debug!(%start, %end, sessions = sessions.len(), "resolved trading sessions");

        if sessions.is_empty() {
            warn!(%start, %end, "no trading sessions in range");
            return Ok(PositionMatrix::empty(sessions));
        }

        let in_range = observations.in_range(start, end);
        if in_range.is_empty() {
            warn!(%start, %end, "no sentiment observations in range");
            return Ok(PositionMatrix::empty(sessions));
        }

        let means = daily_means(in_range.iter().copied());
        let (columns, raw) = align_to_sessions(&means, &sessions);
        debug!(
            observations = in_range.len(),
            securities = columns.len(),
            "pivoted observations onto sessions"
        );

        let mut cells: Vec<Vec<f64>> = raw
            .iter()
            .map(|col| forward_fill_bounded(col, self.config.fill_horizon))
            .collect();

        normalize_rows(&mut cells);
        scale(&mut cells, gross);
        shift_forward(&mut cells);
        clip(&mut cells, self.config.max_position);

        let before = columns.len();
        let (columns, cells) = sanitize_columns(columns, cells, self.config.key_width);
        if columns.len() < before {
            debug!(
                dropped = before - columns.len(),
                "dropped columns with malformed security keys"
            );
        }

        let matrix = PositionMatrix::from_columns(sessions, columns, cells);
        info!(
            rows = matrix.n_rows(),
            securities = matrix.n_cols(),
            first = ?matrix.first_session(),
            last = ?matrix.last_session(),
            max_position = matrix.max_abs(),
            "positions generated"
        );
        Ok(matrix)
    }
}

impl std::fmt::Debug for PositionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionEngine")
            .field("calendar", &self.calendar.name())
            .field("config", &self.config)
            .finish()
    }
}
