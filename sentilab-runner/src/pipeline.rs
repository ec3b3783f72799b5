//! Pipeline runner: config + calendar + observations → positions and validation.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use sentilab_core::data::{CalendarResolver, ObservationStore};
use sentilab_core::domain::{shift_back, DateError};
use sentilab_core::engine::{EngineError, PositionEngine};
use sentilab_core::matrix::{PositionMatrix, PositionSummary};
use sentilab_core::validate::{StartEndValidator, ValidationError, ValidationReport};

use crate::config::{ConfigError, PipelineConfig, RunId};
use crate::data_loader::{compute_dataset_hash, load_observations, LoadError, LoadOptions};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("date error: {0}")]
    Date(#[from] DateError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a positions run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: PipelineConfig,
    pub calendar: String,
    pub positions: PositionMatrix,
    pub summary: PositionSummary,
    /// Fingerprint of `positions`; equal for bit-identical matrices.
    pub fingerprint: String,
    /// `None` when validation was disabled.
    pub validation: Option<ValidationReport>,
    pub observation_count: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl PipelineResult {
    /// True unless validation ran and failed.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().map_or(true, |r| r.passed)
    }

    pub fn manifest(&self) -> RunManifest {
        RunManifest {
            schema_version: self.schema_version,
            run_id: self.run_id.clone(),
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            leverage: self.config.leverage,
            calendar: self.calendar.clone(),
            fingerprint: self.fingerprint.clone(),
            summary: self.summary.clone(),
            validation_passed: self.validation.as_ref().map(|r| r.passed),
            observation_count: self.observation_count,
            dataset_hash: self.dataset_hash.clone(),
            has_synthetic: self.has_synthetic,
            config: self.config.clone(),
        }
    }
}

/// Persisted run metadata (`manifest.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leverage: f64,
    pub calendar: String,
    pub fingerprint: String,
    pub summary: PositionSummary,
    pub validation_passed: Option<bool>,
    pub observation_count: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub config: PipelineConfig,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Build an engine from the config's engine table.
pub fn build_engine(
    config: &PipelineConfig,
    calendar: Arc<dyn CalendarResolver>,
) -> Result<PositionEngine, RunError> {
    Ok(PositionEngine::with_config(calendar, config.engine.clone())?)
}

/// Earliest date the validator will read: start minus the largest lookback.
pub fn history_start(config: &PipelineConfig) -> Result<NaiveDate, DateError> {
    let max_offset = config
        .validation
        .lookback_offsets_days
        .iter()
        .copied()
        .max()
        .unwrap_or(0);
    shift_back(config.start_date, max_offset)
}

/// Generate positions (and validate, unless disabled) for an already-loaded store.
pub fn run_pipeline(
    config: &PipelineConfig,
    calendar: Arc<dyn CalendarResolver>,
    store: &ObservationStore,
) -> Result<PipelineResult, RunError> {
    run_hashed(config, calendar, store, compute_dataset_hash(store))
}

fn run_hashed(
    config: &PipelineConfig,
    calendar: Arc<dyn CalendarResolver>,
    store: &ObservationStore,
    dataset_hash: String,
) -> Result<PipelineResult, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let calendar_name = calendar.name().to_string();
    let engine = build_engine(config, calendar)?;

    info!(
        run_id = %run_id,
        start = %config.start_date,
        end = %config.end_date,
        leverage = config.leverage,
        calendar = %calendar_name,
        "starting positions run"
    );

    let positions = engine.generate_positions(
        store,
        config.start_date,
        config.end_date,
        config.leverage,
    )?;

    let validation = if config.validation.enabled {
        let validator = StartEndValidator::with_config(&engine, config.validator_config());
        Some(validator.validate(store, config.start_date, config.end_date, config.leverage)?)
    } else {
        warn!("start-end validation disabled for this run");
        None
    };

    Ok(PipelineResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        calendar: calendar_name,
        summary: positions.summary(),
        fingerprint: positions.fingerprint(),
        positions,
        validation,
        observation_count: store.len(),
        dataset_hash,
        has_synthetic: false,
    })
}

/// Run only the start-end validator.
pub fn run_validation(
    config: &PipelineConfig,
    calendar: Arc<dyn CalendarResolver>,
    store: &ObservationStore,
) -> Result<ValidationReport, RunError> {
    config.validate()?;
    let engine = build_engine(config, calendar)?;
    let validator = StartEndValidator::with_config(&engine, config.validator_config());
    Ok(validator.validate(store, config.start_date, config.end_date, config.leverage)?)
}

/// Load observations as configured, then run the pipeline.
///
/// Synthetic observations cover the validator's lookback so both reruns see
/// the same history as the primary run.
pub fn run_from_config(
    config: &PipelineConfig,
    calendar: Arc<dyn CalendarResolver>,
) -> Result<PipelineResult, RunError> {
    let opts = LoadOptions::from_config(
        &config.observations,
        history_start(config)?,
        config.end_date,
    );
    let loaded = load_observations(&opts)?;
    let mut result = run_hashed(config, calendar, &loaded.store, loaded.dataset_hash)?;
    result.has_synthetic = loaded.has_synthetic;
    Ok(result)
}
