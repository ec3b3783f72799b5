//! SentiLab Runner — pipeline orchestration around the position engine.
//!
//! This crate builds on `sentilab-core` to provide:
//! - TOML pipeline configuration and run fingerprinting
//! - Observation loading (observation CSV, mention CSV via ticker map, synthetic fallback)
//! - The positions pipeline with optional start-end validation
//! - Artifact export (split JSON, CSV, validation report, manifest)

pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;

pub use config::{CalendarConfig, ConfigError, InputFormat, ObservationsConfig, PipelineConfig};
pub use data_loader::{load_observations, DataSource, LoadError, LoadOptions, LoadedObservations};
pub use export::{load_artifacts, save_artifacts};
pub use pipeline::{
    run_from_config, run_pipeline, run_validation, PipelineResult, RunError, RunManifest,
    SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn pipeline_result_is_send_sync() {
        assert_send::<PipelineResult>();
        assert_sync::<PipelineResult>();
        assert_send::<RunManifest>();
        assert_sync::<RunManifest>();
    }

    #[test]
    fn loaded_observations_is_send_sync() {
        assert_send::<LoadedObservations>();
        assert_sync::<LoadedObservations>();
    }
}
