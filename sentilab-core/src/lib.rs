//! SentiLab Core — sentiment observations to platform-compliant position matrices.
//!
//! This crate contains:
//! - Domain types (security keys, observations, scored mentions, boundary dates)
//! - Collaborators: calendar resolvers, observation store, ticker mapping, mention aggregation
//! - The position engine (filter → pivot → fill → normalize → scale → shift → clip → sanitize)
//! - The start-end independence validator

pub mod data;
pub mod domain;
pub mod engine;
pub mod matrix;
pub mod validate;

pub use engine::{EngineConfig, EngineError, PositionEngine};
pub use matrix::{PositionMatrix, PositionSummary, SplitFrame};
pub use validate::{StartEndValidator, ValidationReport, ValidatorConfig};
