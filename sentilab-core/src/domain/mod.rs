//! Domain types for SentiLab

pub mod dates;
pub mod ids;
pub mod observation;

pub use dates::{parse_date, shift_back, to_compact, DateError};
pub use ids::{SecurityKey, SECURITY_KEY_WIDTH};
pub use observation::{Observation, ScoredMention};
