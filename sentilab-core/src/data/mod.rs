//! Collaborators at the edge of the engine: calendars, observations, ticker mapping.

pub mod aggregate;
pub mod calendar;
pub mod http_calendar;
pub mod mapping;
pub mod store;

pub use aggregate::{aggregate_daily, Aggregated};
pub use calendar::{check_sessions, CalendarError, CalendarResolver, FixedCalendar, WeekdayCalendar};
pub use http_calendar::{HttpCalendar, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use mapping::{MappingError, TickerMap};
pub use store::{daily_means, stable_mean, ObservationError, ObservationStore};
