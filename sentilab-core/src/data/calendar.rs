//! Trading calendar collaborators.
//!
//! The `CalendarResolver` trait abstracts over session sources (a weekday rule,
//! a fixed session list from a file, the platform's HTTP calendar) so the engine
//! can take one by injection and tests can supply their own.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::domain::{parse_date, DateError};

/// Structured error types for calendar lookups.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by calendar service (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("calendar service returned HTTP {status}")]
    Http { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("malformed session sequence from '{resolver}': {reason}")]
    Malformed { resolver: String, reason: String },

    #[error("calendar date error: {0}")]
    Date(#[from] DateError),

    #[error("calendar file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of valid trading sessions.
pub trait CalendarResolver: Send + Sync {
    /// Human-readable name of this resolver.
    fn name(&self) -> &str;

    /// Ascending trading sessions in `[start, end]`, inclusive.
    ///
    /// An empty or inverted range yields an empty vector, not an error.
    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError>;
}

/// Check a resolver response: strictly ascending and inside `[start, end]`.
pub fn check_sessions(
    resolver: &str,
    sessions: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), CalendarError> {
    let malformed = |reason: String| CalendarError::Malformed {
        resolver: resolver.to_string(),
        reason,
    };

    for pair in sessions.windows(2) {
        if pair[1] <= pair[0] {
            return Err(malformed(format!(
                "sessions not strictly ascending at {} -> {}",
                pair[0], pair[1]
            )));
        }
    }
    if let Some(first) = sessions.first() {
        if *first < start {
            return Err(malformed(format!("session {first} precedes range start {start}")));
        }
    }
    if let Some(last) = sessions.last() {
        if *last > end {
            return Err(malformed(format!("session {last} follows range end {end}")));
        }
    }
    Ok(())
}

/// Monday-to-Friday sessions minus a holiday set.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }
}

impl CalendarResolver for WeekdayCalendar {
    fn name(&self) -> &str {
        "weekday"
    }

    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError> {
        let mut out = Vec::new();
        let mut current = start;
        while current <= end {
            if self.is_session(current) {
                out.push(current);
            }
            match current.checked_add_days(Days::new(1)) {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(out)
    }
}

/// An explicit session list, e.g. exported from the platform.
#[derive(Debug, Clone, Default)]
pub struct FixedCalendar {
    sessions: BTreeSet<NaiveDate>,
}

impl FixedCalendar {
    pub fn new(sessions: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
        }
    }

    /// Parse one date per line. Blank lines and `#` comments are skipped.
    pub fn from_text(content: &str) -> Result<Self, CalendarError> {
        let mut sessions = BTreeSet::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            sessions.insert(parse_date(line)?);
        }
        Ok(Self { sessions })
    }

    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_text(&content)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl CalendarResolver for FixedCalendar {
    fn name(&self) -> &str {
        "fixed"
    }

    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self.sessions.range(start..=end).copied().collect())
    }
}
