//! Trading-platform calendar over HTTP.
//!
//! Calls `GET {base_url}/calendar?start_date=YYYYMMDD&end_date=YYYYMMDD` with a
//! bearer token. The service answers with either a `dates` or a `trading_days`
//! array. Retry with exponential backoff lives here in the transport; the
//! position engine itself never retries.

use super::calendar::{CalendarError, CalendarResolver};
use crate::domain::{parse_date, to_compact};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles on each retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    dates: Option<Vec<String>>,
    trading_days: Option<Vec<String>>,
}

/// HTTP calendar resolver.
pub struct HttpCalendar {
    client: reqwest::blocking::Client,
    base_url: String,
    token: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpCalendar {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, CalendarError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CalendarError::NetworkUnreachable(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Change the retry count, keeping the backoff delay.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn calendar_url(&self) -> String {
        format!("{}/calendar", self.base_url)
    }

    /// Parse the calendar response body into dates.
    fn parse_response(resp: CalendarResponse) -> Result<Vec<NaiveDate>, CalendarError> {
        let raw = resp.dates.or(resp.trading_days).ok_or_else(|| {
            CalendarError::ResponseFormatChanged(
                "neither 'dates' nor 'trading_days' present".into(),
            )
        })?;

        raw.iter()
            .map(|text| {
                // Some deployments return timestamps like 2024-01-02T00:00:00
                let day = text.split('T').next().unwrap_or(text);
                parse_date(day).map_err(CalendarError::from)
            })
            .collect()
    }

    fn fetch_with_retry(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        let url = self.calendar_url();
        let params = [("start_date", to_compact(start)), ("end_date", to_compact(end))];
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, ?delay, "retrying calendar request");
                std::thread::sleep(delay);
            }

            let request = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .query(&params);

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(CalendarError::AuthenticationRequired(
                            "calendar service rejected the token".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        warn!(retry_after, "calendar service rate limited");
                        last_error = Some(CalendarError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = Some(CalendarError::Http {
                            status: status.as_u16(),
                        });
                        continue;
                    }

                    if !status.is_success() {
                        return Err(CalendarError::Http {
                            status: status.as_u16(),
                        });
                    }

                    let body: CalendarResponse = resp.json().map_err(|e| {
                        CalendarError::ResponseFormatChanged(format!(
                            "failed to parse calendar response: {e}"
                        ))
                    })?;
                    return Self::parse_response(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(CalendarError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(CalendarError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CalendarError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl CalendarResolver for HttpCalendar {
    fn name(&self) -> &str {
        "http"
    }

    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CalendarError> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut sessions = self.fetch_with_retry(start, end)?;
        // The service does not promise an order. Duplicates survive the sort
        // and are rejected by the engine's session check.
        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_dates_key() {
        let resp: CalendarResponse =
            serde_json::from_str(r#"{"dates": ["2024-01-02", "20240103"]}"#).unwrap();
        let dates = HttpCalendar::parse_response(resp).unwrap();
        assert_eq!(dates, vec![d(2024, 1, 2), d(2024, 1, 3)]);
    }

    #[test]
    fn parses_trading_days_key_with_timestamps() {
        let resp: CalendarResponse =
            serde_json::from_str(r#"{"trading_days": ["2024-01-02T00:00:00"]}"#).unwrap();
        let dates = HttpCalendar::parse_response(resp).unwrap();
        assert_eq!(dates, vec![d(2024, 1, 2)]);
    }

    #[test]
    fn unknown_shape_is_format_error() {
        let resp: CalendarResponse = serde_json::from_str(r#"{"sessions": []}"#).unwrap();
        assert!(matches!(
            HttpCalendar::parse_response(resp),
            Err(CalendarError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn invalid_date_is_surfaced() {
        let resp: CalendarResponse = serde_json::from_str(r#"{"dates": ["20240001"]}"#).unwrap();
        assert!(matches!(
            HttpCalendar::parse_response(resp),
            Err(CalendarError::Date(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let cal = HttpCalendar::new("https://api.example.com/", "token").unwrap();
        assert_eq!(cal.calendar_url(), "https://api.example.com/calendar");
    }

    #[test]
    fn max_retries_override_keeps_default_delay() {
        let cal = HttpCalendar::new("https://api.example.com", "token").unwrap();
        assert_eq!(cal.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(cal.base_delay, DEFAULT_RETRY_DELAY);

        let cal = cal.with_max_retries(7);
        assert_eq!(cal.max_retries, 7);
        assert_eq!(cal.base_delay, DEFAULT_RETRY_DELAY);
    }
}
