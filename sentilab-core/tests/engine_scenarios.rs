//! Scenario tests for the position engine and the start-end validator.
//!
//! Each scenario pins an exact numeric expectation on a small, hand-built
//! observation set over the weekday calendar starting Tuesday 2024-01-02.

use chrono::NaiveDate;
use std::sync::Arc;

use sentilab_core::data::{CalendarResolver, ObservationStore, WeekdayCalendar};
use sentilab_core::domain::{Observation, SecurityKey};
use sentilab_core::engine::{PositionEngine, MAX_POSITION, NOTIONAL_BASE};
use sentilab_core::validate::{StartEndValidator, ValidatorConfig};

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn engine() -> PositionEngine {
    PositionEngine::new(Arc::new(WeekdayCalendar::new()))
}

fn sessions(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    WeekdayCalendar::new().sessions(start, end).unwrap()
}

fn key(k: &str) -> SecurityKey {
    SecurityKey::from(k)
}

#[test]
fn single_security_rising_sentiment() {
    let days = sessions(d(1, 2), d(1, 15));
    assert_eq!(days.len(), 10);
    let obs = days
        .iter()
        .enumerate()
        .map(|(i, date)| Observation::new("001690001", *date, 0.1 * (i as f64 + 1.0)))
        .collect();
    let store = ObservationStore::new(obs).unwrap();

    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 15), 1.0)
        .unwrap();

    let col = m.column(&key("001690001")).unwrap();
    assert_eq!(col[0], 0.0);
    for v in &col[1..] {
        assert_eq!(*v, MAX_POSITION);
    }
}

#[test]
fn two_securities_opposite_sentiment() {
    let store = ObservationStore::new(vec![
        Observation::new("A00000001", d(1, 2), 0.8),
        Observation::new("B00000001", d(1, 2), -0.7),
    ])
    .unwrap();

    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 3), 1.0)
        .unwrap();

    assert_eq!(m.row(0), Some(&[0.0, 0.0][..]));
    let a = m.position(d(1, 3), &key("A00000001")).unwrap();
    let b = m.position(d(1, 3), &key("B00000001")).unwrap();
    assert!((a - 0.8 / 1.5 * NOTIONAL_BASE).abs() < 1e-3, "a = {a}");
    assert!((b + 0.7 / 1.5 * NOTIONAL_BASE).abs() < 1e-3, "b = {b}");
    assert!(a > 0.0 && b < 0.0);
    assert!((a.abs() + b.abs() - NOTIONAL_BASE).abs() < 1e-3);
}

#[test]
fn huge_duplicate_readings_keep_the_session_signal() {
    let store = ObservationStore::new(vec![
        Observation::new("A00000001", d(1, 2), 1e308),
        Observation::new("A00000001", d(1, 2), 1e308),
        Observation::new("B00000001", d(1, 2), -1e308),
    ])
    .unwrap();

    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 3), 1.0)
        .unwrap();

    let a = m.position(d(1, 3), &key("A00000001")).unwrap();
    let b = m.position(d(1, 3), &key("B00000001")).unwrap();
    assert!(a > 0.0 && b < 0.0, "row zeroed: A={a} B={b}");
    assert!((a - 0.5 * NOTIONAL_BASE).abs() < 1e-3);
    assert!((b + 0.5 * NOTIONAL_BASE).abs() < 1e-3);
}

#[test]
fn empty_observation_set_keeps_session_rows() {
    let m = engine()
        .generate_positions(&ObservationStore::empty(), d(1, 1), d(1, 31), 1.0)
        .unwrap();
    assert_eq!(m.sessions(), sessions(d(1, 1), d(1, 31)).as_slice());
    assert_eq!(m.n_cols(), 0);
}

#[test]
fn stale_sentiment_decays_after_horizon() {
    let days = sessions(d(1, 2), d(1, 16));
    assert_eq!(days.len(), 11);
    let store = ObservationStore::new(vec![Observation::new("A00000001", days[0], -0.3)]).unwrap();

    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 16), 1.0)
        .unwrap();
    let col = m.column(&key("A00000001")).unwrap();

    // Pre-shift: sessions 1..=6 carry the reading, 7 onward are neutral.
    // Post-shift that is rows 1..=6 short, row 0 and rows 7.. flat.
    assert_eq!(col[0], 0.0);
    for v in &col[1..=6] {
        assert_eq!(*v, -NOTIONAL_BASE);
    }
    for v in &col[7..] {
        assert_eq!(*v, 0.0);
    }
}

#[test]
fn duplicate_readings_are_averaged_before_pivot() {
    let store = ObservationStore::new(vec![
        Observation::new("A00000001", d(1, 2), 0.2),
        Observation::new("A00000001", d(1, 2), 0.6),
        Observation::new("B00000001", d(1, 2), 0.4),
    ])
    .unwrap();
    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 3), 1.0)
        .unwrap();
    let a = m.position(d(1, 3), &key("A00000001")).unwrap();
    let b = m.position(d(1, 3), &key("B00000001")).unwrap();
    assert!((a - b).abs() < 1e-6);
    assert!((a - NOTIONAL_BASE / 2.0).abs() < 1e-3);
}

#[test]
fn weekend_readings_do_not_reach_the_matrix() {
    let store = ObservationStore::new(vec![
        Observation::new("A00000001", d(1, 6), 0.9), // Saturday
        Observation::new("B00000001", d(1, 5), 0.5), // Friday
    ])
    .unwrap();
    let m = engine()
        .generate_positions(&store, d(1, 5), d(1, 9), 1.0)
        .unwrap();
    assert_eq!(m.sessions(), &[d(1, 5), d(1, 8), d(1, 9)]);
    // The column survives the pivot but never holds a position.
    assert_eq!(m.column(&key("A00000001")).unwrap(), vec![0.0, 0.0, 0.0]);
    assert_eq!(
        m.column(&key("B00000001")).unwrap(),
        vec![0.0, NOTIONAL_BASE, NOTIONAL_BASE]
    );
}

#[test]
fn malformed_keys_are_dropped_after_normalization() {
    let store = ObservationStore::new(vec![
        Observation::new("A00000001", d(1, 2), 0.5),
        Observation::new("AAPL", d(1, 2), 0.5),
    ])
    .unwrap();
    let m = engine()
        .generate_positions(&store, d(1, 2), d(1, 3), 1.0)
        .unwrap();
    assert_eq!(m.columns(), &[key("A00000001")]);
    // The malformed column still took its share of the session weight.
    assert_eq!(m.position(d(1, 3), &key("A00000001")), Some(NOTIONAL_BASE / 2.0));
}

fn daily_history(from: NaiveDate, to: NaiveDate) -> ObservationStore {
    let mut obs = Vec::new();
    for (i, date) in sessions(from, to).into_iter().enumerate() {
        let x = i as f64;
        obs.push(Observation::new("001690001", date, (x * 0.37).sin()));
        if i % 3 != 0 {
            obs.push(Observation::new("184996001", date, (x * 0.11).cos() - 0.2));
        }
        if i % 7 == 0 {
            obs.push(Observation::new("012141001", date, -0.5));
        }
    }
    ObservationStore::new(obs).unwrap()
}

#[test]
fn validator_passes_on_dense_history() {
    let store = daily_history(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), d(6, 28));
    let engine = engine();
    let report = StartEndValidator::new(&engine)
        .validate(&store, d(1, 2), d(3, 29), 1.0)
        .unwrap();

    assert!(report.passed, "report: {report:?}");
    assert!(report.total_abs_diff <= 1.0);
    assert!(report.overlap_sessions > 0);
    assert_eq!(report.compared_sessions, report.overlap_sessions - 6);
    // The later run's warm-up still shows in the whole-overlap figure.
    assert!(report.overlap_abs_diff > 1.0);
    assert_eq!(
        report.lookback_starts,
        [
            NaiveDate::from_ymd_opt(2023, 9, 24).unwrap(),
            NaiveDate::from_ymd_opt(2023, 11, 13).unwrap()
        ]
    );
}

#[test]
fn validator_without_burn_in_sees_the_later_run_warm_up() {
    let store = daily_history(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), d(6, 28));
    let engine = engine();
    let config = ValidatorConfig {
        burn_in_sessions: 0,
        ..ValidatorConfig::default()
    };
    let report = StartEndValidator::with_config(&engine, config)
        .validate(&store, d(1, 2), d(3, 29), 1.0)
        .unwrap();

    assert!(!report.passed);
    assert!(!report.worst_securities.is_empty());
    assert!(report.worst_securities.len() <= 3);
}

#[test]
fn validator_handles_january_start() {
    // 2024-01-01 minus 100 days lands in September; integer arithmetic on
    // 20240101 would give 20240001, which is not a date.
    let store = daily_history(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), d(2, 28));
    let engine = engine();
    let report = StartEndValidator::new(&engine)
        .validate(&store, d(1, 1), d(1, 31), 2.0)
        .unwrap();
    assert_eq!(
        report.lookback_starts[0],
        NaiveDate::from_ymd_opt(2023, 9, 23).unwrap()
    );
    assert!(report.passed);
}
