//! Criterion benchmarks for SentiLab hot paths.
//!
//! Benchmarks:
//! 1. Full position generation (one year, growing universe)
//! 2. Transform stages in isolation (fill, normalize)
//! 3. Start-end validation (two extra engine runs plus comparison)

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use sentilab_core::data::{daily_means, CalendarResolver, ObservationStore, WeekdayCalendar};
use sentilab_core::domain::Observation;
use sentilab_core::engine::transform::{forward_fill_bounded, normalize_rows};
use sentilab_core::engine::PositionEngine;
use sentilab_core::validate::StartEndValidator;

// ── Helpers ──────────────────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

/// Sparse daily sentiment: each security reports on roughly two days in three.
fn make_store(n_securities: usize, n_days: i64) -> ObservationStore {
    let mut obs = Vec::new();
    for s in 0..n_securities {
        let key = format!("{:06}001", s);
        for day in 0..n_days {
            if (day as usize + s) % 3 == 0 {
                continue;
            }
            let x = (day as f64) * 0.13 + s as f64;
            obs.push(Observation::new(
                key.as_str(),
                base_date() + Duration::days(day),
                x.sin(),
            ));
        }
    }
    ObservationStore::new(obs).unwrap()
}

fn engine() -> PositionEngine {
    PositionEngine::new(Arc::new(WeekdayCalendar::new()))
}

// ── 1. Position Generation ───────────────────────────────────────────

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_positions");
    let start = base_date() + Duration::days(200);
    let end = start + Duration::days(365);

    for &n in &[10usize, 100, 500] {
        let store = make_store(n, 600);
        let engine = engine();
        group.bench_with_input(BenchmarkId::new("one_year", n), &n, |b, _| {
            b.iter(|| {
                engine
                    .generate_positions(black_box(&store), start, end, black_box(1.0))
                    .unwrap()
            });
        });
    }

    group.finish();
}

// ── 2. Transform Stages ──────────────────────────────────────────────

fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");

    let sessions = WeekdayCalendar::new()
        .sessions(base_date(), base_date() + Duration::days(365))
        .unwrap();
    let store = make_store(200, 365);
    let column: Vec<Option<f64>> = (0..sessions.len())
        .map(|i| if i % 7 == 0 { Some(i as f64) } else { None })
        .collect();

    group.bench_function("daily_means_200", |b| {
        b.iter(|| daily_means(black_box(&store).iter()));
    });

    group.bench_function("forward_fill_260", |b| {
        b.iter(|| forward_fill_bounded(black_box(&column), 5));
    });

    let filled: Vec<Vec<f64>> = (0..200)
        .map(|s| {
            (0..sessions.len())
                .map(|i| ((i + s) as f64 * 0.3).cos())
                .collect()
        })
        .collect();
    group.bench_function("normalize_200x260", |b| {
        b.iter(|| {
            let mut cells = filled.clone();
            normalize_rows(black_box(&mut cells));
            cells
        });
    });

    group.finish();
}

// ── 3. Validation ────────────────────────────────────────────────────

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("start_end_validation");
    let store = make_store(100, 600);
    let engine = engine();
    let start = base_date() + Duration::days(300);
    let end = start + Duration::days(180);

    group.bench_function("100_securities_6_months", |b| {
        b.iter(|| {
            StartEndValidator::new(&engine)
                .validate(black_box(&store), start, end, 1.0)
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_generate, bench_transforms, bench_validate);
criterion_main!(benches);
