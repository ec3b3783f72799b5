//! Observation loading for the runner.
//!
//! Reads sentiment from a CSV file in one of two layouts and returns a
//! validated `ObservationStore`. Implements the fallback policy:
//! 1. If the input file exists → parse it (observations, or mentions
//!    aggregated through a ticker map)
//! 2. If it is missing and `synthetic` is set → generate synthetic
//!    observations (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Synthetic data is a developer-only debug mode. Runs on synthetic data are
//! tagged in their manifest.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use sentilab_core::data::{aggregate_daily, MappingError, ObservationError, ObservationStore, TickerMap};
use sentilab_core::domain::{parse_date, DateError, Observation, ScoredMention};

use crate::config::{InputFormat, ObservationsConfig};

/// Errors from the observation loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("observation file '{}' not found (use --synthetic for synthetic data)", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("'{}' line {line}: {source}", path.display())]
    Date {
        path: PathBuf,
        line: usize,
        source: DateError,
    },

    #[error("invalid observation: {0}")]
    Observation(#[from] ObservationError),

    #[error("ticker map: {0}")]
    Mapping(#[from] MappingError),
}

/// Options controlling how observations are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub path: PathBuf,
    pub format: InputFormat,
    pub ticker_map: Option<PathBuf>,
    /// If true, generate synthetic observations when the file is missing.
    pub synthetic: bool,
    /// First date synthetic data must cover (include the validator lookback).
    pub start: NaiveDate,
    /// Last date synthetic data must cover.
    pub end: NaiveDate,
}

impl LoadOptions {
    pub fn from_config(config: &ObservationsConfig, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            path: config.path.clone(),
            format: config.format,
            ticker_map: config.ticker_map.clone(),
            synthetic: config.synthetic,
            start,
            end,
        }
    }
}

/// Where the loaded observations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Observations,
    Mentions,
    Synthetic,
}

/// Result of loading observations, including provenance.
#[derive(Debug)]
pub struct LoadedObservations {
    pub store: ObservationStore,
    pub source: DataSource,
    /// Input records read (mentions before aggregation).
    pub records: usize,
    /// Mentions dropped for lack of a ticker mapping.
    pub unmapped_mentions: usize,
    /// BLAKE3 over the loaded observations, independent of input order.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct ObservationRow {
    security_key: String,
    date: String,
    sentiment: f64,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MentionRow {
    ticker: String,
    date: String,
    sentiment: f64,
    #[serde(default)]
    score: Option<f64>,
}

/// Load observations according to `opts`, with synthetic fallback.
pub fn load_observations(opts: &LoadOptions) -> Result<LoadedObservations, LoadError> {
    if !opts.path.exists() {
        if opts.synthetic {
            warn!(
                path = %opts.path.display(),
                "observation file missing, generating synthetic data; results will be tagged as synthetic"
            );
            let map = load_ticker_map(opts.ticker_map.as_deref())?;
            let observations = generate_synthetic_observations(&map, opts.start, opts.end);
            let records = observations.len();
            let store = ObservationStore::new(observations)?;
            return Ok(finish(store, DataSource::Synthetic, records, 0));
        }
        return Err(LoadError::NotFound {
            path: opts.path.clone(),
        });
    }

    match opts.format {
        InputFormat::Observations => {
            let observations = read_observations_csv(&opts.path)?;
            let records = observations.len();
            let store = ObservationStore::new(observations)?;
            Ok(finish(store, DataSource::Observations, records, 0))
        }
        InputFormat::Mentions => {
            let mentions = read_mentions_csv(&opts.path)?;
            let map = load_ticker_map(opts.ticker_map.as_deref())?;
            let aggregated = aggregate_daily(&mentions, &map);
            if !aggregated.unmapped_tickers.is_empty() {
                warn!(
                    count = aggregated.unmapped_tickers.len(),
                    tickers = ?aggregated.unmapped_tickers,
                    "mentions with unmapped tickers were dropped"
                );
            }
            let store = ObservationStore::new(aggregated.observations)?;
            Ok(finish(
                store,
                DataSource::Mentions,
                mentions.len(),
                aggregated.unmapped_mentions,
            ))
        }
    }
}

fn finish(
    store: ObservationStore,
    source: DataSource,
    records: usize,
    unmapped_mentions: usize,
) -> LoadedObservations {
    let dataset_hash = compute_dataset_hash(&store);
    info!(
        ?source,
        records,
        observations = store.len(),
        securities = store.securities().len(),
        "loaded sentiment observations"
    );
    LoadedObservations {
        has_synthetic: source == DataSource::Synthetic,
        store,
        source,
        records,
        unmapped_mentions,
        dataset_hash,
    }
}

fn load_ticker_map(path: Option<&Path>) -> Result<TickerMap, LoadError> {
    match path {
        Some(p) => Ok(TickerMap::from_file(p)?),
        None => Ok(TickerMap::default_us()),
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_row_date(path: &Path, index: usize, text: &str) -> Result<NaiveDate, LoadError> {
    parse_date(text).map_err(|source| LoadError::Date {
        path: path.to_path_buf(),
        // header is line 1
        line: index + 2,
        source,
    })
}

/// Read `security_key,date,sentiment[,weight]` rows.
pub fn read_observations_csv(path: &Path) -> Result<Vec<Observation>, LoadError> {
    let mut reader = csv_reader(path)?;
    let mut out = Vec::new();
    for (index, row) in reader.deserialize::<ObservationRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let date = parse_row_date(path, index, &row.date)?;
        let mut obs = Observation::new(row.security_key, date, row.sentiment);
        obs.weight = row.weight;
        out.push(obs);
    }
    Ok(out)
}

/// Read `ticker,date,sentiment[,score]` rows.
pub fn read_mentions_csv(path: &Path) -> Result<Vec<ScoredMention>, LoadError> {
    let mut reader = csv_reader(path)?;
    let mut out = Vec::new();
    for (index, row) in reader.deserialize::<MentionRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        out.push(ScoredMention {
            date: parse_row_date(path, index, &row.date)?,
            ticker: row.ticker,
            sentiment: row.sentiment,
            score: row.score,
        });
    }
    Ok(out)
}

/// Deterministic BLAKE3 hash over all observations.
///
/// Observations are hashed in sorted (key, date, sentiment, weight) order so
/// the hash does not depend on file order. A missing weight hashes as -1.
pub fn compute_dataset_hash(store: &ObservationStore) -> String {
    let weight = |obs: &Observation| obs.weight.unwrap_or(-1.0);
    let mut sorted: Vec<&Observation> = store.iter().collect();
    sorted.sort_by(|a, b| {
        a.security_key
            .cmp(&b.security_key)
            .then(a.date.cmp(&b.date))
            .then(a.sentiment.total_cmp(&b.sentiment))
            .then(weight(a).total_cmp(&weight(b)))
    });

    let mut hasher = blake3::Hasher::new();
    for obs in sorted {
        hasher.update(obs.security_key.as_str().as_bytes());
        hasher.update(obs.date.to_string().as_bytes());
        hasher.update(&obs.sentiment.to_le_bytes());
        hasher.update(&weight(obs).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate synthetic daily sentiment for every security in the map.
///
/// Each security gets a mean-reverting walk in [-1, 1], reported on roughly
/// two weekdays in three. Seeded per security key so output is reproducible.
fn generate_synthetic_observations(
    map: &TickerMap,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Observation> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    keys.dedup();

    let mut out = Vec::new();
    for key in keys {
        let seed: [u8; 32] = *blake3::hash(key.as_str().as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);
        let mut level = 0.0_f64;

        for date in start.iter_days().take_while(|d| *d <= end) {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            level = (0.8 * level + rng.gen_range(-0.4..0.4)).clamp(-1.0, 1.0);
            if rng.gen_bool(0.65) {
                let mentions = rng.gen_range(1..40u32);
                out.push(Observation::new(key.clone(), date, level).with_weight(mentions as f64));
            }
        }
    }
    out
}
