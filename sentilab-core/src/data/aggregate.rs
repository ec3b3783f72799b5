//! Collapse scored mentions into daily per-security observations.

use super::mapping::TickerMap;
use super::store::stable_mean;
use crate::domain::{Observation, ScoredMention, SecurityKey};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Outcome of aggregating a batch of mentions.
#[derive(Debug, Clone)]
pub struct Aggregated {
    /// One observation per (security, date): mean sentiment, weight = mention count.
    pub observations: Vec<Observation>,
    /// Mentions whose ticker had no mapping.
    pub unmapped_mentions: usize,
    /// Distinct unmapped tickers, sorted.
    pub unmapped_tickers: BTreeSet<String>,
}

/// Map tickers to security keys and average sentiment per (security, date).
///
/// Non-finite sentiments are dropped here rather than poisoning the mean.
pub fn aggregate_daily(mentions: &[ScoredMention], map: &TickerMap) -> Aggregated {
    let mut groups: BTreeMap<(SecurityKey, NaiveDate), Vec<f64>> = BTreeMap::new();
    let mut unmapped_mentions = 0;
    let mut unmapped_tickers = BTreeSet::new();

    for mention in mentions {
        let Some(key) = map.get(&mention.ticker) else {
            unmapped_mentions += 1;
            unmapped_tickers.insert(mention.ticker.trim().to_uppercase());
            continue;
        };
        if !mention.sentiment.is_finite() {
            continue;
        }
        groups
            .entry((key.clone(), mention.date))
            .or_default()
            .push(mention.sentiment);
    }

    let observations: Vec<Observation> = groups
        .into_iter()
        .map(|((key, date), mut values)| {
            let count = values.len() as f64;
            Observation::new(key, date, stable_mean(&mut values)).with_weight(count)
        })
        .collect();

    info!(
        mentions = mentions.len(),
        observations = observations.len(),
        unmapped = unmapped_mentions,
        "aggregated mentions into daily sentiment"
    );

    Aggregated {
        observations,
        unmapped_mentions,
        unmapped_tickers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(ticker: &str, day: u32, sentiment: f64) -> ScoredMention {
        ScoredMention {
            ticker: ticker.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            sentiment,
            score: None,
        }
    }

    #[test]
    fn averages_and_counts_per_day() {
        let map = TickerMap::default_us();
        let mentions = vec![
            mention("AAPL", 2, 0.5),
            mention("aapl", 2, 0.1),
            mention("TSLA", 2, -0.4),
            mention("AAPL", 3, 0.2),
        ];
        let agg = aggregate_daily(&mentions, &map);
        assert_eq!(agg.observations.len(), 3);
        assert_eq!(agg.unmapped_mentions, 0);

        let aapl_day2 = agg
            .observations
            .iter()
            .find(|o| o.security_key.as_str() == "001690001" && o.date == mention("AAPL", 2, 0.0).date)
            .unwrap();
        assert!((aapl_day2.sentiment - 0.3).abs() < 1e-12);
        assert_eq!(aapl_day2.weight, Some(2.0));
    }

    #[test]
    fn unmapped_tickers_are_counted_and_dropped() {
        let map = TickerMap::default_us();
        let mentions = vec![
            mention("YOLO", 2, 0.9),
            mention("yolo", 3, 0.9),
            mention("MSFT", 2, 0.2),
        ];
        let agg = aggregate_daily(&mentions, &map);
        assert_eq!(agg.observations.len(), 1);
        assert_eq!(agg.unmapped_mentions, 2);
        assert_eq!(agg.unmapped_tickers.len(), 1);
        assert!(agg.unmapped_tickers.contains("YOLO"));
    }

    #[test]
    fn huge_scores_still_form_a_valid_observation() {
        let map = TickerMap::default_us();
        let agg = aggregate_daily(&[mention("AAPL", 2, 1e308), mention("AAPL", 2, 1e308)], &map);
        assert_eq!(agg.observations.len(), 1);
        assert_eq!(agg.observations[0].sentiment, 1e308);
        assert!(crate::data::ObservationStore::new(agg.observations).is_ok());
    }

    #[test]
    fn non_finite_scores_are_skipped() {
        let map = TickerMap::default_us();
        let agg = aggregate_daily(&[mention("AAPL", 2, f64::NAN)], &map);
        assert!(agg.observations.is_empty());
    }
}
