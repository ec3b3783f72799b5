//! Column transforms applied by the position engine, in pipeline order.
//!
//! Cells are column-major: `cells[col][row]`, with rows on the session axis.
//! Every function here is total over finite input and never emits NaN.

use crate::domain::SecurityKey;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Pivot daily means into one column per security, reindexed onto `sessions`.
///
/// Dates that are not sessions are dropped. Columns come out in key order and
/// include every security present in `means`, even one whose readings all
/// fell on non-session dates.
pub fn align_to_sessions(
    means: &BTreeMap<(SecurityKey, NaiveDate), f64>,
    sessions: &[NaiveDate],
) -> (Vec<SecurityKey>, Vec<Vec<Option<f64>>>) {
    let mut columns: Vec<SecurityKey> = Vec::new();
    let mut cells: Vec<Vec<Option<f64>>> = Vec::new();

    for ((key, date), value) in means {
        if columns.last() != Some(key) {
            columns.push(key.clone());
            cells.push(vec![None; sessions.len()]);
        }
        if let Ok(row) = sessions.binary_search(date) {
            if let Some(col) = cells.last_mut() {
                col[row] = Some(*value);
            }
        }
    }

    (columns, cells)
}

/// Carry the last reading forward for at most `horizon` unset cells.
///
/// Cells past the horizon, and leading cells with no prior reading, are neutral.
pub fn forward_fill_bounded(column: &[Option<f64>], horizon: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(column.len());
    let mut last: Option<f64> = None;
    let mut gap = 0usize;

    for cell in column {
        match cell {
            Some(v) => {
                last = Some(*v);
                gap = 0;
                out.push(*v);
            }
            None => {
                gap += 1;
                match last {
                    Some(v) if gap <= horizon => out.push(v),
                    _ => out.push(0.0),
                }
            }
        }
    }

    out
}

/// Scale each session row so its absolute values sum to 1.
///
/// A row with no sentiment stays all zero. Values are first divided by the
/// row's largest magnitude so the absolute sum cannot overflow.
pub fn normalize_rows(cells: &mut [Vec<f64>]) {
    let n_rows = cells.first().map_or(0, Vec::len);

    for row in 0..n_rows {
        let peak = cells.iter().map(|c| c[row].abs()).fold(0.0_f64, f64::max);
        if peak == 0.0 || !peak.is_finite() {
            for col in cells.iter_mut() {
                col[row] = 0.0;
            }
            continue;
        }

        let total: f64 = cells.iter().map(|c| (c[row] / peak).abs()).sum();
        for col in cells.iter_mut() {
            col[row] = (col[row] / peak) / total;
        }
    }
}

/// Multiply every cell by the gross notional.
pub fn scale(cells: &mut [Vec<f64>], gross: f64) {
    for col in cells.iter_mut() {
        for v in col.iter_mut() {
            *v *= gross;
        }
    }
}

/// Move every column down one session, leaving a zero first row.
///
/// The value for session `t` is then derived only from sentiment up to `t - 1`.
pub fn shift_forward(cells: &mut [Vec<f64>]) {
    for col in cells.iter_mut() {
        if col.is_empty() {
            continue;
        }
        col.rotate_right(1);
        col[0] = 0.0;
    }
}

/// Clamp every cell to `[-limit, limit]`.
pub fn clip(cells: &mut [Vec<f64>], limit: f64) {
    for col in cells.iter_mut() {
        for v in col.iter_mut() {
            *v = v.clamp(-limit, limit);
        }
    }
}

/// Drop columns whose key is not exactly `width` characters.
pub fn sanitize_columns(
    columns: Vec<SecurityKey>,
    cells: Vec<Vec<f64>>,
    width: usize,
) -> (Vec<SecurityKey>, Vec<Vec<f64>>) {
    columns
        .into_iter()
        .zip(cells)
        .filter(|(key, _)| key.is_well_formed(width))
        .unzip()
}
