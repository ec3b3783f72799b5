//! Dense position matrix: trading sessions × securities, signed dollars.
//!
//! Every cell is defined; a zero is "no position". A security absent from the
//! column set is likewise a zero position, which is how consumers must read
//! it since column order and column presence carry no other meaning.

use crate::domain::{parse_date, DateError, SecurityKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{rows} rows for {sessions} sessions")]
    RowCount { rows: usize, sessions: usize },

    #[error("index date error: {0}")]
    Date(#[from] DateError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionMatrix {
    sessions: Vec<NaiveDate>,
    columns: Vec<SecurityKey>,
    rows: Vec<Vec<f64>>,
}

impl PositionMatrix {
    /// A matrix with the given sessions and no columns.
    pub fn empty(sessions: Vec<NaiveDate>) -> Self {
        let rows = vec![Vec::new(); sessions.len()];
        Self {
            sessions,
            columns: Vec::new(),
            rows,
        }
    }

    /// Build from row-major cells, checking the shape.
    pub fn from_rows(
        sessions: Vec<NaiveDate>,
        columns: Vec<SecurityKey>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, MatrixError> {
        if rows.len() != sessions.len() {
            return Err(MatrixError::RowCount {
                rows: rows.len(),
                sessions: sessions.len(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(MatrixError::RowWidth {
                    row: i,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            sessions,
            columns,
            rows,
        })
    }

    /// Build from column-major cells. Each column must span every session.
    pub(crate) fn from_columns(
        sessions: Vec<NaiveDate>,
        columns: Vec<SecurityKey>,
        cells: Vec<Vec<f64>>,
    ) -> Self {
        let rows = (0..sessions.len())
            .map(|r| cells.iter().map(|col| col[r]).collect())
            .collect();
        Self {
            sessions,
            columns,
            rows,
        }
    }

    pub fn sessions(&self) -> &[NaiveDate] {
        &self.sessions
    }

    pub fn columns(&self) -> &[SecurityKey] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.sessions.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when there is no cell at all (no sessions or no securities).
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() || self.columns.is_empty()
    }

    pub fn first_session(&self) -> Option<NaiveDate> {
        self.sessions.first().copied()
    }

    pub fn last_session(&self) -> Option<NaiveDate> {
        self.sessions.last().copied()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[f64])> {
        self.sessions
            .iter()
            .copied()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn column_index(&self, key: &SecurityKey) -> Option<usize> {
        self.columns.iter().position(|c| c == key)
    }

    /// One security's position series, in session order.
    pub fn column(&self, key: &SecurityKey) -> Option<Vec<f64>> {
        let c = self.column_index(key)?;
        Some(self.rows.iter().map(|r| r[c]).collect())
    }

    /// Position held on `date` in `key`.
    ///
    /// `None` when `date` is not a row; `Some(0.0)` for a security with no column.
    pub fn position(&self, date: NaiveDate, key: &SecurityKey) -> Option<f64> {
        let r = self.sessions.binary_search(&date).ok()?;
        Some(self.column_index(key).map_or(0.0, |c| self.rows[r][c]))
    }

    /// Rows with `from <= session <= to`.
    pub fn slice(&self, from: NaiveDate, to: NaiveDate) -> PositionMatrix {
        let (sessions, rows) = self
            .sessions
            .iter()
            .zip(&self.rows)
            .filter(|(d, _)| **d >= from && **d <= to)
            .map(|(d, r)| (*d, r.clone()))
            .unzip();
        PositionMatrix {
            sessions,
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().flat_map(|r| r.iter().copied())
    }

    pub fn max_abs(&self) -> f64 {
        self.cells().map(f64::abs).fold(0.0, f64::max)
    }

    /// Aggregate statistics for logs and reports.
    pub fn summary(&self) -> PositionSummary {
        let n = self.n_rows();
        let (gross_total, active_total) = self.rows.iter().fold((0.0, 0usize), |(g, a), row| {
            (
                g + row.iter().map(|v| v.abs()).sum::<f64>(),
                a + row.iter().filter(|v| **v != 0.0).count(),
            )
        });
        let per_row = |total: f64| if n == 0 { 0.0 } else { total / n as f64 };

        PositionSummary {
            sessions: n,
            securities: self.n_cols(),
            first_session: self.first_session(),
            last_session: self.last_session(),
            max_abs_position: self.max_abs(),
            avg_gross_exposure: per_row(gross_total),
            avg_active_positions: per_row(active_total as f64),
        }
    }

    /// Deterministic BLAKE3 digest of sessions, columns and cell bits.
    ///
    /// Columns are hashed in sorted key order so the digest does not depend on
    /// column layout.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.sessions {
            hasher.update(date.to_string().as_bytes());
        }

        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by(|a, b| self.columns[*a].cmp(&self.columns[*b]));

        for c in order {
            hasher.update(self.columns[c].as_str().as_bytes());
            for row in &self.rows {
                hasher.update(&row[c].to_bits().to_le_bytes());
            }
        }

        hasher.finalize().to_hex().to_string()
    }

    /// Split transport view: column keys, ISO session index, row-major data.
    pub fn to_split(&self) -> SplitFrame {
        SplitFrame {
            columns: self.columns.iter().map(|c| c.as_str().to_string()).collect(),
            index: self.sessions.iter().map(|d| d.to_string()).collect(),
            data: self.rows.clone(),
        }
    }

    pub fn from_split(frame: SplitFrame) -> Result<Self, MatrixError> {
        let sessions = frame
            .index
            .iter()
            .map(|s| parse_date(s))
            .collect::<Result<Vec<_>, _>>()?;
        let columns = frame.columns.into_iter().map(SecurityKey::from).collect();
        Self::from_rows(sessions, columns, frame.data)
    }
}

/// Row/column/value transport layout consumed by the submission step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitFrame {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

/// Shape and exposure statistics of a position matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub sessions: usize,
    pub securities: usize,
    pub first_session: Option<NaiveDate>,
    pub last_session: Option<NaiveDate>,
    pub max_abs_position: f64,
    pub avg_gross_exposure: f64,
    pub avg_active_positions: f64,
}
