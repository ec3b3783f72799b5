//! Artifact export: split JSON, matrix CSV, validation report, manifest.
//!
//! All persisted manifests carry a `schema_version`. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use sentilab_core::matrix::{PositionMatrix, SplitFrame};
use sentilab_core::validate::ValidationReport;

use crate::pipeline::{PipelineResult, RunManifest, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize positions in the platform's split layout.
pub fn export_split_json(positions: &PositionMatrix) -> Result<String> {
    serde_json::to_string(&positions.to_split()).context("failed to serialize positions to JSON")
}

/// Read positions back from split JSON, checking the shape.
pub fn import_split_json(json: &str) -> Result<PositionMatrix> {
    let frame: SplitFrame =
        serde_json::from_str(json).context("failed to deserialize split positions")?;
    PositionMatrix::from_split(frame).context("split positions have an invalid shape")
}

pub fn export_validation_json(report: &ValidationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize validation report")
}

pub fn export_manifest_json(manifest: &RunManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")
}

/// Deserialize a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export positions as CSV: `date,<security keys...>`, one row per session.
pub fn export_positions_csv(positions: &PositionMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date".to_string()];
    header.extend(positions.columns().iter().map(|k| k.as_str().to_string()));
    wtr.write_record(&header)?;

    for (date, row) in positions.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(date.to_string());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run into `output_dir`:
/// - `positions.json` (split layout)
/// - `positions.csv`
/// - `validation.json` (only when validation ran)
/// - `manifest.json`
///
/// Returns the paths written.
pub fn save_artifacts(result: &PipelineResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let mut written = Vec::new();
    let mut write = |name: &str, content: String| -> Result<()> {
        let path = output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
        Ok(())
    };

    write("positions.json", export_split_json(&result.positions)?)?;
    write("positions.csv", export_positions_csv(&result.positions)?)?;
    if let Some(report) = &result.validation {
        write("validation.json", export_validation_json(report)?)?;
    }
    write("manifest.json", export_manifest_json(&result.manifest())?)?;

    Ok(written)
}

/// Load the manifest and positions from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<(RunManifest, PositionMatrix)> {
    let manifest_path = dir.join("manifest.json");
    let manifest = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest = import_manifest_json(&manifest)?;

    let positions_path = dir.join("positions.json");
    let positions = std::fs::read_to_string(&positions_path)
        .with_context(|| format!("failed to read {}", positions_path.display()))?;
    let positions = import_split_json(&positions)?;

    if positions.fingerprint() != manifest.fingerprint {
        bail!(
            "positions in {} do not match the manifest fingerprint",
            dir.display()
        );
    }
    Ok((manifest, positions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sentilab_core::domain::SecurityKey;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample() -> PositionMatrix {
        PositionMatrix::from_rows(
            vec![d(2), d(3)],
            vec![SecurityKey::from("001690001"), SecurityKey::from("184996001")],
            vec![vec![0.0, 0.0], vec![53333333.5, -46666666.5]],
        )
        .unwrap()
    }

    #[test]
    fn split_json_layout() {
        let json = export_split_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["columns"][0], "001690001");
        assert_eq!(value["index"][1], "2024-01-03");
        assert_eq!(value["data"][1][1], -46666666.5);
    }

    #[test]
    fn split_json_reads_back() {
        let m = sample();
        let back = import_split_json(&export_split_json(&m).unwrap()).unwrap();
        assert_eq!(back.fingerprint(), m.fingerprint());
    }

    #[test]
    fn split_json_with_bad_shape_is_rejected() {
        let json = r#"{"columns":["001690001"],"index":["2024-01-02"],"data":[[1.0,2.0]]}"#;
        assert!(import_split_json(json).is_err());
    }

    #[test]
    fn positions_csv_has_date_header() {
        let csv = export_positions_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,001690001,184996001");
        assert_eq!(lines[1], "2024-01-02,0,0");
        assert_eq!(lines[2], "2024-01-03,53333333.5,-46666666.5");
    }

    #[test]
    fn empty_matrix_csv_is_header_only() {
        let csv = export_positions_csv(&PositionMatrix::empty(vec![])).unwrap();
        assert_eq!(csv.trim(), "date");
    }
}
