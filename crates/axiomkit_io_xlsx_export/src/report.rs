//! Export report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::spec::{SpecArtifactDescriptor, SpecSheetSlice};

/// Outcome of one successful export call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReportExport {
    /// Composed base file name (before any part suffix).
    pub file_name_base: String,
    /// Persisted artifacts, in production order.
    pub artifacts: Vec<SpecArtifactDescriptor>,
    /// Worksheets written, in production order.
    pub sheets: Vec<SpecSheetSlice>,
    /// Data rows written across all worksheets.
    pub cnt_rows_data: u64,
    /// Non-fatal diagnostics (value conversion fallbacks).
    pub warnings: Vec<String>,
}

impl ReportExport {
    /// Number of persisted artifacts.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Number of worksheets written.
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_artifacts".to_string(), self.artifact_count() as u64);
        dict_counts.insert("cnt_sheets".to_string(), self.sheet_count() as u64);
        dict_counts.insert("cnt_rows_data".to_string(), self.cnt_rows_data);
        dict_counts.insert(
            "cnt_bytes".to_string(),
            self.artifacts.iter().map(|artifact| artifact.size_bytes).sum(),
        );
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} name={} artifacts={} sheets={} rows={} bytes={} warnings={}",
            self.file_name_base,
            dict_counts["cnt_artifacts"],
            dict_counts["cnt_sheets"],
            dict_counts["cnt_rows_data"],
            dict_counts["cnt_bytes"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}

/// Mutable accumulator filled while an export runs.
#[derive(Debug, Default, Clone)]
pub struct ReportExportBuilder {
    /// See [`ReportExport::file_name_base`].
    pub file_name_base: String,
    /// See [`ReportExport::artifacts`].
    pub artifacts: Vec<SpecArtifactDescriptor>,
    /// See [`ReportExport::sheets`].
    pub sheets: Vec<SpecSheetSlice>,
    /// See [`ReportExport::cnt_rows_data`].
    pub cnt_rows_data: u64,
    /// See [`ReportExport::warnings`].
    pub warnings: Vec<String>,
}

impl ReportExportBuilder {
    pub fn new(file_name_base: impl Into<String>) -> Self {
        Self {
            file_name_base: file_name_base.into(),
            ..Default::default()
        }
    }

    /// Record one written worksheet and its rows.
    pub fn add_sheet(&mut self, sheet: SpecSheetSlice) {
        self.cnt_rows_data += sheet.n_rows_data() as u64;
        self.sheets.push(sheet);
    }

    /// Record one persisted artifact.
    pub fn add_artifact(&mut self, artifact: SpecArtifactDescriptor) {
        self.artifacts.push(artifact);
    }

    /// Add warning messages.
    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    /// Index the next persisted artifact will get.
    pub fn n_idx_artifact_next(&self) -> usize {
        self.artifacts.len()
    }

    /// Hand out the artifacts persisted so far (failure path).
    pub fn into_artifacts(self) -> Vec<SpecArtifactDescriptor> {
        self.artifacts
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportExport {
        ReportExport {
            file_name_base: self.file_name_base,
            artifacts: self.artifacts,
            sheets: self.sheets,
            cnt_rows_data: self.cnt_rows_data,
            warnings: self.warnings,
        }
    }
}
