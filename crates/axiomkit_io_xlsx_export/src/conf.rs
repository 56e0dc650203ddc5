//! XLSX constants, default style presets and export configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::spec::{EnumPredefinedStyle, ExportError, SpecCellFormat};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Rows reserved for the header at the top of every worksheet.
pub const N_NROWS_HEADER: usize = 1;
/// Data rows that fit in one worksheet next to the header.
pub const N_NROWS_DATA_MAX: usize = N_NROWS_EXCEL_MAX - N_NROWS_HEADER;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Sheet name used when none is configured.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";
/// File extension of produced artifacts (without dot).
pub const C_XLSX_EXTENSION: &str = "xlsx";
/// MIME type of produced artifacts.
pub const C_XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build default style presets consumed by [`crate::style::StyleCatalog`].
pub fn derive_default_style_formats() -> BTreeMap<EnumPredefinedStyle, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat::default();

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumPredefinedStyle::Default, cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumPredefinedStyle::Header,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumPredefinedStyle::Number,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("#,##0.00".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumPredefinedStyle::Date,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("yyyy-mm-dd".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumPredefinedStyle::DateTime,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("yyyy-mm-dd hh:mm:ss".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumPredefinedStyle::Currency,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("#,##0.00".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumPredefinedStyle::Percentage,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(EnumPredefinedStyle::Boolean, cfg_base_fmt_spec.clone());
    dict_fmt.insert(EnumPredefinedStyle::Text, cfg_base_fmt_spec);

    dict_fmt
}

/// Process-level export settings (row cap, temp location, store prefix).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecExportConfig {
    /// Worksheet row cap including the header row.
    pub n_rows_sheet_max: usize,
    /// Directory for temporary artifact files; system temp dir when `None`.
    pub dir_temp: Option<PathBuf>,
    /// Prefix prepended to artifact names by stores that honor it.
    pub store_prefix: Option<String>,
}

impl Default for SpecExportConfig {
    fn default() -> Self {
        Self {
            n_rows_sheet_max: N_NROWS_EXCEL_MAX,
            dir_temp: None,
            store_prefix: None,
        }
    }
}

impl SpecExportConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ExportError> {
        let cfg: Self = toml::from_str(text)
            .map_err(|err| ExportError::InvalidConfiguration(format!("Bad config: {err}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Data rows per worksheet once the header row is reserved.
    pub fn n_rows_data_max(&self) -> usize {
        self.n_rows_sheet_max.saturating_sub(N_NROWS_HEADER)
    }

    /// Check the row cap fits the format.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.n_rows_sheet_max <= N_NROWS_HEADER || self.n_rows_sheet_max > N_NROWS_EXCEL_MAX {
            return Err(ExportError::InvalidConfiguration(format!(
                "n_rows_sheet_max must be in {}..={N_NROWS_EXCEL_MAX}, got {}.",
                N_NROWS_HEADER + 1,
                self.n_rows_sheet_max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_formats_cover_every_predefined_style() {
        let dict_fmt = derive_default_style_formats();
        for style in EnumPredefinedStyle::ALL {
            assert!(dict_fmt.contains_key(&style), "missing {style:?}");
        }
        assert_eq!(
            dict_fmt[&EnumPredefinedStyle::Percentage].num_format.as_deref(),
            Some("0.00%")
        );
        assert_eq!(dict_fmt[&EnumPredefinedStyle::Header].bold, Some(true));
    }

    #[test]
    fn test_export_config_from_toml_applies_defaults() {
        let cfg = SpecExportConfig::from_toml_str("store_prefix = \"reports/\"\n").unwrap();
        assert_eq!(cfg.n_rows_sheet_max, N_NROWS_EXCEL_MAX);
        assert_eq!(cfg.n_rows_data_max(), N_NROWS_DATA_MAX);
        assert_eq!(cfg.store_prefix.as_deref(), Some("reports/"));
    }

    #[test]
    fn test_export_config_rejects_out_of_range_row_cap() {
        let err = SpecExportConfig::from_toml_str("n_rows_sheet_max = 1\n").unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfiguration(_)));

        let err = SpecExportConfig::from_toml_str("n_rows_sheet_max = 2000000\n").unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfiguration(_)));

        let err = SpecExportConfig::from_toml_str("n_rows_max = 10\n").unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfiguration(_)));
    }
}
