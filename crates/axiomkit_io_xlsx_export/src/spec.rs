//! Shared export specification models and error types.

use std::fmt;
use std::io;

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::XlsxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::C_SHEET_NAME_DEFAULT;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification, rendered to a backend format by the style catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color (`#RRGGBB`).
    pub bg_color: Option<String>,
    /// Font color (`#RRGGBB`).
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Semantic style identifiers resolved by the style catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumPredefinedStyle {
    /// Unformatted cell.
    Default,
    /// Header row cell.
    Header,
    /// Grouped decimal number.
    Number,
    /// Calendar date.
    Date,
    /// Date with time of day.
    DateTime,
    /// Money amount.
    Currency,
    /// Ratio shown as percent.
    Percentage,
    /// Boolean cell.
    Boolean,
    /// Plain text.
    Text,
}

impl EnumPredefinedStyle {
    /// Every style, in catalog order.
    pub const ALL: [EnumPredefinedStyle; 9] = [
        Self::Default,
        Self::Header,
        Self::Number,
        Self::Date,
        Self::DateTime,
        Self::Currency,
        Self::Percentage,
        Self::Boolean,
        Self::Text,
    ];
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordSpecification

/// One typed field value of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum EnumCellValue {
    /// Missing/null value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Floating point value.
    Number(f64),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time of day.
    DateTime(NaiveDateTime),
}

impl EnumCellValue {
    /// Whether the value is absent.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDate> for EnumCellValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumCellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<EnumCellValue>> From<Option<T>> for EnumCellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// Ordered field-name to value mapping for one input row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRecord {
    fields: Vec<(String, EnumCellValue)>,
}

impl SpecRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field_name: impl Into<String>, value: impl Into<EnumCellValue>) -> Self {
        self.insert(field_name, value);
        self
    }

    /// Insert or replace a field, keeping first-insertion order.
    pub fn insert(&mut self, field_name: impl Into<String>, value: impl Into<EnumCellValue>) {
        let c_field_name = field_name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == c_field_name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((c_field_name, value)),
        }
    }

    /// Look up a field by name; exact match first, then case-insensitive.
    pub fn get(&self, field_name: &str) -> Option<&EnumCellValue> {
        if let Some((_, value)) = self.fields.iter().find(|(name, _)| name == field_name) {
            return Some(value);
        }
        self.fields
            .iter()
            .find(|(name, _)| is_name_equal_ignore_case(name, field_name))
            .map(|(_, value)| value)
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_name_equal_ignore_case(left: &str, right: &str) -> bool {
    if left.is_ascii() && right.is_ascii() {
        return left.eq_ignore_ascii_case(right);
    }
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}

impl<K: Into<String>, V: Into<EnumCellValue>> FromIterator<(K, V)> for SpecRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = SpecRecord::new();
        for (field_name, value) in iter {
            record.insert(field_name, value);
        }
        record
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnSpecification

/// Declared data type of an exported column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumColumnDataType {
    /// Text cell.
    #[default]
    String,
    /// Numeric cell.
    Number,
    /// Date serial cell.
    DateTime,
    /// Boolean cell.
    Boolean,
    /// Numeric cell in currency style.
    Currency,
    /// Numeric cell in percent style.
    Percentage,
}

impl EnumColumnDataType {
    /// Style implied by the type when no override is declared.
    pub fn default_style(self) -> EnumPredefinedStyle {
        match self {
            Self::String => EnumPredefinedStyle::Text,
            Self::Number => EnumPredefinedStyle::Number,
            Self::DateTime => EnumPredefinedStyle::DateTime,
            Self::Boolean => EnumPredefinedStyle::Boolean,
            Self::Currency => EnumPredefinedStyle::Currency,
            Self::Percentage => EnumPredefinedStyle::Percentage,
        }
    }
}

/// One exported column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecColumnDefinition {
    /// Record field the column reads.
    pub field_name: String,
    /// Header text.
    pub title: String,
    /// Declared data type.
    pub data_type: EnumColumnDataType,
    /// Column width in character units.
    pub width: Option<f64>,
    /// Style replacing the type default.
    pub style: Option<EnumPredefinedStyle>,
    /// Number format merged over the resolved style.
    pub num_format: Option<String>,
    /// Hide the column.
    pub if_hidden: bool,
    /// Adjacency-group rows on this column.
    pub if_group: bool,
}

impl SpecColumnDefinition {
    /// Create a column reading `field_name`, titled `title`.
    pub fn new(
        field_name: impl Into<String>,
        title: impl Into<String>,
        data_type: EnumColumnDataType,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            title: title.into(),
            data_type,
            ..Default::default()
        }
    }

    /// Set column width.
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    /// Set explicit style.
    pub fn with_style(mut self, style: EnumPredefinedStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Set explicit number format code.
    pub fn with_num_format(mut self, num_format: impl Into<String>) -> Self {
        self.num_format = Some(num_format.into());
        self
    }

    /// Mark hidden.
    pub fn with_hidden(mut self) -> Self {
        self.if_hidden = true;
        self
    }

    /// Mark as the group column.
    pub fn with_group(mut self) -> Self {
        self.if_group = true;
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Per-call export options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecExportOptions {
    /// Base worksheet name.
    pub sheet_name: String,
    /// Locale tag for text rendering of numbers (`invariant`, `en-US`, `de-DE`, ...).
    pub locale: String,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Put an auto-filter on the header row.
    pub if_auto_filter: bool,
    /// Data date used in artifact names; UTC today when `None`.
    pub date_data: Option<NaiveDate>,
    /// Continue on new worksheets when a sheet is full.
    pub if_split_sheets: bool,
    /// Continue on new files when a sheet is full.
    pub if_split_files: bool,
    /// Header fill color, 6 or 8 hex digits.
    pub header_bg_color_hex: Option<String>,
    /// Header font color, 6 or 8 hex digits.
    pub header_text_color_hex: Option<String>,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            locale: "invariant".to_string(),
            if_freeze_header: true,
            if_auto_filter: true,
            date_data: None,
            if_split_sheets: false,
            if_split_files: false,
            header_bg_color_hex: None,
            header_text_color_hex: None,
        }
    }
}

/// Splitting strategy selected from the split flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSplitStrategy {
    /// One worksheet in one file; overflow is an error.
    Single,
    /// Many worksheets in one file.
    MultiSheet,
    /// One worksheet per file, many files.
    MultiFile,
}

impl SpecExportOptions {
    /// Resolve the strategy; file splitting wins over sheet splitting.
    pub fn split_strategy(&self) -> EnumSplitStrategy {
        if self.if_split_files {
            EnumSplitStrategy::MultiFile
        } else if self.if_split_sheets {
            EnumSplitStrategy::MultiSheet
        } else {
            EnumSplitStrategy::Single
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ArtifactSpecification

/// Result of persisting one workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecArtifactDescriptor {
    /// Stored artifact name (including any store prefix).
    pub name: String,
    /// Store-level location (directory, container, ...).
    pub location: String,
    /// URI the artifact can be read from.
    pub access_uri: String,
    /// Persisted size.
    pub size_bytes: u64,
}

/// Worksheet emitted to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecSheetSlice {
    /// Zero-based index of the artifact holding the sheet.
    pub n_idx_artifact: usize,
    /// Actual sheet name in the workbook.
    pub sheet_name: String,
    /// Inclusive source record start.
    pub row_start_inclusive: usize,
    /// Exclusive source record end.
    pub row_end_exclusive: usize,
}

impl SpecSheetSlice {
    /// Data rows written to the sheet.
    pub fn n_rows_data(&self) -> usize {
        self.row_end_exclusive - self.row_start_inclusive
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure of the lookahead cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// `take_next` was called with nothing left.
    #[error("record sequence is exhausted")]
    EndOfSequence,
    /// The record source reported a fault.
    #[error("record source failed: {0}")]
    Source(String),
}

/// Export failure taxonomy.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Style catalog could not resolve a style.
    #[error("style build failed: {0}")]
    StyleBuild(String),
    /// Single-sheet export overflowed the worksheet row cap.
    #[error("row limit exceeded: more than {n_rows_data_max} data rows without splitting")]
    RowLimitExceeded {
        /// Data-row cap of one worksheet.
        n_rows_data_max: usize,
    },
    /// Workbook serialization or temp-file I/O failed.
    #[error("xlsx write error: {0}")]
    Writer(String),
    /// Cancellation was requested.
    #[error("export cancelled")]
    Cancelled,
    /// Artifact name could not be composed.
    #[error("file naming failed: {0}")]
    Naming(String),
    /// The record source itself failed.
    #[error("record source failed: {0}")]
    UpstreamSource(String),
    /// The artifact store rejected the artifact.
    #[error("artifact store failed: {0}")]
    Store(String),
    /// Columns, options or configuration are invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ExportError {
    /// Whether the export stopped on purpose rather than broke.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CursorError> for ExportError {
    fn from(err: CursorError) -> Self {
        match err {
            CursorError::EndOfSequence => Self::Writer(err.to_string()),
            CursorError::Source(msg) => Self::UpstreamSource(msg),
        }
    }
}

impl From<XlsxError> for ExportError {
    fn from(err: XlsxError) -> Self {
        Self::Writer(err.to_string())
    }
}

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        Self::Writer(err.to_string())
    }
}

/// Export-boundary failure: the error plus artifacts already persisted.
#[derive(Debug, Error)]
pub struct ExportFailure {
    /// What went wrong.
    #[source]
    pub error: ExportError,
    /// Artifacts persisted before the failure (multi-file runs only).
    pub artifacts: Vec<SpecArtifactDescriptor>,
}

impl ExportFailure {
    /// Whether the export stopped on purpose rather than broke.
    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }
}

impl From<ExportError> for ExportFailure {
    fn from(error: ExportError) -> Self {
        Self {
            error,
            artifacts: Vec::new(),
        }
    }
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artifacts.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(
                f,
                "{} ({} artifact(s) already persisted)",
                self.error,
                self.artifacts.len()
            )
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
