//! Streaming worksheet writer and workbook assembler.

use std::fs::File;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_HEADER};
use crate::cursor::{LookaheadCursor, RecordPull};
use crate::group::GroupTracker;
use crate::limit::SpecRowLimiter;
use crate::spec::{EnumCellValue, ExportError, SpecColumnDefinition, SpecExportOptions, SpecRecord};
use crate::style::{SpecColumnFormatPlan, StyleCatalog};
use crate::util::{
    EnumCellOutput, EnumTextLocale, convert_cell_value, create_sheet_identifier,
    derive_column_letters, derive_text_from_value, derive_text_locale, sanitize_sheet_name,
};

/// Everything about a worksheet that stays fixed for one export call.
#[derive(Debug, Clone)]
pub struct SpecSheetLayout {
    /// Exported columns, in order.
    pub columns: Vec<SpecColumnDefinition>,
    /// Resolved header and column formats.
    pub plan_formats: SpecColumnFormatPlan,
    /// Sanitized base sheet name.
    pub sheet_name_base: String,
    /// Text rendering convention.
    pub locale: EnumTextLocale,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Auto-filter on the header row.
    pub if_auto_filter: bool,
    /// Index of the group column, if any.
    pub n_idx_col_group: Option<usize>,
}

impl SpecSheetLayout {
    /// Validate columns and resolve formats.
    pub fn new(
        columns: &[SpecColumnDefinition],
        options: &SpecExportOptions,
        catalog: &StyleCatalog,
    ) -> Result<Self, ExportError> {
        validate_columns(columns)?;

        let catalog = catalog.clone().with_header_colors(
            options.header_bg_color_hex.as_deref(),
            options.header_text_color_hex.as_deref(),
        );
        let plan_formats = catalog.plan_column_formats(columns)?;

        Ok(Self {
            columns: columns.to_vec(),
            plan_formats,
            sheet_name_base: sanitize_sheet_name(&options.sheet_name, "_"),
            locale: derive_text_locale(&options.locale),
            if_freeze_header: options.if_freeze_header,
            if_auto_filter: options.if_auto_filter,
            n_idx_col_group: columns.iter().position(|column| column.if_group),
        })
    }
}

/// Check column count, field names and the single-group-column rule.
pub fn validate_columns(columns: &[SpecColumnDefinition]) -> Result<(), ExportError> {
    if columns.is_empty() {
        return Err(ExportError::InvalidConfiguration(
            "at least one column is required.".to_string(),
        ));
    }
    if columns.len() > N_NCOLS_EXCEL_MAX {
        return Err(ExportError::InvalidConfiguration(format!(
            "{} columns exceed the limit of {N_NCOLS_EXCEL_MAX}.",
            columns.len()
        )));
    }
    if let Some(n_idx) = columns
        .iter()
        .position(|column| column.field_name.trim().is_empty())
    {
        return Err(ExportError::InvalidConfiguration(format!(
            "column {n_idx} has an empty field name."
        )));
    }
    let n_group_cols = columns.iter().filter(|column| column.if_group).count();
    if n_group_cols > 1 {
        return Err(ExportError::InvalidConfiguration(format!(
            "at most one group column is allowed, got {n_group_cols}."
        )));
    }
    Ok(())
}

/// Outcome of one streamed worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecWorksheetWritten {
    /// Name assigned in the workbook.
    pub sheet_name: String,
    /// Inclusive global record index of the first data row.
    pub row_start_inclusive: usize,
    /// Exclusive global record index after the last data row.
    pub row_end_exclusive: usize,
    /// Value conversion fallbacks.
    pub warnings: Vec<String>,
}

/// Owns one workbook for the lifetime of one artifact.
pub struct XlsxWorkbookAssembler<'a> {
    layout: &'a SpecSheetLayout,
    workbook: Workbook,
    n_sheets: usize,
}

impl<'a> XlsxWorkbookAssembler<'a> {
    /// Fresh workbook; constant-memory scratch files go to `dir_temp` when given.
    pub fn new(
        layout: &'a SpecSheetLayout,
        dir_temp: Option<&Path>,
    ) -> Result<Self, ExportError> {
        let mut workbook = Workbook::new();
        if let Some(dir) = dir_temp {
            workbook.set_tempdir(dir)?;
        }
        Ok(Self {
            layout,
            workbook,
            n_sheets: 0,
        })
    }

    /// Worksheets added so far.
    pub fn n_sheets(&self) -> usize {
        self.n_sheets
    }

    /// Stream records from `cursor` into a new worksheet until it holds
    /// `n_rows_data_max` rows or the cursor is exhausted.
    ///
    /// Sheets without a group column stream in constant memory; sheets with
    /// one keep their rows until `finish`.
    pub async fn write_worksheet<P>(
        &mut self,
        cursor: &mut LookaheadCursor<P>,
        n_rows_data_max: usize,
        token: &CancellationToken,
    ) -> Result<SpecWorksheetWritten, ExportError>
    where
        P: RecordPull<Item = SpecRecord>,
    {
        let layout = self.layout;
        let sheet_name = create_sheet_identifier(&layout.sheet_name_base, self.n_sheets + 1);
        let n_col_last = cast_col_num(layout.columns.len().saturating_sub(1))?;

        // Constant-memory rows are flushed without their row options, so
        // outlined sheets stay fully buffered.
        let worksheet = if layout.n_idx_col_group.is_some() {
            self.workbook.add_worksheet()
        } else {
            self.workbook.add_worksheet_with_constant_memory()
        };
        self.n_sheets += 1;
        worksheet.set_name(&sheet_name)?;
        write_preamble(worksheet, layout)?;

        let n_row_start = cursor.n_taken();
        let mut limiter = SpecRowLimiter::new(n_rows_data_max);
        let mut tracker = GroupTracker::new(layout.n_idx_col_group.is_some());
        let mut l_warnings = Vec::new();

        loop {
            if token.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            if limiter.is_full() || !cursor.peek_has_next().await? {
                break;
            }
            let record = cursor.take_next().await?;
            limiter.admit();

            let n_row = N_NROWS_HEADER + limiter.n_rows_data_written - 1;
            write_record_row(
                worksheet,
                layout,
                n_row,
                &record,
                &mut tracker,
                &mut l_warnings,
            )?;
        }

        let mut c_filter_range = String::new();
        if layout.if_auto_filter {
            worksheet.autofilter(0, 0, 0, n_col_last)?;
            c_filter_range = format!("A1:{}1", derive_column_letters(layout.columns.len()));
        }

        if !l_warnings.is_empty() {
            warn!(
                sheet = %sheet_name,
                n_warnings = l_warnings.len(),
                "values written as text after failed type conversion"
            );
        }
        debug!(
            sheet = %sheet_name,
            n_rows_data = limiter.n_rows_data_written,
            filter = %c_filter_range,
            "worksheet written"
        );

        Ok(SpecWorksheetWritten {
            sheet_name,
            row_start_inclusive: n_row_start,
            row_end_exclusive: n_row_start + limiter.n_rows_data_written,
            warnings: l_warnings,
        })
    }

    /// Serialize the package into `file`.
    pub fn finish(mut self, file: &mut File) -> Result<(), ExportError> {
        self.workbook.save_to_writer(file)?;
        Ok(())
    }
}

fn write_preamble(
    worksheet: &mut Worksheet,
    layout: &SpecSheetLayout,
) -> Result<(), ExportError> {
    if layout.if_freeze_header {
        worksheet.set_freeze_panes(cast_row_num(N_NROWS_HEADER)?, 0)?;
    }

    for (n_idx_col, column) in layout.columns.iter().enumerate() {
        let n_col = cast_col_num(n_idx_col)?;
        if let Some(width) = column.width {
            worksheet.set_column_width(n_col, width)?;
        }
        if column.if_hidden {
            worksheet.set_column_hidden(n_col)?;
        }
    }

    let fmt_header = &layout.plan_formats.fmt_header;
    for (n_idx_col, column) in layout.columns.iter().enumerate() {
        let n_col = cast_col_num(n_idx_col)?;
        if column.title.is_empty() {
            worksheet.write_blank(0, n_col, fmt_header)?;
        } else {
            worksheet.write_string_with_format(0, n_col, &column.title, fmt_header)?;
        }
    }
    Ok(())
}

fn write_record_row(
    worksheet: &mut Worksheet,
    layout: &SpecSheetLayout,
    n_row: usize,
    record: &SpecRecord,
    tracker: &mut GroupTracker,
    l_warnings: &mut Vec<String>,
) -> Result<(), ExportError> {
    let n_row_xl = cast_row_num(n_row)?;
    let value_null = EnumCellValue::None;

    let mut if_group_continuation = false;
    if let Some(n_idx_col_group) = layout.n_idx_col_group {
        let column = &layout.columns[n_idx_col_group];
        let value_group = record.get(&column.field_name).unwrap_or(&value_null);
        let state = tracker.observe(value_group);
        if state.n_outline_level > 0 {
            worksheet.group_rows(n_row_xl, n_row_xl)?;
            if_group_continuation = true;
        }
    }

    for (n_idx_col, column) in layout.columns.iter().enumerate() {
        let n_col = cast_col_num(n_idx_col)?;
        let fmt = &layout.plan_formats.fmts_by_col[n_idx_col];

        if if_group_continuation && layout.n_idx_col_group == Some(n_idx_col) {
            let fmt_continuation = layout.plan_formats.fmt_group_continuation.as_ref();
            worksheet.write_blank(n_row_xl, n_col, fmt_continuation.unwrap_or(fmt))?;
            continue;
        }

        let value = record.get(&column.field_name).unwrap_or(&value_null);
        let output = match convert_cell_value(value, column.data_type, layout.locale) {
            Ok(output) => output,
            Err(reason) => {
                let c_warning = format!(
                    "row {} column {:?}: {reason}; written as text",
                    n_row + 1,
                    column.title
                );
                debug!(warning = %c_warning, "cell conversion fallback");
                l_warnings.push(c_warning);
                EnumCellOutput::Text(derive_text_from_value(value, layout.locale))
            }
        };
        write_cell(worksheet, n_row_xl, n_col, &output, fmt)?;
    }
    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    output: &EnumCellOutput,
    format: &Format,
) -> Result<(), ExportError> {
    match output {
        EnumCellOutput::Blank => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellOutput::Text(val) if val.is_empty() => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellOutput::Text(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellOutput::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellOutput::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

fn cast_row_num(value: usize) -> Result<u32, ExportError> {
    u32::try_from(value).map_err(|_| ExportError::Writer(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ExportError> {
    u16::try_from(value).map_err(|_| ExportError::Writer(format!("column index overflow: {value}")))
}
