//! Export entry points: naming, split strategy and artifact hand-off.

use std::fmt::Display;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conf::{C_XLSX_CONTENT_TYPE, SpecExportConfig};
use crate::cursor::{LookaheadCursor, RecordPull, StreamPull, SyncPull};
use crate::naming::{FileNamingService, NamingService};
use crate::report::{ReportExport, ReportExportBuilder};
use crate::spec::{
    EnumSplitStrategy, ExportError, ExportFailure, SpecColumnDefinition, SpecExportOptions,
    SpecRecord, SpecSheetSlice,
};
use crate::store::ArtifactStore;
use crate::style::StyleCatalog;
use crate::util::derive_part_file_name;
use crate::writer::{SpecSheetLayout, SpecWorksheetWritten, XlsxWorkbookAssembler};

/// Streams records into one or more workbooks and hands them to a store.
///
/// Calls are independent: every export owns its cursor, workbook and
/// temporary file. Must run inside a Tokio runtime.
#[derive(Clone)]
pub struct XlsxExporter {
    naming: Arc<dyn NamingService>,
    store: Arc<dyn ArtifactStore>,
    catalog: StyleCatalog,
    config: SpecExportConfig,
}

impl XlsxExporter {
    /// Exporter with default naming, styles and configuration.
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            naming: Arc::new(FileNamingService),
            store,
            catalog: StyleCatalog::new(),
            config: SpecExportConfig::default(),
        }
    }

    pub fn with_naming(mut self, naming: Arc<dyn NamingService>) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_catalog(mut self, catalog: StyleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: SpecExportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SpecExportConfig {
        &self.config
    }

    /// Export a synchronous record sequence.
    pub async fn export_iter<I, E>(
        &self,
        records: I,
        columns: &[SpecColumnDefinition],
        base_name: &str,
        options: &SpecExportOptions,
        token: &CancellationToken,
    ) -> Result<ReportExport, ExportFailure>
    where
        I: IntoIterator<Item = Result<SpecRecord, E>>,
        E: Display,
    {
        let cursor = LookaheadCursor::new(SyncPull::new(records.into_iter()));
        self.run(cursor, columns, base_name, options, token).await
    }

    /// Export an asynchronous record stream.
    pub async fn export_stream<S, E>(
        &self,
        records: S,
        columns: &[SpecColumnDefinition],
        base_name: &str,
        options: &SpecExportOptions,
        token: &CancellationToken,
    ) -> Result<ReportExport, ExportFailure>
    where
        S: Stream<Item = Result<SpecRecord, E>>,
        E: Display,
    {
        let cursor = LookaheadCursor::new(StreamPull::new(records));
        self.run(cursor, columns, base_name, options, token).await
    }

    async fn run<P>(
        &self,
        mut cursor: LookaheadCursor<P>,
        columns: &[SpecColumnDefinition],
        base_name: &str,
        options: &SpecExportOptions,
        token: &CancellationToken,
    ) -> Result<ReportExport, ExportFailure>
    where
        P: RecordPull<Item = SpecRecord>,
    {
        self.config.validate()?;
        let layout = SpecSheetLayout::new(columns, options, &self.catalog)?;

        let dt_created = Utc::now();
        let date_data = options.date_data.unwrap_or_else(|| dt_created.date_naive());
        let c_file_name = self
            .naming
            .compose_name(base_name, date_data, dt_created)
            .map_err(ExportError::Naming)?;

        let strategy = options.split_strategy();
        info!(
            name = %c_file_name,
            ?strategy,
            n_cols = columns.len(),
            n_rows_data_max = self.config.n_rows_data_max(),
            "export started"
        );

        let mut report = ReportExportBuilder::new(c_file_name.as_str());
        let res = match strategy {
            EnumSplitStrategy::Single | EnumSplitStrategy::MultiSheet => {
                let if_split_sheets = strategy == EnumSplitStrategy::MultiSheet;
                self.run_single_file(
                    &layout,
                    &mut cursor,
                    &c_file_name,
                    if_split_sheets,
                    &mut report,
                    token,
                )
                .await
            }
            EnumSplitStrategy::MultiFile => {
                self.run_multi_file(&layout, &mut cursor, &c_file_name, &mut report, token)
                    .await
            }
        };

        match res {
            Ok(()) => {
                let report = report.build();
                info!(
                    name = %report.file_name_base,
                    n_artifacts = report.artifact_count(),
                    n_sheets = report.sheet_count(),
                    n_rows_data = report.cnt_rows_data,
                    n_warnings = report.warning_count(),
                    "export finished"
                );
                Ok(report)
            }
            Err(error) => {
                let artifacts = report.into_artifacts();
                if error.is_cancelled() {
                    info!(name = %c_file_name, n_artifacts = artifacts.len(), "export cancelled");
                } else {
                    warn!(
                        name = %c_file_name,
                        n_artifacts = artifacts.len(),
                        error = %error,
                        "export aborted"
                    );
                }
                Err(ExportFailure { error, artifacts })
            }
        }
    }

    /// One workbook: a single worksheet, or as many as needed when `if_split_sheets`.
    async fn run_single_file<P>(
        &self,
        layout: &SpecSheetLayout,
        cursor: &mut LookaheadCursor<P>,
        file_name: &str,
        if_split_sheets: bool,
        report: &mut ReportExportBuilder,
        token: &CancellationToken,
    ) -> Result<(), ExportError>
    where
        P: RecordPull<Item = SpecRecord>,
    {
        let n_rows_data_max = self.config.n_rows_data_max();
        let mut assembler = XlsxWorkbookAssembler::new(layout, self.config.dir_temp.as_deref())?;

        loop {
            let written = assembler
                .write_worksheet(cursor, n_rows_data_max, token)
                .await?;
            add_written_sheet(report, written);

            check_cancelled(token)?;
            if !cursor.peek_has_next().await? {
                break;
            }
            if !if_split_sheets {
                return Err(ExportError::RowLimitExceeded { n_rows_data_max });
            }
        }

        self.persist_workbook(assembler, file_name, report).await
    }

    /// One single-sheet workbook per chunk; part suffixes once a second chunk exists.
    async fn run_multi_file<P>(
        &self,
        layout: &SpecSheetLayout,
        cursor: &mut LookaheadCursor<P>,
        file_name: &str,
        report: &mut ReportExportBuilder,
        token: &CancellationToken,
    ) -> Result<(), ExportError>
    where
        P: RecordPull<Item = SpecRecord>,
    {
        let n_rows_data_max = self.config.n_rows_data_max();
        let mut n_part = 0usize;

        loop {
            n_part += 1;
            let mut assembler =
                XlsxWorkbookAssembler::new(layout, self.config.dir_temp.as_deref())?;
            let written = assembler
                .write_worksheet(cursor, n_rows_data_max, token)
                .await?;
            add_written_sheet(report, written);

            check_cancelled(token)?;
            let if_has_more = cursor.peek_has_next().await?;
            let c_part_name = if n_part > 1 || if_has_more {
                derive_part_file_name(file_name, n_part)
            } else {
                file_name.to_string()
            };
            self.persist_workbook(assembler, &c_part_name, report).await?;

            if !if_has_more {
                return Ok(());
            }
        }
    }

    async fn persist_workbook(
        &self,
        assembler: XlsxWorkbookAssembler<'_>,
        name: &str,
        report: &mut ReportExportBuilder,
    ) -> Result<(), ExportError> {
        let n_sheets = assembler.n_sheets();
        let mut file = create_temp_file(&self.config)?;
        assembler.finish(&mut file)?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;
        let n_size = file.metadata()?.len();

        let mut payload = tokio::fs::File::from_std(file);
        let artifact = self
            .store
            .store(name, &mut payload, n_size)
            .await
            .map_err(ExportError::Store)?;
        debug!(
            name = %artifact.name,
            uri = %artifact.access_uri,
            content_type = C_XLSX_CONTENT_TYPE,
            n_sheets,
            size_bytes = artifact.size_bytes,
            "artifact persisted"
        );
        report.add_artifact(artifact);
        Ok(())
    }
}

fn add_written_sheet(report: &mut ReportExportBuilder, written: SpecWorksheetWritten) {
    let n_idx_artifact = report.n_idx_artifact_next();
    report.add_warnings(written.warnings);
    report.add_sheet(SpecSheetSlice {
        n_idx_artifact,
        sheet_name: written.sheet_name,
        row_start_inclusive: written.row_start_inclusive,
        row_end_exclusive: written.row_end_exclusive,
    });
}

fn create_temp_file(config: &SpecExportConfig) -> Result<File, ExportError> {
    let file = match &config.dir_temp {
        Some(dir) => tempfile::tempfile_in(dir)?,
        None => tempfile::tempfile()?,
    };
    Ok(file)
}

fn check_cancelled(token: &CancellationToken) -> Result<(), ExportError> {
    if token.is_cancelled() {
        return Err(ExportError::Cancelled);
    }
    Ok(())
}
