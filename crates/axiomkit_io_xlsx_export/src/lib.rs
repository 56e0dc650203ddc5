//! `axiomkit_io_xlsx_export` v1:
//! Streaming record-to-XLSX export with row-cap aware splitting.
//!
//! Module layout:
//! - `conf`   : format constants, style presets and export configuration
//! - `spec`   : records, columns, options, descriptors and errors
//! - `util`   : pure helper functions
//! - `style`  : style catalog
//! - `cursor` : one-record lookahead over sync/async sources
//! - `group`  : adjacency grouping
//! - `limit`  : per-worksheet row cap
//! - `writer` : streaming worksheet writer and workbook assembler
//! - `export` : split orchestration and artifact hand-off
//! - `store`  : artifact stores
//! - `naming` : artifact file naming
//! - `source` : JSON and Polars record adapters
//! - `report` : export report model
pub mod conf;
pub mod cursor;
pub mod export;
pub mod group;
pub mod limit;
pub mod naming;
pub mod report;
pub mod source;
pub mod spec;
pub mod store;
pub mod style;
pub mod util;
pub mod writer;

pub use conf::{
    C_XLSX_CONTENT_TYPE, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_DATA_MAX,
    N_NROWS_EXCEL_MAX, SpecExportConfig,
};
pub use cursor::{LookaheadCursor, RecordPull, StreamPull, SyncPull};
pub use export::XlsxExporter;
pub use group::{GroupTracker, SpecGroupRowState};
pub use limit::SpecRowLimiter;
pub use naming::{FileNamingService, NamingService};
pub use report::{ReportExport, ReportExportBuilder};
pub use source::{
    DataFrameRecords, derive_column_definitions_from_dataframe, derive_dataframe_from_ipc_bytes,
    derive_record_from_json_value,
};
pub use spec::{
    CursorError, EnumCellValue, EnumColumnDataType, EnumPredefinedStyle, EnumSplitStrategy,
    ExportError, ExportFailure, SpecArtifactDescriptor, SpecCellFormat, SpecColumnDefinition,
    SpecExportOptions, SpecRecord, SpecSheetSlice,
};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use style::StyleCatalog;
pub use tokio_util::sync::CancellationToken;
pub use util::{create_sheet_identifier, derive_column_letters, sanitize_sheet_name};
