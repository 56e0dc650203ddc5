//! Command-line front end: export JSON-lines or Arrow IPC records to XLSX files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use axiomkit_io_xlsx_export::{
    CancellationToken, DataFrameRecords, ExportFailure, FsArtifactStore, ReportExport,
    SpecColumnDefinition, SpecExportConfig, SpecExportOptions, SpecRecord, XlsxExporter,
    derive_column_definitions_from_dataframe, derive_dataframe_from_ipc_bytes,
    derive_record_from_json_value,
};
use chrono::NaiveDate;
use clap::Parser;
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const N_EXIT_FAILURE: u8 = 1;
const N_EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "axiomkit-xlsx-export", version, about = "Stream records into XLSX workbooks")]
struct Args {
    /// JSON file holding the column definitions (inferred from the frame for --ipc when absent).
    #[arg(long)]
    columns: Option<PathBuf>,

    /// JSON-lines input file, or `-` for stdin.
    #[arg(long, required_unless_present = "ipc", conflicts_with = "ipc")]
    input: Option<String>,

    /// Arrow IPC file holding a data frame.
    #[arg(long)]
    ipc: Option<PathBuf>,

    /// Base name of the produced artifacts.
    #[arg(long)]
    name: String,

    /// Directory receiving the artifacts.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// TOML export configuration.
    #[arg(long, env = "AXIOMKIT_XLSX_EXPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Base worksheet name.
    #[arg(long)]
    sheet_name: Option<String>,

    /// Continue on new worksheets when a sheet is full.
    #[arg(long)]
    split_sheets: bool,

    /// Continue on new files when a sheet is full.
    #[arg(long)]
    split_files: bool,

    #[arg(long)]
    no_freeze_header: bool,

    #[arg(long)]
    no_auto_filter: bool,

    /// Data date used in artifact names (YYYY-MM-DD).
    #[arg(long)]
    data_date: Option<NaiveDate>,

    /// Header fill color as hex.
    #[arg(long)]
    header_bg: Option<String>,

    /// Header font color as hex.
    #[arg(long)]
    header_fg: Option<String>,

    /// Locale tag for text rendering of numbers.
    #[arg(long)]
    locale: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn derive_export_options(&self) -> SpecExportOptions {
        let defaults = SpecExportOptions::default();
        SpecExportOptions {
            sheet_name: self.sheet_name.clone().unwrap_or(defaults.sheet_name),
            locale: self.locale.clone().unwrap_or(defaults.locale),
            if_freeze_header: !self.no_freeze_header,
            if_auto_filter: !self.no_auto_filter,
            date_data: self.data_date,
            if_split_sheets: self.split_sheets,
            if_split_files: self.split_files,
            header_bg_color_hex: self.header_bg.clone(),
            header_text_color_hex: self.header_fg.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let token = CancellationToken::new();
    spawn_ctrl_c_watcher(token.clone());

    match run(&args, &token).await {
        Ok(report) => {
            if let Err(err) = print_report(&report, args.json) {
                error!("{err:#}");
                return ExitCode::from(N_EXIT_FAILURE);
            }
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<ExportFailure>() {
            Some(failure) => {
                for artifact in &failure.artifacts {
                    warn!(name = %artifact.name, uri = %artifact.access_uri, "artifact kept");
                }
                if failure.is_cancelled() {
                    warn!("export cancelled");
                    ExitCode::from(N_EXIT_CANCELLED)
                } else {
                    error!("{failure}");
                    ExitCode::from(N_EXIT_FAILURE)
                }
            }
            None => {
                error!("{err:#}");
                ExitCode::from(N_EXIT_FAILURE)
            }
        },
    }
}

fn spawn_ctrl_c_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling export");
            token.cancel();
        }
    });
}

async fn run(args: &Args, token: &CancellationToken) -> Result<ReportExport> {
    let config = match &args.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            SpecExportConfig::from_toml_str(&text)?
        }
        None => SpecExportConfig::default(),
    };
    let store = FsArtifactStore::new(&args.out_dir).with_prefix(config.store_prefix.clone());
    let exporter = XlsxExporter::new(Arc::new(store)).with_config(config);
    let options = args.derive_export_options();

    let columns = match &args.columns {
        Some(path) => Some(read_column_definitions(path).await?),
        None => None,
    };

    if let Some(path) = &args.ipc {
        let v_ipc_df = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read IPC file {}", path.display()))?;
        let df = derive_dataframe_from_ipc_bytes(&v_ipc_df).map_err(anyhow::Error::msg)?;
        let columns = columns.unwrap_or_else(|| derive_column_definitions_from_dataframe(&df));
        info!(n_rows = df.height(), n_cols = columns.len(), "frame loaded");
        let report = exporter
            .export_iter(DataFrameRecords::new(&df), &columns, &args.name, &options, token)
            .await?;
        return Ok(report);
    }

    let Some(columns) = columns else {
        bail!("--columns is required for JSON-lines input");
    };
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match args.input.as_deref() {
        Some("-") | None => Box::new(BufReader::new(tokio::io::stdin())),
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {path}"))?;
            Box::new(BufReader::new(file))
        }
    };
    let report = exporter
        .export_stream(
            derive_json_lines_stream(reader.lines()),
            &columns,
            &args.name,
            &options,
            token,
        )
        .await?;
    Ok(report)
}

async fn read_column_definitions(path: &Path) -> Result<Vec<SpecColumnDefinition>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read columns {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse columns {}", path.display()))
}

/// One record per non-blank line; a read error ends the stream after being reported.
fn derive_json_lines_stream<R>(lines: Lines<R>) -> impl Stream<Item = Result<SpecRecord, String>>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold(Some((lines, 0usize)), |state| async move {
        let (mut lines, mut n_line) = state?;
        loop {
            n_line += 1;
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let item = serde_json::from_str::<serde_json::Value>(&line)
                        .map_err(|err| format!("line {n_line}: {err}"))
                        .and_then(|value| {
                            derive_record_from_json_value(&value)
                                .map_err(|err| format!("line {n_line}: {err}"))
                        });
                    return Some((item, Some((lines, n_line))));
                }
                Ok(None) => return None,
                Err(err) => return Some((Err(format!("line {n_line}: {err}")), None)),
            }
        }
    })
}

fn print_report(report: &ReportExport, if_json: bool) -> Result<()> {
    if if_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
        for artifact in &report.artifacts {
            println!("  {} {} bytes", artifact.access_uri, artifact.size_bytes);
        }
    }
    Ok(())
}
