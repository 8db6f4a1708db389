//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pulse_core::{DataProvider, FundamentalsProvider};
use pulse_pipeline::{
    ExtractOptions, ExtractionRun, Session, SpreadsheetWriter, XlsxExporter,
    export::{DEFAULT_SHEET, DISPLAY_FILE_NAME, FULL_FILE_NAME, batch_file_name},
};
use tracing::{info, warn};

use crate::app::{App, router};
use crate::config::{ExtractArgs, ServeArgs};

/// Runs the JSON API until the process is stopped.
pub async fn serve(args: ServeArgs) -> Result<()> {
    let provider = Arc::new(args.provider.provider());
    log_provider(provider.as_ref());
    let app = App::new(
        provider,
        Arc::new(XlsxExporter::new()),
        args.provider.extract_options(),
    );

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", args.bind))?;
    info!("Listening on http://{}", args.bind);

    axum::serve(listener, router(app))
        .await
        .context("Server error")
}

/// Runs one extraction and writes the workbooks to `args.out_dir`.
pub async fn extract(args: ExtractArgs) -> Result<()> {
    let provider = args.provider.provider();
    log_provider(&provider);
    let run = run_extraction(
        &provider,
        &args.tickers,
        &args.provider.extract_options(),
    )
    .await?;

    let written = write_workbooks(&run, &XlsxExporter::new(), &args.out_dir)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }

    println!("Tickers Submitted:              {}", run.summary.submitted);
    println!("Tickers Successfully Processed: {}", run.summary.processed);
    println!("Tickers with Issues:            {}", run.summary.with_issues);
    Ok(())
}

fn log_provider(provider: &dyn DataProvider) {
    info!(
        provider = provider.name(),
        description = provider.description(),
        "Using data provider"
    );
}

/// Loads the ticker list and runs the pipeline over it.
///
/// Per-ticker failures and notices are logged; only an empty ticker list is
/// an error here.
pub async fn run_extraction<P>(
    provider: &P,
    tickers: &str,
    options: &ExtractOptions,
) -> Result<ExtractionRun>
where
    P: FundamentalsProvider + ?Sized,
{
    let session = Session::load(tickers);
    if session.tickers().is_empty() {
        bail!("Please enter at least one ticker");
    }

    let mut session = session
        .extract(provider, options, |p| {
            info!(
                batch = p.batch,
                batches = p.batches,
                "[{}/{}] {}",
                p.processed,
                p.total,
                p.symbol.as_ref().map_or("", |s| s.as_str())
            );
        })
        .await;

    let run = session
        .take_run()
        .context("Extraction finished without a run")?;
    for failure in &run.failures {
        warn!("{failure}");
    }
    for notice in &run.notices {
        info!("{notice}");
    }
    Ok(run)
}

/// Writes the consolidated and per-batch workbooks, returning their paths.
///
/// A total failure writes nothing and is an error. A single workbook that
/// fails to export is logged and skipped.
pub fn write_workbooks(
    run: &ExtractionRun,
    writer: &dyn SpreadsheetWriter,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let projections = match &run.results {
        Ok(projections) => projections,
        Err(e) => bail!("{e}"),
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut tables = vec![
        (DISPLAY_FILE_NAME.to_string(), &projections.display),
        (FULL_FILE_NAME.to_string(), &projections.full),
    ];
    tables.extend(run.batches.iter().filter_map(|batch| {
        batch
            .display
            .as_ref()
            .map(|table| (batch_file_name(batch.index), table))
    }));

    let mut written = Vec::new();
    for (name, table) in tables {
        let bytes = match writer.write_table(table, DEFAULT_SHEET) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %name, error = %e, "Export failed");
                continue;
            }
        };
        let path = out_dir.join(&name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
