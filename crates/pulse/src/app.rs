//! JSON API over the extraction pipeline.
//!
//! One [`App`] holds one session. Loading tickers replaces the session,
//! extraction runs in a background task and swaps the finished session back
//! in, and every read endpoint works from the latest run.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use polars::prelude::DataFrame;
use pulse_core::{FundamentalsProvider, Symbol};
use pulse_pipeline::{
    Cell, ExtractOptions, ExtractionFailure, ExtractionRun, FailureSide, Notice, PipelineError,
    Progress, Projections, Session, SpreadsheetWriter, Summary,
    export::{DEFAULT_SHEET, DISPLAY_FILE_NAME, FULL_FILE_NAME, XLSX_CONTENT_TYPE, batch_file_name},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared application state.
pub struct App {
    provider: Arc<dyn FundamentalsProvider>,
    writer: Arc<dyn SpreadsheetWriter>,
    options: ExtractOptions,
    progress: watch::Sender<Progress>,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    session: Session,
    running: bool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("provider", &self.provider.name())
            .field("writer", &self.writer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Creates the application state.
    #[must_use]
    pub fn new(
        provider: Arc<dyn FundamentalsProvider>,
        writer: Arc<dyn SpreadsheetWriter>,
        options: ExtractOptions,
    ) -> Arc<Self> {
        let (progress, _) = watch::channel(Progress::default());
        Arc::new(Self {
            provider,
            writer,
            options,
            progress,
            inner: RwLock::new(Inner::default()),
        })
    }

    async fn run_extraction(self: Arc<Self>, session: Session, options: ExtractOptions) {
        let progress = &self.progress;
        let session = session
            .extract(self.provider.as_ref(), &options, |p| {
                progress.send_replace(p.clone());
            })
            .await;

        let mut inner = self.inner.write().await;
        inner.session = session;
        inner.running = false;
    }

    /// Waits for an extraction task. If it died before handing its session
    /// back, restores the loaded ticker list and clears the running flag so
    /// the list can be extracted again or replaced.
    async fn supervise(self: Arc<Self>, worker: JoinHandle<()>, tickers: Vec<Symbol>) {
        let Err(e) = worker.await else {
            return;
        };
        error!(error = %e, "Extraction task failed");
        let mut inner = self.inner.write().await;
        inner.session = Session::from_tickers(tickers);
        inner.running = false;
    }
}

/// Builds the router.
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tickers", post(load_tickers))
        .route("/api/extract", post(start_extraction))
        .route("/api/progress", get(progress))
        .route("/api/results", get(results))
        .route("/api/download/display", get(download_display))
        .route("/api/download/full", get(download_full))
        .route("/api/download/batch/:index", get(download_batch))
        .with_state(app)
}

/// API error, rendered as `{"error": message}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or empty input.
    #[error("{0}")]
    BadRequest(String),

    /// The request conflicts with the current session state.
    #[error("{0}")]
    Conflict(String),

    /// Nothing to return.
    #[error("{0}")]
    NotFound(String),

    /// Pipeline or export failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::Pipeline(PipelineError::NoUsableData) => {
                StatusCode::CONFLICT
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Pipeline(e) => {
                error!(error = %e, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, AppError>;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct TickersRequest {
    tickers: String,
}

#[derive(Debug, Serialize)]
struct TickersResponse {
    tickers: Vec<Symbol>,
}

async fn load_tickers(
    State(app): State<Arc<App>>,
    Json(request): Json<TickersRequest>,
) -> ApiResult<Json<TickersResponse>> {
    let session = Session::load(&request.tickers);
    if session.tickers().is_empty() {
        return Err(AppError::BadRequest(
            "Please enter at least one ticker".to_string(),
        ));
    }

    let mut inner = app.inner.write().await;
    if inner.running {
        return Err(AppError::Conflict("Extraction in progress".to_string()));
    }

    let tickers = session.tickers().to_vec();
    inner.session = session;
    app.progress.send_replace(Progress::default());
    Ok(Json(TickersResponse { tickers }))
}

#[derive(Debug, Default, Deserialize)]
struct ExtractRequest {
    batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ExtractResponse {
    tickers: usize,
    batch_size: usize,
}

async fn start_extraction(
    State(app): State<Arc<App>>,
    request: Option<Json<ExtractRequest>>,
) -> ApiResult<(StatusCode, Json<ExtractResponse>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let options = request
        .batch_size
        .map_or(app.options, |size| app.options.with_batch_size(size));

    let mut inner = app.inner.write().await;
    if inner.running {
        return Err(AppError::Conflict("Extraction already running".to_string()));
    }
    if inner.session.tickers().is_empty() {
        return Err(AppError::Conflict("No tickers loaded".to_string()));
    }

    let session = std::mem::take(&mut inner.session);
    let loaded = session.tickers().to_vec();
    let tickers = loaded.len();
    inner.running = true;
    drop(inner);

    app.progress.send_replace(Progress {
        total: tickers,
        ..Progress::default()
    });
    info!(tickers, batch_size = options.batch_size, "Extraction started");
    let worker = tokio::spawn(Arc::clone(&app).run_extraction(session, options));
    tokio::spawn(Arc::clone(&app).supervise(worker, loaded));

    Ok((
        StatusCode::ACCEPTED,
        Json(ExtractResponse {
            tickers,
            batch_size: options.batch_size,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct ProgressResponse {
    running: bool,
    fraction: f64,
    #[serde(flatten)]
    progress: Progress,
}

async fn progress(State(app): State<Arc<App>>) -> Json<ProgressResponse> {
    let running = app.inner.read().await.running;
    let progress = app.progress.borrow().clone();
    Json(ProgressResponse {
        running,
        fraction: progress.fraction(),
        progress,
    })
}

#[derive(Debug, Serialize)]
struct TableView {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl TableView {
    fn of(table: &DataFrame) -> ApiResult<Self> {
        Ok(Self {
            columns: pulse_pipeline::header(table),
            rows: pulse_pipeline::rows(table).map_err(PipelineError::from)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct FailureView {
    symbol: Symbol,
    side: FailureSide,
    message: String,
}

impl From<&ExtractionFailure> for FailureView {
    fn from(failure: &ExtractionFailure) -> Self {
        Self {
            symbol: failure.symbol.clone(),
            side: failure.side,
            message: failure.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchView {
    index: usize,
    symbols: Vec<Symbol>,
    rows: usize,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    summary: Summary,
    display: TableView,
    missing_columns: Vec<String>,
    failures: Vec<FailureView>,
    notices: Vec<Notice>,
    batches: Vec<BatchView>,
}

fn finished_run(inner: &Inner) -> ApiResult<&ExtractionRun> {
    if inner.running {
        return Err(AppError::Conflict("Extraction in progress".to_string()));
    }
    inner
        .session
        .run()
        .ok_or_else(|| AppError::NotFound("No extraction has been run".to_string()))
}

fn consolidated(run: &ExtractionRun) -> ApiResult<&Projections> {
    match &run.results {
        Ok(projections) => Ok(projections),
        Err(PipelineError::NoUsableData) => Err(PipelineError::NoUsableData.into()),
        Err(e) => Err(AppError::Conflict(e.to_string())),
    }
}

async fn results(State(app): State<Arc<App>>) -> ApiResult<Json<ResultsResponse>> {
    let inner = app.inner.read().await;
    let run = finished_run(&inner)?;
    let projections = consolidated(run)?;

    Ok(Json(ResultsResponse {
        summary: run.summary,
        display: TableView::of(&projections.display)?,
        missing_columns: projections.missing_columns.clone(),
        failures: run.failures.iter().map(FailureView::from).collect(),
        notices: run.notices.clone(),
        batches: run
            .batches
            .iter()
            .map(|b| BatchView {
                index: b.index,
                symbols: b.symbols.clone(),
                rows: b.display.as_ref().map_or(0, DataFrame::height),
            })
            .collect(),
    }))
}

fn workbook(app: &App, table: &DataFrame, file_name: &str) -> ApiResult<Response> {
    let bytes = app.writer.write_table(table, DEFAULT_SHEET)?;
    info!(file = file_name, bytes = bytes.len(), "Serving workbook");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn download_display(State(app): State<Arc<App>>) -> ApiResult<Response> {
    let inner = app.inner.read().await;
    let projections = consolidated(finished_run(&inner)?)?;
    workbook(&app, &projections.display, DISPLAY_FILE_NAME)
}

async fn download_full(State(app): State<Arc<App>>) -> ApiResult<Response> {
    let inner = app.inner.read().await;
    let projections = consolidated(finished_run(&inner)?)?;
    workbook(&app, &projections.full, FULL_FILE_NAME)
}

async fn download_batch(
    State(app): State<Arc<App>>,
    Path(index): Path<usize>,
) -> ApiResult<Response> {
    let inner = app.inner.read().await;
    let table = finished_run(&inner)?
        .batch(index)
        .and_then(|b| b.display.as_ref())
        .ok_or_else(|| AppError::NotFound(format!("No results for batch {index}")))?;
    workbook(&app, table, &batch_file_name(index))
}
