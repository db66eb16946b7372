//! HTTP Server for the dtpi API.
//!
//! Read-only JSON endpoints over the analysis report. The report is computed
//! on the first request that needs it and kept for the process lifetime;
//! tables are fetched through a [`CachedProvider`].
//!
//! # API Endpoints
//!
//! | Method | Path                                   | Description                    |
//! |--------|----------------------------------------|--------------------------------|
//! | GET    | `/health`                              | Health check                   |
//! | GET    | `/api/countries`                       | Configured and analysed countries |
//! | GET    | `/api/report`                          | Full analysis report           |
//! | GET    | `/api/countries/{geo}`                 | One country's report           |
//! | GET    | `/api/countries/{geo}/series/{metric}` | One series, `?window=N`        |
//! | GET    | `/api/logs`                            | SSE stream for real-time logs  |

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, CountriesResponse, SeriesQuery, SeriesResponse};
use crate::cache::CachedProvider;
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, ServerResult};
use crate::models::Metric;
use crate::source::{provider_from_config, DataProvider};
use crate::transform::pipeline::{run_analysis, AnalysisReport, CountryReport};
use crate::transform::stats::series_statistics;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared server state
pub struct AppState {
    config: AnalysisConfig,
    provider: CachedProvider<Box<dyn DataProvider>>,
    report: OnceCell<Arc<AnalysisReport>>,
}

impl AppState {
    pub fn new(config: AnalysisConfig, provider: Box<dyn DataProvider>) -> Self {
        Self {
            config,
            provider: CachedProvider::new(provider),
            report: OnceCell::new(),
        }
    }

    /// The memoized report; failed runs are not memoized.
    pub async fn report(&self) -> Result<Arc<AnalysisReport>, PipelineError> {
        self.report
            .get_or_try_init(|| async {
                run_analysis(&self.provider, &self.config).await.map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/countries", get(list_countries))
        .route("/api/report", get(full_report))
        .route("/api/countries/{geo}", get(country_report))
        .route("/api/countries/{geo}/series/{metric}", get(country_series))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: AnalysisConfig) -> ServerResult<()> {
    config.validate().map_err(PipelineError::from)?;
    let provider = provider_from_config(&config.source);
    let app = router(Arc::new(AppState::new(config, provider)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("dtpi server running on http://localhost:{}", port);
    tracing::info!("   GET  /api/report                          - Full report");
    tracing::info!("   GET  /api/countries/{{geo}}/series/{{metric}} - One series");
    tracing::info!("   GET  /api/logs                            - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dtpi",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "report": "GET /api/report",
            "countries": "GET /api/countries",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_countries(State(state): State<Arc<AppState>>) -> ApiResult<CountriesResponse> {
    let report = load_report(&state).await?;
    Ok(Json(CountriesResponse::new(&state.config.countries, &report)))
}

async fn full_report(State(state): State<Arc<AppState>>) -> ApiResult<AnalysisReport> {
    let report = load_report(&state).await?;
    Ok(Json(AnalysisReport::clone(&report)))
}

async fn country_report(
    State(state): State<Arc<AppState>>,
    Path(geo): Path<String>,
) -> ApiResult<CountryReport> {
    let report = load_report(&state).await?;
    find_country(&report, &geo).cloned().map(Json)
}

async fn country_series(
    State(state): State<Arc<AppState>>,
    Path((geo, metric)): Path<(String, String)>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<SeriesResponse> {
    let metric: Metric = metric.parse().map_err(|e: String| bad_request(&e))?;
    let report = load_report(&state).await?;
    let country = find_country(&report, &geo)?;

    let statistics = series_statistics(
        &country.metric_points(metric),
        query.window.unwrap_or(state.config.moving_average_window),
        query
            .derivative_window
            .unwrap_or(state.config.moving_derivative_window),
    )
    .map_err(|e| bad_request(&e.to_string()))?;

    Ok(Json(SeriesResponse::new(country, metric, statistics)))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn load_report(state: &AppState) -> Result<Arc<AnalysisReport>, ApiError> {
    state.report().await.map_err(|e| {
        log_error(format!("Analysis failed: {}", e));
        let status = match &e {
            PipelineError::Source(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&e.to_string())))
    })
}

fn find_country<'a>(report: &'a AnalysisReport, geo: &str) -> Result<&'a CountryReport, ApiError> {
    report.country(geo).ok_or_else(|| {
        let message = match report.failure(geo) {
            Some(failure) => format!("country '{}' was not analysed: {}", geo, failure.reason),
            None => format!("country '{}' not found", geo),
        };
        (StatusCode::NOT_FOUND, Json(error_response(&message)))
    })
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(message)))
}
