use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    AltCategory, AssetClass, NamedStrategy, RiskLabel, SessionSnapshot, StrategyKey,
    TopLevelAllocation, WizardSession, catalog, gauge_position, risk_label, risk_score,
};
use crate::import::{CsvBackend, ImportError, ImportReport, run_import};
use crate::store::{KeyValueStore, StoreError};

struct Wizard {
    session: WizardSession,
    store: Box<dyn KeyValueStore>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<Wizard>>,
    import: Option<Arc<dyn CsvBackend>>,
}

impl AppState {
    /// Loads the session held in `store`, seeding it on first use.
    pub fn load(mut store: Box<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let session = WizardSession::load(store.as_mut())?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Wizard { session, store })),
            import: None,
        })
    }

    /// Enables `POST /api/import` against `backend`.
    pub fn with_import_backend(mut self, backend: Arc<dyn CsvBackend>) -> Self {
        self.import = Some(backend);
        self
    }

    fn read<T>(&self, f: impl FnOnce(&WizardSession) -> T) -> Result<T, ApiError> {
        let wizard = self.inner.lock().map_err(|_| ApiError::Poisoned)?;
        Ok(f(&wizard.session))
    }

    /// Runs one mutation on a copy of the session. The copy replaces the
    /// live session only once it has been saved.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut WizardSession) -> Result<T, ApiError>,
    ) -> Result<(T, SessionSnapshot), ApiError> {
        let mut wizard = self.inner.lock().map_err(|_| ApiError::Poisoned)?;
        let Wizard { session, store } = &mut *wizard;
        let mut next = session.clone();
        let outcome = f(&mut next)?;
        next.save(store.as_mut())?;
        *session = next;
        Ok((outcome, session.snapshot()))
    }

    /// [`AppState::mutate`] on the blocking pool, since saving may touch
    /// the filesystem while the session lock is held.
    async fn commit<T, F>(&self, f: F) -> Result<(T, SessionSnapshot), ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut WizardSession) -> Result<T, ApiError> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || state.mutate(f)).await?
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("session state is unavailable")]
    Poisoned,
    #[error("failed to save session: {0}")]
    Store(#[from] StoreError),
    #[error("session worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("csv import is not configured")]
    ImportUnavailable,
    #[error("csv import failed: {0}")]
    Import(#[from] ImportError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Poisoned | ApiError::Store(_) | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ImportUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Import(err) if err.stage().is_some() => StatusCode::BAD_GATEWAY,
            ApiError::Import(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        error_response(status, &self.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RiskPayload {
    equities: Option<f64>,
    bonds: Option<f64>,
    cash: Option<f64>,
    alternatives: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioSizePayload {
    portfolio_size: u64,
}

#[derive(Debug, Deserialize)]
struct AllocationPayload {
    category: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct DollarPayload {
    category: String,
    dollars: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StrategyPayload {
    strategy: String,
}

#[derive(Debug, Deserialize)]
struct DraftEditPayload {
    category: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportPayload {
    file_name: String,
    content: String,
    #[serde(default)]
    table_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RiskResponse {
    allocation: TopLevelAllocation,
    total_allocation: f64,
    is_complete: bool,
    score: f64,
    label: RiskLabel,
    gauge_position: f64,
}

#[derive(Debug, Serialize)]
struct MutationResponse {
    applied: bool,
    session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn allocation_from_payload(payload: RiskPayload) -> Result<TopLevelAllocation, String> {
    let mut allocation = TopLevelAllocation::default();
    for (class, value) in [
        (AssetClass::Equities, payload.equities),
        (AssetClass::Bonds, payload.bonds),
        (AssetClass::Cash, payload.cash),
        (AssetClass::Alternatives, payload.alternatives),
    ] {
        let value = value.unwrap_or(0.0);
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{class} must be a finite number >= 0"));
        }
        match class {
            AssetClass::Equities => allocation.equities = value,
            AssetClass::Bonds => allocation.bonds = value,
            AssetClass::Cash => allocation.cash = value,
            AssetClass::Alternatives => allocation.alternatives = value,
        }
    }
    Ok(allocation)
}

fn build_risk_response(allocation: TopLevelAllocation) -> RiskResponse {
    let score = risk_score(&allocation);
    RiskResponse {
        allocation,
        total_allocation: allocation.total(),
        is_complete: allocation.is_complete(),
        score,
        label: risk_label(score),
        gauge_position: gauge_position(score),
    }
}

fn parse_key<T>(raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

/// Form fields arrive as either JSON numbers or strings; both are handed to
/// the engine's own parsing as text.
fn raw_input(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/strategies", get(strategies_handler))
        .route("/api/risk", get(risk_get_handler).post(risk_post_handler))
        .route("/api/session", get(session_handler))
        .route("/api/session/charts", get(charts_handler))
        .route("/api/session/reset", post(reset_handler))
        .route("/api/session/portfolio-size", post(portfolio_size_handler))
        .route("/api/session/allocation", post(allocation_handler))
        .route("/api/session/allocation/dollars", post(dollars_handler))
        .route("/api/session/strategy", post(strategy_handler))
        .route(
            "/api/session/custom-allocation",
            post(custom_allocation_handler),
        )
        .route(
            "/api/session/alternatives/dialog/open",
            post(dialog_open_handler),
        )
        .route(
            "/api/session/alternatives/dialog/edit",
            post(dialog_edit_handler),
        )
        .route(
            "/api/session/alternatives/dialog/cancel",
            post(dialog_cancel_handler),
        )
        .route(
            "/api/session/alternatives/dialog/apply",
            post(dialog_apply_handler),
        )
        .route(
            "/api/session/alternatives/visibility",
            post(visibility_handler),
        )
        .route("/api/import", post(import_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    info!("allocation API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{}/api/session", addr.port());

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn strategies_handler() -> Response {
    let strategies: Vec<NamedStrategy> = catalog();
    json_response(StatusCode::OK, strategies)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn risk_get_handler(Query(payload): Query<RiskPayload>) -> Response {
    risk_handler_impl(payload)
}

async fn risk_post_handler(Json(payload): Json<RiskPayload>) -> Response {
    risk_handler_impl(payload)
}

fn risk_handler_impl(payload: RiskPayload) -> Response {
    match allocation_from_payload(payload) {
        Ok(allocation) => json_response(StatusCode::OK, build_risk_response(allocation)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn session_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let snapshot = state.read(WizardSession::snapshot)?;
    Ok(json_response(StatusCode::OK, snapshot))
}

async fn charts_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let charts = state.read(WizardSession::charts)?;
    Ok(json_response(StatusCode::OK, charts))
}

async fn reset_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    mutation_response(
        state
            .commit(|session| {
                *session = WizardSession::new();
                Ok(true)
            })
            .await,
    )
}

async fn portfolio_size_handler(
    State(state): State<AppState>,
    Json(payload): Json<PortfolioSizePayload>,
) -> Result<Response, ApiError> {
    let size = payload.portfolio_size;
    mutation_response(
        state
            .commit(move |session| Ok(session.set_portfolio_size(size)))
            .await,
    )
}

async fn allocation_handler(
    State(state): State<AppState>,
    Json(payload): Json<AllocationPayload>,
) -> Result<Response, ApiError> {
    let class: AssetClass = parse_key(&payload.category)?;
    let value = payload.value;
    mutation_response(
        state
            .commit(move |session| Ok(session.update_allocation(class, value)))
            .await,
    )
}

async fn dollars_handler(
    State(state): State<AppState>,
    Json(payload): Json<DollarPayload>,
) -> Result<Response, ApiError> {
    let class: AssetClass = parse_key(&payload.category)?;
    let input = raw_input(&payload.dollars);
    mutation_response(
        state
            .commit(move |session| Ok(session.set_allocation_from_dollars(class, &input)))
            .await,
    )
}

async fn strategy_handler(
    State(state): State<AppState>,
    Json(payload): Json<StrategyPayload>,
) -> Result<Response, ApiError> {
    let key: StrategyKey = parse_key(&payload.strategy)?;
    mutation_response(
        state
            .commit(move |session| {
                session.select_strategy(key);
                Ok(true)
            })
            .await,
    )
}

async fn custom_allocation_handler(
    State(state): State<AppState>,
    Json(payload): Json<AllocationPayload>,
) -> Result<Response, ApiError> {
    let class: AssetClass = parse_key(&payload.category)?;
    let value = payload.value;
    mutation_response(
        state
            .commit(move |session| Ok(session.update_custom_allocation(class, value)))
            .await,
    )
}

async fn dialog_open_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    mutation_response(
        state
            .commit(|session| {
                session.open_alternatives_dialog();
                Ok(true)
            })
            .await,
    )
}

async fn dialog_edit_handler(
    State(state): State<AppState>,
    Json(payload): Json<DraftEditPayload>,
) -> Result<Response, ApiError> {
    let category: AltCategory = parse_key(&payload.category)?;
    let raw = raw_input(&payload.value);
    mutation_response(
        state
            .commit(move |session| {
                if session.edit_alternatives_draft(category, &raw) {
                    Ok(true)
                } else {
                    Err(ApiError::Conflict(
                        "the adjustment dialog is not open".to_string(),
                    ))
                }
            })
            .await,
    )
}

async fn dialog_cancel_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    mutation_response(
        state
            .commit(|session| {
                session.cancel_alternatives_dialog();
                Ok(true)
            })
            .await,
    )
}

async fn dialog_apply_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    mutation_response(
        state
            .commit(|session| {
                session
                    .apply_alternatives_dialog()
                    .map(|_| true)
                    .map_err(|reason| ApiError::Conflict(reason.to_string()))
            })
            .await,
    )
}

async fn visibility_handler(
    State(state): State<AppState>,
    Json(payload): Json<CategoryPayload>,
) -> Result<Response, ApiError> {
    let category: AltCategory = parse_key(&payload.category)?;
    mutation_response(
        state
            .commit(move |session| Ok(session.toggle_category_visibility(category)))
            .await,
    )
}

async fn import_handler(
    State(state): State<AppState>,
    Json(payload): Json<ImportPayload>,
) -> Result<Response, ApiError> {
    let backend = state.import.clone().ok_or(ApiError::ImportUnavailable)?;
    let report: ImportReport = run_import(
        backend.as_ref(),
        &payload.file_name,
        payload.content.as_bytes(),
        payload.table_name.as_deref(),
    )
    .await?;
    Ok(json_response(StatusCode::OK, report))
}

fn mutation_response(
    result: Result<(bool, SessionSnapshot), ApiError>,
) -> Result<Response, ApiError> {
    let (applied, session) = result?;
    Ok(json_response(
        StatusCode::OK,
        MutationResponse { applied, session },
    ))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
