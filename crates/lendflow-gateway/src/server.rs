//! Gateway server: loan workflow endpoints plus bearer-protected ledger audit

use crate::auth::ResolvedAuth;
use crate::config::LendflowConfig;
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lendflow_agent::WorkflowCoordinator;
use lendflow_core::{ErrorKind, LoanRequest, LoanStatus, PaymentRequest};
use lendflow_ledger::{validate_channel, FileLedger, Ledger, LedgerError};
use lendflow_remote::mock::MemoryArtifactStore;
use lendflow_remote::{ArtifactStore, GeminiReasoner, PinataStore, ResilientClient};
use lendflow_stages::StageContext;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub struct AppState {
    pub coordinator: WorkflowCoordinator,
    pub ledger: Arc<dyn Ledger>,
    pub auth: ResolvedAuth,
    pub ledger_dir: Option<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(coordinator: WorkflowCoordinator, auth: ResolvedAuth) -> Self {
        let ledger = coordinator.context().ledger.clone();
        Self {
            coordinator,
            ledger,
            auth,
            ledger_dir: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_ledger_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ledger_dir = Some(dir.into());
        self
    }
}

/// Wire the production collaborators described by `config`.
///
/// With `local_artifacts` the artifact store is kept in memory instead of
/// pinning to the remote service.
pub fn build_state(config: &LendflowConfig, local_artifacts: bool) -> anyhow::Result<AppState> {
    let ledger = Arc::new(FileLedger::open(&config.ledger.dir)?);

    let reasoner = GeminiReasoner::from_env()
        .with_model(&config.reasoning.model)
        .with_base_url(&config.reasoning.base_url);
    let store: Arc<dyn ArtifactStore> = if local_artifacts {
        warn!("artifacts are kept in memory and lost on exit");
        Arc::new(MemoryArtifactStore::new())
    } else {
        Arc::new(
            PinataStore::from_env()
                .with_api_url(&config.artifacts.api_url)
                .with_gateway_url(&config.artifacts.gateway_url)
                .with_timeout(config.artifact_timeout()),
        )
    };
    let remote = ResilientClient::new(Arc::new(reasoner), store).with_policy(config.retry_policy());

    let ctx = StageContext::new(ledger, Arc::new(remote))
        .with_policies(config.policy_table())
        .with_settings(config.workflow_settings());
    let auth = ResolvedAuth::from_env(&config.gateway.auth);

    Ok(AppState::new(WorkflowCoordinator::new(ctx), auth).with_ledger_dir(&config.ledger.dir))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/loan", post(loan_handler))
        .route("/payment", post(payment_handler))
        .route("/ledger/:channel", get(ledger_handler))
        .route("/ledger/:channel/verify", get(verify_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn start_gateway(config: LendflowConfig, local_artifacts: bool) -> anyhow::Result<()> {
    let state = Arc::new(build_state(&config, local_artifacts)?);
    let app = router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.gateway.bind.to_addr(), config.gateway.port).parse()?;

    info!("Lendflow Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Ledger dir:   {:?}", config.ledger.dir);
    info!("  Auth mode:    {:?}", config.gateway.auth.mode);
    info!("  Policies:     {}", config.policy_table().tiers().len());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_body(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Response {
    let body = json!({
        "status": "error",
        "errorKind": kind,
        "reason": message.into(),
    });
    (status, Json(body)).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_failure(channel: &str, e: LedgerError) -> Response {
    match e {
        LedgerError::InvalidChannel(_) => error_body(StatusCode::BAD_REQUEST, ErrorKind::Validation, e.to_string()),
        e => {
            error!(channel, error = %e, "ledger read failed");
            let kind = if e.is_corruption() { ErrorKind::LedgerCorruption } else { ErrorKind::Ledger };
            error_body(StatusCode::INTERNAL_SERVER_ERROR, kind, e.to_string())
        }
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "ledgerDir": state.ledger_dir,
        "stages": state.coordinator.pipeline().names(),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

async fn loan_handler(State(state): State<Arc<AppState>>, Json(request): Json<LoanRequest>) -> Response {
    let outcome = state.coordinator.run(request).await;
    let session = outcome.session_id.clone();
    let response = outcome.into_response();

    let code = match (response.status, response.error_kind) {
        (LoanStatus::Error, Some(kind)) => status_for(kind),
        (LoanStatus::Error, None) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    info!(session = %session, status = ?response.status, code = code.as_u16(), "loan request handled");
    (code, Json(response)).into_response()
}

async fn payment_handler(State(state): State<Arc<AppState>>, Json(request): Json<PaymentRequest>) -> Response {
    match state
        .coordinator
        .record_payment(&request.loan_id, &request.payment_data)
        .await
    {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => {
            let kind = e.kind();
            warn!(loan_id = %request.loan_id, error = %e, "payment not recorded");
            error_body(status_for(kind), kind, e.to_string())
        }
    }
}

async fn ledger_handler(
    AxumPath(channel): AxumPath<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(e) = state.auth.verify_headers(&headers) {
        return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
    }
    if let Err(e) = validate_channel(&channel) {
        return ledger_failure(&channel, e);
    }
    match state.ledger.read(&channel).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => ledger_failure(&channel, e),
    }
}

async fn verify_handler(
    AxumPath(channel): AxumPath<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(e) = state.auth.verify_headers(&headers) {
        return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
    }
    if let Err(e) = validate_channel(&channel) {
        return ledger_failure(&channel, e);
    }
    match state.ledger.audit(&channel).await {
        Ok(report) => {
            if !report.valid {
                warn!(channel = %channel, first_invalid = ?report.first_invalid, "chain verification failed");
            }
            Json(report).into_response()
        }
        Err(e) => ledger_failure(&channel, e),
    }
}
