//! Local HTTP API
//!
//! A thin JSON layer over the session: the UI posts form state, gets
//! classified rows back, and triggers exports and credential preloads.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::classify::{ReportColumns, SortKey};
use crate::config::Config;
use crate::credentials::ProviderKeys;
use crate::error::{ExportError, SearchError, ValidationError};
use crate::request::{build_with_keys, FormState};
use crate::service::DeriveService;
use crate::session::{SearchSession, SearchSnapshot};

pub struct AppState {
    pub config: Config,
    pub session: SearchSession,
    pub service: Arc<dyn DeriveService>,
    pub credentials: RwLock<ProviderKeys>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<dyn DeriveService>, credentials: ProviderKeys) -> Self {
        Self {
            config,
            session: SearchSession::new(),
            service,
            credentials: RwLock::new(credentials),
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(|| async { "Seedsweep is running" }))
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/report", get(report))
        .route("/report/sort", post(sort_report))
        .route("/report/columns", post(relabel_report))
        .route("/export/filtered", post(export_filtered))
        .route("/export/all", post(export_all))
        .route("/credentials", post(load_credentials))
        .with_state(state)
}

/// JSON error envelope: `{"error": "...", "kind": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "kind": self.kind })),
        )
            .into_response()
    }
}

/// Undecodable bodies (unknown network, bad change type, broken JSON) get
/// the same envelope as builder validation errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, "validation", rejection.body_text())
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", e.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let status = match &e {
            SearchError::Validation(_) => StatusCode::BAD_REQUEST,
            SearchError::Busy | SearchError::Superseded { .. } => StatusCode::CONFLICT,
            SearchError::Transport(_) | SearchError::Service { .. } | SearchError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, e.kind(), e.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Empty(_) => Self::new(StatusCode::NOT_FOUND, "export_empty", e.to_string()),
            other => {
                error!("Export failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "export", other.to_string())
            }
        }
    }
}

fn snapshot_json(snapshot: &SearchSnapshot) -> Value {
    json!({
        "token": snapshot.token,
        "completed_at": snapshot.completed_at,
        "derived_count": snapshot.all_derived_wallets.len(),
        "report": snapshot.report,
    })
}

fn no_report() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "no_report", "no search results; run a search first")
}

async fn health(State(state): State<SharedState>) -> Response {
    match state.service.probe().await {
        Ok(()) => (StatusCode::OK, "OK - derivation service reachable").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Derivation service unreachable: {}", e),
        )
            .into_response(),
    }
}

async fn search(
    State(state): State<SharedState>,
    payload: Result<Json<FormState>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(form) = payload?;
    let preloaded = state.credentials.read().clone();
    let request = build_with_keys(&form, &preloaded)?;
    let snapshot = state.session.run(state.service.as_ref(), request).await?;
    Ok(Json(snapshot_json(&snapshot)))
}

async fn report(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.session.snapshot().ok_or_else(no_report)?;
    Ok(Json(snapshot_json(&snapshot)))
}

#[derive(Debug, Deserialize)]
struct SortRequest {
    key: SortKey,
}

async fn sort_report(
    State(state): State<SharedState>,
    payload: Result<Json<SortRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let snapshot = state.session.sort(body.key).ok_or_else(no_report)?;
    Ok(Json(snapshot_json(&snapshot)))
}

async fn relabel_report(
    State(state): State<SharedState>,
    payload: Result<Json<ReportColumns>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(columns) = payload?;
    let snapshot = state.session.set_columns(columns).ok_or_else(no_report)?;
    Ok(Json(snapshot_json(&snapshot)))
}

async fn export_filtered(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let summary = tokio::task::spawn_blocking(move || state.session.export_filtered(&state.config.export_dir))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "export", e.to_string()))??;
    Ok(Json(json!(summary)))
}

async fn export_all(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let summary = tokio::task::spawn_blocking(move || state.session.export_all(&state.config.export_dir))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "export", e.to_string()))??;
    Ok(Json(json!(summary)))
}

async fn load_credentials(State(state): State<SharedState>, body: String) -> Json<Value> {
    let (keys, loaded) = ProviderKeys::parse(&body, &state.config.providers);
    state.credentials.write().merge(&keys);
    info!("Credential upload: {} key(s) loaded", loaded);

    let providers: Vec<&str> = keys.providers().collect();
    Json(json!({ "loaded": loaded, "providers": providers }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DerivedWalletRecord, SearchResult};
    use crate::request::SearchRequest;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt as _;

    struct StubService {
        api_key_seen: Arc<RwLock<Option<String>>>,
    }

    #[async_trait]
    impl DeriveService for StubService {
        async fn derive_and_check(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
            *self.api_key_seen.write() = Some(request.api_key("ethereum").to_string());
            let hit = DerivedWalletRecord {
                address: "0x1111111111111111111111111111111111111111".into(),
                network: "ETH".into(),
                derivation_path: "m/44'/60'/0'/0/0".into(),
                private_key: "0xpk".into(),
                balance_crypto: "0.5".into(),
                balance_usd: "1500".into(),
                has_real_balance: true,
                has_transactions: true,
                ..Default::default()
            };
            let miss = DerivedWalletRecord {
                address: "0x2222222222222222222222222222222222222222".into(),
                network: "ETH".into(),
                derivation_path: "m/44'/60'/0'/0/1".into(),
                private_key: "0xpk2".into(),
                ..Default::default()
            };
            Ok(SearchResult {
                results: vec![hit.clone()],
                all_derived_wallets: vec![hit, miss],
            })
        }

        async fn probe(&self) -> Result<(), SearchError> {
            Err(SearchError::Transport("connection refused".into()))
        }
    }

    fn app() -> (Router, SharedState, Arc<RwLock<Option<String>>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let export_dir = dir.path().to_path_buf();
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.export_dir = export_dir;

        let seen = Arc::new(RwLock::new(None));
        let service = Arc::new(StubService {
            api_key_seen: seen.clone(),
        });
        let state = Arc::new(AppState::new(config, service, ProviderKeys::new()));
        (router(state.clone()), state, seen, dir)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn form() -> Value {
        json!({
            "seed_phrase": "test test test test test test test test test test test junk",
            "selected_networks": ["ETH"],
            "change_types": [0]
        })
    }

    #[tokio::test]
    async fn search_returns_classified_report() {
        let (app, _, _, _dir) = app();

        let response = app.oneshot(post_json("/search", form())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["derived_count"], json!(2));
        assert_eq!(body["report"]["found"], json!(1));
        assert_eq!(body["report"]["total_usd_display"], json!("$1500.00"));
        assert_eq!(body["report"]["rows"][0]["balance_display"], json!("0.50000000 ETH"));
        assert_eq!(body["report"]["rows"][0]["status"], json!("has_balance"));
    }

    #[tokio::test]
    async fn validation_failure_is_bad_request() {
        let (app, _, _, _dir) = app();
        let mut body = form();
        body["selected_networks"] = json!(["BTC"]);

        let response = app.oneshot(post_json("/search", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["kind"], json!("validation"));
    }

    #[tokio::test]
    async fn undecodable_form_uses_error_envelope() {
        let (app, state, _, _dir) = app();

        let mut unknown_network = form();
        unknown_network["selected_networks"] = json!(["DOGE"]);
        let mut bad_change = form();
        bad_change["change_types"] = json!([2]);

        for body in [unknown_network, bad_change] {
            let response = app.clone().oneshot(post_json("/search", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["kind"], json!("validation"));
        }

        let no_content_type = Request::builder()
            .method("POST")
            .uri("/search")
            .body(Body::from(form().to_string()))
            .unwrap();
        let response = app.clone().oneshot(no_content_type).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["kind"], json!("validation"));

        let response = app
            .oneshot(post_json("/report/sort", json!({ "key": "by_mood" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.session.snapshot().is_none());
    }

    #[tokio::test]
    async fn exports_require_a_search_first() {
        let (app, _, _, _dir) = app();

        let response = app.clone().oneshot(post_empty("/export/all")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.oneshot(get_req("/report")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn search_then_export_both_files() {
        let (app, state, _, dir) = app();

        app.clone().oneshot(post_json("/search", form())).await.unwrap();

        let response = app.clone().oneshot(post_empty("/export/filtered")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["rows"], json!(1));

        let response = app.oneshot(post_empty("/export/all")).await.unwrap();
        assert_eq!(json_body(response).await["rows"], json!(2));

        assert!(dir.path().join(crate::export::FILTERED_EXPORT_FILE).exists());
        assert!(dir.path().join(crate::export::FULL_EXPORT_FILE).exists());
        assert!(state.session.snapshot().is_some());
    }

    #[tokio::test]
    async fn uploaded_credentials_feed_later_searches() {
        let (app, _, seen, _dir) = app();

        let upload = Request::builder()
            .method("POST")
            .uri("/credentials")
            .body(Body::from("ethereum=abc123\nfoo=bar\ntron=xyz\n"))
            .unwrap();
        let response = app.clone().oneshot(upload).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["loaded"], json!(2));

        app.oneshot(post_json("/search", form())).await.unwrap();
        assert_eq!(seen.read().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn sort_and_relabel_endpoints() {
        let (app, _, _, _dir) = app();
        app.clone().oneshot(post_json("/search", form())).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json("/report/sort", json!({ "key": "usd_descending" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut columns = serde_json::to_value(ReportColumns::default()).unwrap();
        columns["usd"] = json!("USD");
        let response = app.oneshot(post_json("/report/columns", columns)).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["report"]["columns"]["usd"], json!("USD"));
    }

    #[tokio::test]
    async fn health_reports_unreachable_service() {
        let (app, _, _, _dir) = app();
        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn search_errors_map_to_statuses() {
        let busy: ApiError = SearchError::Busy.into();
        assert_eq!(busy.status, StatusCode::CONFLICT);

        let transport: ApiError = SearchError::Transport("reset".into()).into();
        assert_eq!(transport.status, StatusCode::BAD_GATEWAY);
        assert_eq!(transport.kind, "transport");
    }
}
