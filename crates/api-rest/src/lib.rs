//! # API REST
//!
//! Browser-facing routes for the SMART launch and patient summary.
//!
//! Handles:
//! - `GET /`: landing page with a launch link
//! - `GET /launch`: redirect to the authorization server
//! - `GET /callback`: runs the aggregation pipeline and renders the summary
//! - `GET /health`: liveness JSON
//!
//! All protocol and data logic lives in `summary-core`; this crate only maps it onto HTTP.

#![warn(rust_2018_idioms)]

mod render;

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use summary_core::{AggregationPipeline, CallbackParams};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<AggregationPipeline>,
}

impl AppState {
    pub fn new(pipeline: AggregationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Liveness response for `/health`.
#[derive(Debug, Serialize)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/launch", get(launch))
        .route("/callback", get(callback))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[axum::debug_handler]
async fn home() -> impl IntoResponse {
    render::home_page()
}

/// Redirect the browser to the authorization endpoint with a fresh `state`.
#[axum::debug_handler]
async fn launch(State(state): State<AppState>) -> Response {
    let url = state.pipeline.oauth().begin_launch();
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

/// Complete the launch and render the summary, or an error page.
///
/// Callback problems (missing code, bad state, provider denial) are `400 Bad Request`;
/// upstream failures are `502 Bad Gateway`.
#[axum::debug_handler]
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.pipeline.run(&params).await {
        Ok(summary) => render::summary_page(&summary).into_response(),
        Err(e) => {
            tracing::error!("Callback failed: {}", e);
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            (status, render::error_page(&e.user_message())).into_response()
        }
    }
}

#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "SMART summary app is alive".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::Path,
        http::{HeaderMap, Request},
        routing::post,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use summary_core::ClientConfig;
    use tower::ServiceExt;

    fn config(auth_base: &str, fhir_base: &str) -> ClientConfig {
        ClientConfig::new(
            auth_base,
            fhir_base,
            "test-client",
            "http://localhost:8000/callback",
            vec!["launch".into(), "patient/*.read".into()],
            Duration::from_secs(2),
            0,
        )
        .expect("config")
    }

    fn app_for(auth_base: &str, fhir_base: &str) -> (Router, AppState) {
        let pipeline =
            AggregationPipeline::new(Arc::new(config(auth_base, fhir_base))).expect("pipeline");
        let state = AppState::new(pipeline);
        (router(state.clone()), state)
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn state_of(location: &str) -> String {
        url::Url::parse(location)
            .expect("location")
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state")
    }

    #[tokio::test]
    async fn home_links_to_launch() {
        let (app, _) = app_for("http://127.0.0.1:9", "http://127.0.0.1:9/fhir");
        let (status, _, body) = fetch(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"href="/launch""#));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = app_for("http://127.0.0.1:9", "http://127.0.0.1:9/fhir");
        let (status, _, body) = fetch(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn launch_redirects_with_registered_state() {
        let (app, state) = app_for("https://auth.example", "https://auth.example/fhir");
        let (status, headers, _) = fetch(app, "/launch").await;

        assert_eq!(status, StatusCode::FOUND);
        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location");
        assert!(location.starts_with("https://auth.example/auth/authorize?response_type=code"));
        assert!(location.contains("aud=https%3A%2F%2Fauth.example%2Ffhir"));
        assert!(!state_of(location).is_empty());
        assert_eq!(state.pipeline.oauth().pending_launches().len(), 1);
    }

    #[tokio::test]
    async fn callback_without_code_is_bad_request() {
        let (app, _) = app_for("http://127.0.0.1:9", "http://127.0.0.1:9/fhir");
        let (status, _, body) = fetch(app, "/callback").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing auth code"));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_bad_request() {
        let (app, _) = app_for("http://127.0.0.1:9", "http://127.0.0.1:9/fhir");
        let (status, _, body) = fetch(app, "/callback?code=abc&state=forged").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Launch state did not match"));
    }

    #[tokio::test]
    async fn failed_token_exchange_is_bad_gateway() {
        let upstream = spawn_upstream(Router::new().route(
            "/auth/token",
            post(|| async { Json(json!({"error": "invalid_grant"})) }),
        ))
        .await;
        let (app, _) = app_for(&upstream, &format!("{upstream}/fhir"));

        let (_, headers, _) = fetch(app.clone(), "/launch").await;
        let state = state_of(headers[LOCATION].to_str().expect("location"));
        let (status, _, body) = fetch(app, &format!("/callback?code=abc&state={state}")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("Token exchange failed"));
    }

    #[tokio::test]
    async fn callback_renders_summary() {
        let upstream = spawn_upstream(
            Router::new()
                .route(
                    "/auth/token",
                    post(|| async { Json(json!({"access_token": "tok", "patient": "123"})) }),
                )
                .route(
                    "/fhir/Patient/:id",
                    get(|Path(id): Path<String>| async move {
                        assert_eq!(id, "123");
                        Json(json!({"resourceType": "Patient", "name": [{"given": ["Ann"], "family": "Lee"}]}))
                    }),
                )
                .route(
                    "/fhir/Condition",
                    get(|| async {
                        Json(json!({"entry": [
                            {"resource": {"code": {"text": "Hypertension"}}},
                            {"resource": {"code": {"text": "Asthma"}}}
                        ]}))
                    }),
                )
                .route(
                    "/fhir/MedicationRequest",
                    get(|| async { Json(json!({"resourceType": "Bundle"})) }),
                )
                .route(
                    "/fhir/Observation",
                    get(|| async {
                        Json(json!({"entry": [{"resource": {
                            "code": {"text": "Heart rate"},
                            "valueQuantity": {"value": 72, "unit": "bpm"}
                        }}]}))
                    }),
                ),
        )
        .await;
        let (app, _) = app_for(&upstream, &format!("{upstream}/fhir"));

        let (_, headers, _) = fetch(app.clone(), "/launch").await;
        let state = state_of(headers[LOCATION].to_str().expect("location"));
        let (status, _, body) = fetch(app, &format!("/callback?code=abc123&state={state}")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Hello, Ann Lee"));
        assert!(body.contains("Patient ID: 123"));
        let asthma = body.find("<li>Asthma</li>").expect("asthma");
        let hypertension = body.find("<li>Hypertension</li>").expect("hypertension");
        assert!(asthma < hypertension);
        assert!(body.contains("<li>Heart rate: 72 bpm</li>"));
    }
}
