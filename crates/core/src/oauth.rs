//! SMART-on-FHIR authorization-code flow.
//!
//! The flow has three steps:
//! 1. [`OAuthFlow::begin_launch`] issues a fresh `state` and builds the authorization URL the
//!    browser is redirected to.
//! 2. [`OAuthFlow::handle_callback`] validates the redirect back from the provider and yields
//!    the authorization code.
//! 3. [`OAuthFlow::exchange_token`] trades the code for an access token and patient context.
//!
//! The exchange is attempted exactly once. Authorization codes are single-use, so re-posting
//! the same code would fail server-side anyway.

use crate::config::ClientConfig;
use crate::constants::{LAUNCH_STATE_TTL, MAX_PENDING_LAUNCHES};
use crate::error::AuthError;
use crate::launch_store::{generate_state, PendingLaunches};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Parameters of one authorization redirect.
///
/// Created per launch and never persisted; only `state` is remembered until the callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub audience_url: String,
    pub state: String,
}

impl AuthorizationRequest {
    /// Describe an authorization request for `config` carrying `state`.
    pub fn new(config: &ClientConfig, state: impl Into<String>) -> Self {
        Self {
            client_id: config.client_id().to_string(),
            redirect_uri: config.redirect_uri().to_string(),
            scopes: config.scopes().to_vec(),
            audience_url: config.fhir_base(),
            state: state.into(),
        }
    }

    /// Space-joined scope string, in configured order.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Build the authorization endpoint URL for `request`.
///
/// Pure construction, no network call. Query parameters are form-encoded in the order
/// `response_type`, `client_id`, `redirect_uri`, `scope`, `aud`, `state`.
pub fn build_authorize_url(config: &ClientConfig, request: &AuthorizationRequest) -> Url {
    let mut url = config.authorize_endpoint().clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &request.client_id)
        .append_pair("redirect_uri", &request.redirect_uri)
        .append_pair("scope", &request.scope())
        .append_pair("aud", &request.audience_url)
        .append_pair("state", &request.state);
    url
}

/// Query parameters of the provider's redirect back to `/callback`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Callback carrying only a code and state.
    pub fn with_code(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Self::default()
        }
    }
}

/// Result of a successful code exchange.
///
/// Produced once per callback, owned by that request, never cached or refreshed.
#[derive(Clone)]
pub struct TokenResult {
    pub access_token: String,
    pub patient_id: String,
    /// The full decoded token response.
    pub raw_claims: Map<String, Value>,
}

impl std::fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"<redacted>")
            .field("patient_id", &self.patient_id)
            .field("claims", &self.raw_claims.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TokenResult {
    /// Extract a usable token result from a decoded token response body.
    ///
    /// Both `access_token` and `patient` must be present, string-typed and non-empty.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, AuthError> {
        let field = |name: &str| {
            claims
                .get(name)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let access_token = field("access_token").ok_or_else(|| {
            AuthError::TokenExchangeFailed("response has no access_token".into())
        })?;
        let patient_id = field("patient")
            .ok_or_else(|| AuthError::TokenExchangeFailed("response has no patient".into()))?;

        Ok(Self {
            access_token,
            patient_id,
            raw_claims: claims,
        })
    }
}

/// Authorization-code flow against one SMART authorization server.
#[derive(Clone, Debug)]
pub struct OAuthFlow {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    launches: Arc<PendingLaunches>,
}

impl OAuthFlow {
    pub fn new(config: Arc<ClientConfig>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            launches: Arc::new(PendingLaunches::new(LAUNCH_STATE_TTL, MAX_PENDING_LAUNCHES)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pending_launches(&self) -> &PendingLaunches {
        &self.launches
    }

    /// Issue a fresh state, remember it, and return the authorization URL carrying it.
    pub fn begin_launch(&self) -> Url {
        let state = generate_state();
        self.launches.insert(&state);
        let request = AuthorizationRequest::new(&self.config, state);
        let url = build_authorize_url(&self.config, &request);
        debug!("Issued launch redirect to {}", self.config.authorize_endpoint());
        url
    }

    /// Validate the provider's redirect and return the authorization code.
    ///
    /// # Errors
    /// - [`AuthError::ProviderDenied`] if the provider reported an `error`
    /// - [`AuthError::MissingCode`] if `code` is absent or empty
    /// - [`AuthError::StateMismatch`] if `state` does not redeem a pending launch
    pub fn handle_callback(&self, params: &CallbackParams) -> Result<String, AuthError> {
        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            warn!("Provider returned error on callback: {}", error);
            return Err(AuthError::ProviderDenied {
                error: error.to_string(),
                description: params.error_description.clone(),
            });
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let state = params.state.as_deref().unwrap_or_default();
        if !self.launches.consume(state) {
            warn!("Callback state did not match a pending launch");
            return Err(AuthError::StateMismatch);
        }

        Ok(code.to_string())
    }

    /// Exchange an authorization code for a token at the token endpoint.
    ///
    /// # Errors
    /// - [`AuthError::TransportFailure`] if the request could not be sent or the body not read
    /// - [`AuthError::TokenExchangeFailed`] on a non-2xx status, a body that is not a JSON
    ///   object, or a body lacking `access_token` or `patient`
    pub async fn exchange_token(&self, code: &str) -> Result<TokenResult, AuthError> {
        let endpoint = self.config.token_endpoint();
        info!("Exchanging authorization code at {}", endpoint);

        let response = self
            .http
            .post(endpoint.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri()),
                ("client_id", self.config.client_id()),
            ])
            .send()
            .await
            .map_err(AuthError::TransportFailure)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(AuthError::TransportFailure)?;

        if !status.is_success() {
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let claims = serde_json::from_slice::<Map<String, Value>>(&body).map_err(|e| {
            AuthError::TokenExchangeFailed(format!("token response is not a JSON object: {e}"))
        })?;

        let token = TokenResult::from_claims(claims)?;
        info!("Token exchange succeeded for patient {}", token.patient_id);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{refused_base, test_config, FakeServer};
    use axum::{http::StatusCode, routing::post, Form, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn authorize_url_carries_all_parameters_in_order() {
        let cfg = test_config("http://auth.test/sim", "http://auth.test/sim/fhir");
        let request = AuthorizationRequest::new(&cfg, "xyz");
        let url = build_authorize_url(&cfg, &request);

        assert_eq!(url.path(), "/sim/auth/authorize");
        assert_eq!(
            query_map(&url),
            vec![
                ("response_type".into(), "code".into()),
                ("client_id".into(), "test-client".into()),
                ("redirect_uri".into(), "http://localhost:8000/callback".into()),
                ("scope".into(), "launch patient/*.read openid profile".into()),
                ("aud".into(), "http://auth.test/sim/fhir".into()),
                ("state".into(), "xyz".into()),
            ]
        );
    }

    #[test]
    fn begin_launch_records_state() {
        let cfg = Arc::new(test_config("http://auth.test", "http://auth.test/fhir"));
        let flow = OAuthFlow::new(cfg, reqwest::Client::new());

        let url = flow.begin_launch();
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state parameter");

        assert_eq!(flow.pending_launches().len(), 1);
        let code = flow
            .handle_callback(&CallbackParams::with_code("abc123", state.clone()))
            .expect("callback accepted");
        assert_eq!(code, "abc123");

        // replaying the same state fails
        let replay = flow.handle_callback(&CallbackParams::with_code("abc123", state));
        assert!(matches!(replay, Err(AuthError::StateMismatch)));
    }

    #[test]
    fn callback_without_code_is_missing_code() {
        let cfg = Arc::new(test_config("http://auth.test", "http://auth.test/fhir"));
        let flow = OAuthFlow::new(cfg, reqwest::Client::new());
        flow.begin_launch();

        let err = flow
            .handle_callback(&CallbackParams {
                state: Some("anything".into()),
                ..CallbackParams::default()
            })
            .expect_err("should fail");
        assert!(matches!(err, AuthError::MissingCode));

        let empty = flow.handle_callback(&CallbackParams::with_code("", "anything"));
        assert!(matches!(empty, Err(AuthError::MissingCode)));
        // state is untouched by a callback that fails before validation
        assert_eq!(flow.pending_launches().len(), 1);
    }

    #[test]
    fn callback_with_provider_error_is_denied() {
        let cfg = Arc::new(test_config("http://auth.test", "http://auth.test/fhir"));
        let flow = OAuthFlow::new(cfg, reqwest::Client::new());
        let err = flow
            .handle_callback(&CallbackParams {
                error: Some("access_denied".into()),
                error_description: Some("User declined".into()),
                ..CallbackParams::default()
            })
            .expect_err("should fail");
        match err {
            AuthError::ProviderDenied { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("User declined"));
            }
            other => panic!("expected ProviderDenied, got {other:?}"),
        }
    }

    #[test]
    fn unknown_state_is_rejected() {
        let cfg = Arc::new(test_config("http://auth.test", "http://auth.test/fhir"));
        let flow = OAuthFlow::new(cfg, reqwest::Client::new());
        let err = flow
            .handle_callback(&CallbackParams::with_code("abc123", "forged"))
            .expect_err("should fail");
        assert!(matches!(err, AuthError::StateMismatch));
    }

    #[test]
    fn token_result_requires_both_fields() {
        let claims = |v: Value| v.as_object().cloned().expect("object");

        let ok = TokenResult::from_claims(claims(json!({
            "access_token": "tok", "patient": "123", "token_type": "bearer"
        })))
        .expect("usable token");
        assert_eq!(ok.access_token, "tok");
        assert_eq!(ok.patient_id, "123");
        assert_eq!(ok.raw_claims["token_type"], "bearer");
        assert!(!format!("{ok:?}").contains("\"tok\""));

        for body in [
            json!({"access_token": "tok"}),
            json!({"patient": "123"}),
            json!({"access_token": "", "patient": "123"}),
            json!({"access_token": "tok", "patient": 123}),
        ] {
            let err = TokenResult::from_claims(claims(body)).expect_err("unusable token");
            assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
        }
    }

    fn token_router(status: StatusCode, body: Value) -> Router {
        Router::new().route(
            "/auth/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let body = body.clone();
                async move {
                    assert_eq!(form["grant_type"], "authorization_code");
                    assert_eq!(form["code"], "abc123");
                    assert_eq!(form["redirect_uri"], "http://localhost:8000/callback");
                    assert_eq!(form["client_id"], "test-client");
                    (status, Json(body))
                }
            }),
        )
    }

    async fn flow_against(server: &FakeServer) -> OAuthFlow {
        let cfg = Arc::new(test_config(&server.base, &format!("{}/fhir", server.base)));
        let http = cfg.build_http_client().expect("client");
        OAuthFlow::new(cfg, http)
    }

    #[tokio::test]
    async fn exchange_returns_token_and_patient() {
        let server = FakeServer::spawn(token_router(
            StatusCode::OK,
            json!({"access_token": "tok", "patient": "123", "scope": "launch"}),
        ))
        .await;
        let flow = flow_against(&server).await;

        let token = flow.exchange_token("abc123").await.expect("exchange");
        assert_eq!(token.access_token, "tok");
        assert_eq!(token.patient_id, "123");
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn exchange_without_patient_fails_regardless_of_status() {
        for status in [StatusCode::OK, StatusCode::BAD_REQUEST] {
            let server =
                FakeServer::spawn(token_router(status, json!({"access_token": "tok"}))).await;
            let flow = flow_against(&server).await;

            let err = flow.exchange_token("abc123").await.expect_err("should fail");
            assert!(matches!(err, AuthError::TokenExchangeFailed(_)), "{err:?}");
            assert_eq!(server.hits(), 1, "no retry of the exchange");
        }
    }

    #[tokio::test]
    async fn exchange_with_error_status_fails_even_with_fields() {
        let server = FakeServer::spawn(token_router(
            StatusCode::UNAUTHORIZED,
            json!({"access_token": "tok", "patient": "123"}),
        ))
        .await;
        let flow = flow_against(&server).await;
        let err = flow.exchange_token("abc123").await.expect_err("should fail");
        assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
    }

    #[tokio::test]
    async fn exchange_with_malformed_json_fails() {
        let router = Router::new().route("/auth/token", post(|| async { "<html>oops</html>" }));
        let server = FakeServer::spawn(router).await;
        let flow = flow_against(&server).await;
        let err = flow.exchange_token("abc123").await.expect_err("should fail");
        assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
    }

    #[tokio::test]
    async fn exchange_against_closed_port_is_transport_failure() {
        let base = refused_base().await;
        let cfg = Arc::new(test_config(&base, &format!("{base}/fhir")));
        let http = cfg.build_http_client().expect("client");
        let flow = OAuthFlow::new(cfg, http);

        let err = flow.exchange_token("abc123").await.expect_err("should fail");
        assert!(matches!(err, AuthError::TransportFailure(_)), "{err:?}");
    }
}
