/// Configuration could not be resolved at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidInput(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Failures of the authorization leg. Always fatal to the request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization code")]
    MissingCode,
    #[error("authorization state does not match a pending launch")]
    StateMismatch,
    #[error("authorization denied by provider: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),
    #[error("transport failure during token exchange: {0}")]
    TransportFailure(#[source] reqwest::Error),
}

/// Failures of a single FHIR read or search.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("connection to {url} refused")]
    ConnectionRefused { url: String },
    #[error("server returned HTTP {status_code} for {url}")]
    ServerError { status_code: u16, url: String },
    #[error("invalid response body from {url}: {reason}")]
    InvalidBody { url: String, reason: String },
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Classify a reqwest failure for `url`.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout { url }
        } else if err.is_connect() {
            FetchError::ConnectionRefused { url }
        } else {
            FetchError::Transport { url, source: err }
        }
    }

    /// Whether re-issuing the same GET could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout { .. } | FetchError::ConnectionRefused { .. }
        )
    }
}

/// Terminal failures of the aggregation pipeline.
///
/// Clinical-data fetch failures never appear here; they degrade to empty lists.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("patient lookup failed: {0}")]
    PatientFetch(#[source] FetchError),
    #[error("patient {patient_id} was not returned by the server")]
    PatientMissing { patient_id: String },
}

impl PipelineError {
    /// Short message suitable for an end-user error page.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Auth(AuthError::MissingCode) => "Missing auth code".into(),
            PipelineError::Auth(AuthError::StateMismatch) => {
                "Launch state did not match; please launch the app again".into()
            }
            PipelineError::Auth(AuthError::ProviderDenied { error, description }) => {
                match description {
                    Some(d) => format!("Authorization denied: {error} ({d})"),
                    None => format!("Authorization denied: {error}"),
                }
            }
            PipelineError::Auth(AuthError::TokenExchangeFailed(_)) => {
                "Token exchange failed".into()
            }
            PipelineError::Auth(AuthError::TransportFailure(_)) => {
                "Could not reach the authorization server".into()
            }
            PipelineError::PatientFetch(_) => "Could not retrieve the patient record".into(),
            PipelineError::PatientMissing { .. } => "Patient record not found".into(),
        }
    }

    /// `true` when the failure came from the browser-supplied callback rather than upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Auth(
                AuthError::MissingCode | AuthError::StateMismatch | AuthError::ProviderDenied { .. }
            )
        )
    }
}

/// Failures of the prose-summary collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse generator response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
    #[error("generator returned no choices")]
    EmptyResponse,
}
