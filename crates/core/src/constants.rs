//! Constants used throughout the summary core crate.
//!
//! Defaults point at the public SMART launcher sandbox so a fresh checkout runs without any
//! configuration.

use std::time::Duration;

/// Default authorization server base (the sandbox launcher; no `/fhir` suffix).
pub const DEFAULT_AUTH_BASE: &str = "https://launch.smarthealthit.org/v/r4/sim/eyJhIjoiMSJ9";

/// Path segment appended to the authorization base to derive the default FHIR base.
pub const FHIR_PATH_SUFFIX: &str = "fhir";

/// Default public client identifier accepted by the sandbox.
pub const DEFAULT_CLIENT_ID: &str = "my-smart-app";

/// Default redirect URI registered for the callback endpoint.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/callback";

/// Default scopes, in the order the server expects them.
pub const DEFAULT_SCOPES: &[&str] = &["launch", "patient/*.read", "openid", "profile"];

/// Upper bound for every outbound HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resource GETs are attempted once unless configured otherwise.
pub const DEFAULT_FETCH_RETRIES: u32 = 0;

/// Path of the authorization endpoint relative to the authorization base.
pub const AUTHORIZE_PATH: &str = "auth/authorize";

/// Path of the token endpoint relative to the authorization base.
pub const TOKEN_PATH: &str = "auth/token";

/// How long a launch `state` stays redeemable.
pub const LAUNCH_STATE_TTL: Duration = Duration::from_secs(600);

/// Most launches held awaiting a callback. At the cap the oldest pending launch is evicted.
pub const MAX_PENDING_LAUNCHES: usize = 10_000;

/// Number of random bytes in a launch `state` before base64url encoding.
pub const LAUNCH_STATE_BYTES: usize = 16;

/// Initial backoff before re-issuing a failed resource GET.
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Cap on the backoff between resource GET attempts.
pub const MAX_BACKOFF_MS: u64 = 5_000;

/// Media type requested from FHIR servers.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Default OpenAI-compatible endpoint for the prose summary.
pub const DEFAULT_GENERATOR_BASE: &str = "https://api.openai.com";

/// Default chat model for the prose summary.
pub const DEFAULT_GENERATOR_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature for the prose summary.
pub const GENERATOR_TEMPERATURE: f32 = 0.2;

/// Generation can take far longer than a FHIR read.
pub const GENERATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bind address of the browser-facing server.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
