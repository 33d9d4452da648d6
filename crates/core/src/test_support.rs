//! In-process fake authorization/FHIR server for tests.

use crate::config::ClientConfig;
use axum::{extract::Request, middleware::Next, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A router served on an ephemeral localhost port that counts every request it receives.
pub(crate) struct FakeServer {
    pub base: String,
    hits: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeServer {
    pub async fn spawn(router: Router) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = router.layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(req).await
                }
            },
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve fake server");
        });

        Self {
            base: format!("http://{addr}"),
            hits,
            handle,
        }
    }

    /// Number of requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A base URL nothing is listening on.
pub(crate) async fn refused_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Configuration pointing at the given bases with a short timeout.
pub(crate) fn test_config(auth_base: &str, fhir_base: &str) -> ClientConfig {
    test_config_with(auth_base, fhir_base, Duration::from_secs(2), 0)
}

pub(crate) fn test_config_with(
    auth_base: &str,
    fhir_base: &str,
    request_timeout: Duration,
    fetch_retries: u32,
) -> ClientConfig {
    ClientConfig::new(
        auth_base,
        fhir_base,
        "test-client",
        "http://localhost:8000/callback",
        crate::constants::DEFAULT_SCOPES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        request_timeout,
        fetch_retries,
    )
    .expect("valid test config")
}
