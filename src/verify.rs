//! Shared verification support: transport dispatch, per-credential locking,
//! pacing, and deadlines.
//!
//! One `Verifier` is constructed eagerly at registry setup and handed by
//! `Arc` to every detector that supports live verification; there is no
//! lazily-initialized global state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tokio::time::timeout;

use crate::core::config::EngineConfig;
use crate::core::error::{Result, ScanError};
use crate::utils::http::{HttpClient, HttpResponse, Transport};
use crate::utils::keyed_lock::KeyedLock;
use crate::utils::rate_limiter::RateLimiter;

pub struct Verifier {
    transport: Arc<dyn Transport>,
    locks: KeyedLock,
    limiter: Option<RateLimiter>,
    deadline: Duration,
}

impl Verifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            locks: KeyedLock::new(),
            limiter: None,
            deadline: Duration::from_secs(30),
        }
    }

    /// Build a curl-backed verifier from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        let deadline = Duration::from_millis(config.verify_timeout_ms);
        let mut verifier = Self::new(Arc::new(HttpClient::with_timeout(deadline)));
        verifier.deadline = deadline;
        verifier.limiter = config.verify_requests_per_second.map(RateLimiter::new);
        verifier
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = Some(RateLimiter::new(requests_per_second));
        self
    }

    /// GET against a provider endpoint, serialized per `credential`.
    pub async fn get(
        &self,
        credential: &str,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<HttpResponse> {
        let transport = self.transport.clone();
        let owned_url = url.to_string();
        self.dispatch(credential, url, move || transport.get(&owned_url, &headers))
            .await
    }

    /// POST against a provider endpoint, serialized per `credential`.
    pub async fn post(
        &self,
        credential: &str,
        url: &str,
        headers: Vec<(String, String)>,
        body: String,
    ) -> Result<HttpResponse> {
        let transport = self.transport.clone();
        let owned_url = url.to_string();
        self.dispatch(credential, url, move || {
            transport.post(&owned_url, &headers, &body)
        })
        .await
    }

    /// Run one blocking transport call under the credential lock, paced and
    /// bounded by the configured deadline. Expiry yields a `Timeout` error,
    /// never an indefinite block.
    async fn dispatch<F>(&self, credential: &str, url: &str, call: F) -> Result<HttpResponse>
    where
        F: FnOnce() -> Result<HttpResponse> + Send + 'static,
    {
        let _guard = self.locks.acquire(credential).await;

        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }

        match timeout(self.deadline, task::spawn_blocking(call)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ScanError::Unknown(format!("Task join error: {}", e))),
            Err(_) => Err(ScanError::Timeout(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::MockTransport;

    fn response(status_code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status_code,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_get_passes_through_response() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_, _| Ok(response(200, "{}")));

        let verifier = Verifier::new(Arc::new(transport));
        let res = verifier
            .get("token", "https://api.example.com/user", Vec::new())
            .await
            .unwrap();
        assert_eq!(res.status_code, 200);
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout_error() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|_, _| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(response(200, "{}"))
        });

        let verifier =
            Verifier::new(Arc::new(transport)).with_deadline(Duration::from_millis(20));
        let err = verifier
            .get("token", "https://api.example.com/user", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_, _| Err(ScanError::Http("connection refused".into())));

        let verifier = Verifier::new(Arc::new(transport));
        let err = verifier
            .get("token", "https://api.example.com/user", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Http(_)));
    }
}
