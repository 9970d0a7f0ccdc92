use curl::easy::{Easy2, Handler, WriteError};
use std::time::Duration;

use crate::core::error::{Result, ScanError};

/// Collector for response data. Provider responses are untrusted input, so
/// the body is capped; bytes past the cap are dropped and the transfer
/// completes with a truncated body.
struct Collector(Vec<u8>);

const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

impl Handler for Collector {
    fn write(&mut self, data: &[u8]) -> std::result::Result<usize, WriteError> {
        let remaining = MAX_RESPONSE_SIZE.saturating_sub(self.0.len());
        let take = data.len().min(remaining);
        self.0.extend_from_slice(&data[..take]);
        Ok(data.len())
    }
}

/// Blocking HTTP transport used by the verification layer. Detectors depend
/// on this trait rather than a concrete client so tests can substitute a
/// stub.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
    fn post(&self, url: &str, headers: &[(String, String)], body: &str) -> Result<HttpResponse>;
}

/// HTTP client using libcurl
pub struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn prepare(&self, easy: &mut Easy2<Collector>, url: &str, headers: &[(String, String)]) -> Result<()> {
        easy.url(url)?;
        easy.timeout(self.timeout)?;
        easy.follow_location(true)?;
        easy.max_redirections(5)?;
        easy.ssl_verify_peer(true)?;
        easy.ssl_verify_host(true)?;

        let mut list = curl::easy::List::new();
        for (key, value) in headers {
            list.append(&format!("{}: {}", key, value))?;
        }
        easy.http_headers(list)?;
        Ok(())
    }
}

impl Transport for HttpClient {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut easy = Easy2::new(Collector(Vec::new()));
        self.prepare(&mut easy, url, headers)?;

        easy.perform()?;

        let response_code = easy.response_code()?;
        let body = easy.get_ref().0.clone();

        Ok(HttpResponse {
            status_code: response_code as u16,
            body,
        })
    }

    fn post(&self, url: &str, headers: &[(String, String)], body: &str) -> Result<HttpResponse> {
        let mut easy = Easy2::new(Collector(Vec::new()));
        self.prepare(&mut easy, url, headers)?;
        easy.post(true)?;
        easy.post_fields_copy(body.as_bytes())?;

        easy.perform()?;

        let response_code = easy.response_code()?;
        let body = easy.get_ref().0.clone();

        Ok(HttpResponse {
            status_code: response_code as u16,
            body,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| ScanError::Unknown(format!("Invalid UTF-8: {}", e)))
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new();
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_http_client_custom_timeout() {
        let client = HttpClient::with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_collector_caps_response_body() {
        let mut collector = Collector(Vec::new());
        let chunk = vec![b'a'; 1024 * 1024];
        for _ in 0..5 {
            // curl always sees the full write so the transfer is not aborted.
            assert_eq!(collector.write(&chunk).unwrap(), chunk.len());
        }
        assert_eq!(collector.0.len(), MAX_RESPONSE_SIZE);
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status_code: 200,
            body: br#"{"login":"octocat"}"#.to_vec(),
        };
        assert!(response.is_success());
        assert_eq!(response.text().unwrap(), r#"{"login":"octocat"}"#);

        let parsed: serde_json::Value = response.json().unwrap();
        assert_eq!(parsed["login"], "octocat");
    }
}
