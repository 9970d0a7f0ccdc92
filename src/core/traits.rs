use async_trait::async_trait;

use super::error::{Result, ScanError};
use super::result::{DetectorType, Finding};
use crate::utils::patterns;

/// The contract every provider detector implements.
///
/// `keywords` feeds the shared prefilter: a detector only runs its full regex
/// matching on chunks in which at least one of its keywords appears
/// (case-insensitively). Keyword presence is a filter, not an oracle:
/// `from_data` may still find zero matches on an admitted chunk.
///
/// The capability surface beyond the three required operations is expressed
/// as default methods: detectors opt in by overriding them.
#[async_trait]
pub trait Detector: Send + Sync {
    fn detector_type(&self) -> DetectorType;

    /// Lowercase substrings used for prefiltering. Must be non-empty;
    /// prefilter construction fails otherwise. Prefer identifiers that appear
    /// in the secret itself, falling back to the provider name.
    fn keywords(&self) -> &[&str];

    fn description(&self) -> &str;

    /// Find and optionally verify secrets in a chunk of bytes. Candidates are
    /// deduplicated within one call; verification failures are recorded on
    /// the finding, never returned as an error.
    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>>;

    /// Pattern revision. Multiple versions of the same provider may coexist
    /// in the registry and both run.
    fn version(&self) -> u32 {
        1
    }

    /// Upper bound on candidate length, for detectors whose pattern can
    /// otherwise swallow unbounded input (e.g. private keys).
    fn max_secret_size(&self) -> Option<usize> {
        None
    }

    /// Reject a candidate as a known false positive. The default checks a
    /// common-word list; detectors with structurally unambiguous patterns
    /// override this to skip the check.
    fn is_false_positive(&self, raw: &str) -> bool {
        patterns::is_common_false_positive(raw)
    }
}

/// Verification target selection for detectors that support self-hosted or
/// enterprise instances: configured endpoints replace the cloud default.
#[derive(Debug, Clone)]
pub struct Endpoints {
    cloud: &'static str,
    configured: Vec<String>,
}

impl Endpoints {
    pub fn new(cloud: &'static str) -> Self {
        Self {
            cloud,
            configured: Vec::new(),
        }
    }

    pub fn cloud_endpoint(&self) -> &str {
        self.cloud
    }

    pub fn set_configured(&mut self, urls: Vec<String>) -> Result<()> {
        for url in &urls {
            if url.trim().is_empty() {
                return Err(ScanError::Config("empty verification endpoint".into()));
            }
        }
        self.configured = urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_string())
            .collect();
        Ok(())
    }

    /// Base URLs to verify against: the configured set, or the cloud default
    /// when none are configured.
    pub fn all(&self) -> Vec<&str> {
        if self.configured.is_empty() {
            vec![self.cloud]
        } else {
            self.configured.iter().map(String::as_str).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_default_to_cloud() {
        let endpoints = Endpoints::new("https://api.github.com");
        assert_eq!(endpoints.all(), vec!["https://api.github.com"]);
    }

    #[test]
    fn test_endpoints_override() {
        let mut endpoints = Endpoints::new("https://gitlab.com");
        endpoints
            .set_configured(vec!["https://gitlab.example.com/".to_string()])
            .unwrap();
        assert_eq!(endpoints.all(), vec!["https://gitlab.example.com"]);
    }

    #[test]
    fn test_endpoints_reject_empty() {
        let mut endpoints = Endpoints::new("https://gitlab.com");
        assert!(endpoints.set_configured(vec!["  ".to_string()]).is_err());
    }
}
