//! Provider detectors and the registry that assembles them.
//!
//! Bespoke detectors (multi-step matching or verification) get their own
//! module; single-pattern providers are declared through the builder in
//! [`standard`].

pub mod dockerhub;
pub mod elasticcloud;
pub mod github_v1;
pub mod github_v2;
pub mod gitlab;
pub mod new_relic;
pub mod pem;
pub mod privacy;
pub mod private_key;
pub mod standard;

pub use dockerhub::Dockerhub;
pub use elasticcloud::ElasticCloud;
pub use github_v1::GithubV1;
pub use github_v2::GithubV2;
pub use gitlab::Gitlab;
pub use private_key::PrivateKey;
pub use standard::{StandardDetector, StandardDetectorBuilder};

use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::traits::Detector;
use crate::verify::Verifier;

/// Assemble the full detector registry, honoring per-detector enablement and
/// endpoint overrides. Both GitHub pattern generations register and run
/// side by side.
pub fn all_detectors(
    verifier: Arc<Verifier>,
    config: &EngineConfig,
) -> Result<Vec<Arc<dyn Detector>>> {
    let mut detectors: Vec<Arc<dyn Detector>> = Vec::new();

    if config.is_enabled("github") {
        let endpoints = config.detector("github").endpoints;
        let mut v1 = GithubV1::new(verifier.clone());
        let mut v2 = GithubV2::new(verifier.clone());
        if let Some(urls) = endpoints {
            v1 = v1.with_endpoints(urls.clone())?;
            v2 = v2.with_endpoints(urls)?;
        }
        detectors.push(Arc::new(v1));
        detectors.push(Arc::new(v2));
    }

    if config.is_enabled("gitlab") {
        let mut detector = Gitlab::new(verifier.clone());
        if let Some(urls) = config.detector("gitlab").endpoints {
            detector = detector.with_endpoints(urls)?;
        }
        detectors.push(Arc::new(detector));
    }

    if config.is_enabled("elastic_cloud") {
        detectors.push(Arc::new(ElasticCloud::new(verifier.clone())));
    }

    if config.is_enabled("dockerhub") {
        detectors.push(Arc::new(Dockerhub::new(verifier.clone())));
    }

    if config.is_enabled("new_relic") {
        detectors.push(Arc::new(new_relic::new_relic(verifier.clone())));
    }

    if config.is_enabled("privacy") {
        detectors.push(Arc::new(privacy::privacy(verifier.clone())));
    }

    if config.is_enabled("private_key") {
        detectors.push(Arc::new(PrivateKey::new(verifier)));
    }

    Ok(detectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::MockTransport;

    fn registry(config: &EngineConfig) -> Vec<Arc<dyn Detector>> {
        let verifier = Arc::new(Verifier::new(Arc::new(MockTransport::new())));
        all_detectors(verifier, config).unwrap()
    }

    #[test]
    fn test_default_registry_is_complete() {
        let detectors = registry(&EngineConfig::default());
        // Both github generations plus the six other providers.
        assert_eq!(detectors.len(), 8);
        assert!(detectors.iter().all(|d| !d.keywords().is_empty()));
        assert!(detectors.iter().all(|d| !d.description().is_empty()));
    }

    #[test]
    fn test_disabled_detector_excluded() {
        let mut config = EngineConfig::default();
        config.detectors.insert(
            "github".to_string(),
            crate::core::config::DetectorConfig {
                enabled: false,
                endpoints: None,
            },
        );

        let detectors = registry(&config);
        assert_eq!(detectors.len(), 6);
        assert!(detectors
            .iter()
            .all(|d| d.detector_type() != crate::core::result::DetectorType::Github));
    }

    #[test]
    fn test_github_versions_coexist() {
        let detectors = registry(&EngineConfig::default());
        let github_versions: Vec<u32> = detectors
            .iter()
            .filter(|d| d.detector_type() == crate::core::result::DetectorType::Github)
            .map(|d| d.version())
            .collect();
        assert_eq!(github_versions, vec![1, 2]);
    }
}
