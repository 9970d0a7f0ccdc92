use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use crate::core::error::Result;
use crate::core::result::{DetectorType, Finding, Verification};
use crate::core::traits::Detector;
use crate::utils::patterns::PatternUtils;
use crate::verify::Verifier;

/// Extract candidate strings from chunk text.
pub type MatchFn = Box<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Verify one candidate, returning the outcome and any provider metadata.
pub type VerifyFn = Box<
    dyn for<'a> Fn(
            &'a Verifier,
            &'a str,
        )
            -> Pin<Box<dyn Future<Output = (Verification, HashMap<String, String>)> + Send + 'a>>
        + Send
        + Sync,
>;

/// The shared match/verify state machine behind most providers.
///
/// A provider expressed through this type is configuration rather than code:
/// type + description + keywords + pattern, with the default match and
/// verify behavior substituted unless overridden. Per candidate the state
/// machine is `Found -> Skipped` when verification is off, otherwise
/// `Found -> Verifying -> {ConfirmedValid | ConfirmedInvalid | Error}`;
/// terminal states are immutable once assigned to a finding.
pub struct StandardDetector {
    detector_type: DetectorType,
    version: u32,
    description: String,
    keywords: Vec<&'static str>,
    pattern: Regex,
    min_entropy: f64,
    match_fn: Option<MatchFn>,
    verify_fn: Option<VerifyFn>,
    verifier: Arc<Verifier>,
}

impl StandardDetector {
    pub fn builder() -> StandardDetectorBuilder {
        StandardDetectorBuilder::default()
    }

    /// Default match behavior: every regex match reduced to its first
    /// non-empty capture group (or the whole match when the pattern has no
    /// groups), filtered by the entropy floor, deduplicated in first-seen
    /// order.
    fn default_matches(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for captures in self.pattern.captures_iter(text) {
            let m = if captures.len() > 1 {
                match first_non_empty_group(&captures) {
                    Some(m) => m,
                    None => continue,
                }
            } else {
                captures.get(0).map(|m| m.as_str()).unwrap_or_default()
            };

            if !PatternUtils::has_min_entropy(m, self.min_entropy) {
                continue;
            }
            if seen.insert(m.to_string()) {
                matches.push(m.to_string());
            }
        }
        matches
    }
}

/// The first non-empty capture group of a match, skipping the full-match
/// group at index 0.
fn first_non_empty_group<'t>(captures: &regex::Captures<'t>) -> Option<&'t str> {
    (1..captures.len())
        .filter_map(|i| captures.get(i))
        .map(|m| m.as_str())
        .find(|s| !s.is_empty())
}

#[async_trait]
impl Detector for StandardDetector {
    fn detector_type(&self) -> DetectorType {
        self.detector_type
    }

    fn keywords(&self) -> &[&str] {
        &self.keywords
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn version(&self) -> u32 {
        self.version
    }

    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>> {
        let text = String::from_utf8_lossy(data);

        let candidates = match &self.match_fn {
            Some(f) => f(&text),
            None => self.default_matches(&text),
        };

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.is_false_positive(&candidate) {
                continue;
            }

            let mut finding =
                Finding::new(self.detector_type, candidate.clone()).with_version(self.version);

            if verify {
                let (status, extra_data) = match &self.verify_fn {
                    Some(f) => f(&self.verifier, &candidate).await,
                    // No verification routine configured for this provider.
                    None => (Verification::Skipped, HashMap::new()),
                };
                if !matches!(status, Verification::Skipped) {
                    finding.verified_at = Some(Utc::now());
                }
                match status {
                    Verification::Error { error } => {
                        finding.set_verification_error(error, &candidate);
                    }
                    status => finding.verification = status,
                }
                finding.extra_data.extend(extra_data);
            }

            results.push(finding);
        }

        Ok(results)
    }
}

/// Declarative construction for [`StandardDetector`].
///
/// Missing type, description, keywords, or pattern is a configuration bug
/// caught at startup: `build` panics rather than producing a detector that
/// can never match.
#[derive(Default)]
pub struct StandardDetectorBuilder {
    detector_type: Option<DetectorType>,
    version: Option<u32>,
    description: Option<String>,
    keywords: Vec<&'static str>,
    pattern: Option<Regex>,
    min_entropy: Option<f64>,
    match_fn: Option<MatchFn>,
    verify_fn: Option<VerifyFn>,
}

impl StandardDetectorBuilder {
    pub fn detector_type(mut self, detector_type: DetectorType) -> Self {
        self.detector_type = Some(detector_type);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords(mut self, keywords: &[&'static str]) -> Self {
        self.keywords = keywords.to_vec();
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn min_entropy(mut self, min_entropy: f64) -> Self {
        self.min_entropy = Some(min_entropy);
        self
    }

    pub fn match_fn(mut self, match_fn: MatchFn) -> Self {
        self.match_fn = Some(match_fn);
        self
    }

    pub fn verify_fn(mut self, verify_fn: VerifyFn) -> Self {
        self.verify_fn = Some(verify_fn);
        self
    }

    pub fn build(self, verifier: Arc<Verifier>) -> StandardDetector {
        let detector_type = self.detector_type.expect("standard detector: no type");
        let description = self.description.expect("standard detector: no description");
        if self.keywords.is_empty() {
            panic!("standard detector: no keywords");
        }
        let pattern = self.pattern.expect("standard detector: no pattern");

        StandardDetector {
            detector_type,
            version: self.version.unwrap_or(1),
            description,
            keywords: self.keywords,
            pattern,
            min_entropy: self.min_entropy.unwrap_or(3.0),
            match_fn: self.match_fn,
            verify_fn: self.verify_fn,
            verifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::MockTransport;

    fn test_verifier() -> Arc<Verifier> {
        Arc::new(Verifier::new(Arc::new(MockTransport::new())))
    }

    fn uuid_detector() -> StandardDetector {
        StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .description("test uuid keys")
            .keywords(&["privacy"])
            .pattern(
                Regex::new(r"\b([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})\b")
                    .unwrap(),
            )
            .build(test_verifier())
    }

    #[tokio::test]
    async fn test_default_match_dedups_within_call() {
        let detector = uuid_detector();
        let data = b"k1=9e53f095-6eb2-4d8c-bfba-8de12a704c7b k2=9e53f095-6eb2-4d8c-bfba-8de12a704c7b";

        let results = detector.from_data(false, data).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].raw, "9e53f095-6eb2-4d8c-bfba-8de12a704c7b");
        assert_eq!(results[0].verification, Verification::Skipped);
    }

    #[tokio::test]
    async fn test_determinism_across_calls() {
        let detector = uuid_detector();
        let data = b"a=9e53f095-6eb2-4d8c-bfba-8de12a704c7b b=04b9c052-7ea2-4e5b-90dc-19b34d2a6711";

        let first = detector.from_data(false, data).await.unwrap();
        let second = detector.from_data(false, data).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.len(), second.len());
        let raws = |r: &[Finding]| r.iter().map(|f| f.raw.clone()).collect::<Vec<_>>();
        assert_eq!(raws(&first), raws(&second));
    }

    #[tokio::test]
    async fn test_entropy_floor_rejects_low_entropy() {
        let detector = StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .description("high entropy tokens")
            .keywords(&["tok"])
            .pattern(Regex::new(r"\b(tok[a-z0-9]{29})\b").unwrap())
            .min_entropy(4.0)
            .build(test_verifier());

        // Structurally matching but low entropy.
        let results = detector
            .from_data(false, b"key=tokaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
            .await
            .unwrap();
        assert!(results.is_empty());

        let results = detector
            .from_data(false, b"key=tokr8fq2zm1xk5vj3wp9ds6ub4hy7cn0")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_custom_verify_fn_runs_when_requested() {
        let detector = StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .description("test uuid keys")
            .keywords(&["privacy"])
            .pattern(
                Regex::new(r"\b([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})\b")
                    .unwrap(),
            )
            .verify_fn(Box::new(|_verifier, _token| {
                Box::pin(async {
                    let mut extra = HashMap::new();
                    extra.insert("account".to_string(), "test".to_string());
                    (Verification::ConfirmedValid, extra)
                })
            }))
            .build(test_verifier());

        let data = b"id=9e53f095-6eb2-4d8c-bfba-8de12a704c7b";

        let skipped = detector.from_data(false, data).await.unwrap();
        assert_eq!(skipped[0].verification, Verification::Skipped);

        let verified = detector.from_data(true, data).await.unwrap();
        assert!(verified[0].is_verified());
        assert_eq!(verified[0].extra_data["account"], "test");
        assert!(verified[0].verified_at.is_some());
    }

    #[test]
    #[should_panic(expected = "no description")]
    fn test_builder_requires_description() {
        StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .keywords(&["privacy"])
            .pattern(Regex::new(r"x").unwrap())
            .build(test_verifier());
    }

    #[test]
    #[should_panic(expected = "no keywords")]
    fn test_builder_requires_keywords() {
        StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .description("d")
            .pattern(Regex::new(r"x").unwrap())
            .build(test_verifier());
    }

    #[test]
    #[should_panic(expected = "no pattern")]
    fn test_builder_requires_pattern() {
        StandardDetector::builder()
            .detector_type(DetectorType::Privacy)
            .description("d")
            .keywords(&["privacy"])
            .build(test_verifier());
    }
}
