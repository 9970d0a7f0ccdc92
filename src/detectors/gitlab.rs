use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::core::error::Result;
use crate::core::result::{DetectorType, Finding, Verification};
use crate::core::traits::{Detector, Endpoints};
use crate::utils::patterns::{prefix_regex, PatternUtils};
use crate::verify::Verifier;

lazy_static! {
    static ref KEY_PAT: Regex = Regex::new(&format!(
        r"{}\b([a-zA-Z0-9][a-zA-Z0-9\-=_]{{19,21}})\b",
        prefix_regex(&["gitlab"])
    ))
    .unwrap();
}

const CLOUD_ENDPOINT: &str = "https://gitlab.com";

/// Message GitLab returns for tokens belonging to suspended accounts. The
/// credential itself is live, so this still counts as verified.
const BLOCKED_USER_MESSAGE: &str = "403 Forbidden - Your account has been blocked";

pub struct Gitlab {
    verifier: Arc<Verifier>,
    endpoints: Endpoints,
}

impl Gitlab {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self {
            verifier,
            endpoints: Endpoints::new(CLOUD_ENDPOINT),
        }
    }

    pub fn with_endpoints(mut self, urls: Vec<String>) -> Result<Self> {
        self.endpoints.set_configured(urls)?;
        Ok(self)
    }

    async fn verify_token(&self, finding: &mut Finding, token: &str) {
        finding.verified_at = Some(Utc::now());

        let mut last_error = None;
        for base in self.endpoints.all() {
            let url = format!("{}/api/v4/user", base);
            let headers = vec![("Authorization".to_string(), format!("Bearer {}", token))];

            let response = match self.verifier.get(token, &url, headers).await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            finding
                .analysis_info
                .insert("host".to_string(), base.to_string());

            match response.status_code {
                200 => {
                    // A proxy or captive portal can answer 200 with HTML;
                    // only a JSON body is the real API agreeing.
                    if serde_json::from_slice::<serde_json::Value>(&response.body).is_ok() {
                        finding.verification = Verification::ConfirmedValid;
                        finding
                            .analysis_info
                            .insert("key".to_string(), token.to_string());
                    } else {
                        finding.verification = Verification::ConfirmedInvalid;
                    }
                    return;
                }
                401 => {
                    finding.verification = Verification::ConfirmedInvalid;
                    return;
                }
                403 => {
                    if response.text().unwrap_or_default().contains(BLOCKED_USER_MESSAGE) {
                        finding
                            .extra_data
                            .insert("blocked".to_string(), "True".to_string());
                    }
                    // Authenticated, whether blocked or merely under-scoped.
                    finding.verification = Verification::ConfirmedValid;
                    finding
                        .analysis_info
                        .insert("key".to_string(), token.to_string());
                    return;
                }
                status => {
                    finding.set_verification_error(
                        format!("unexpected HTTP response status {}", status),
                        token,
                    );
                    return;
                }
            }
        }

        finding.set_verification_error(
            last_error.unwrap_or_else(|| "no verification endpoint reachable".to_string()),
            token,
        );
    }
}

#[async_trait]
impl Detector for Gitlab {
    fn detector_type(&self) -> DetectorType {
        DetectorType::Gitlab
    }

    fn keywords(&self) -> &[&str] {
        &["gitlab"]
    }

    fn description(&self) -> &str {
        "GitLab personal access tokens authenticate against the GitLab API \
         for repository, CI, and account operations."
    }

    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>> {
        let text = String::from_utf8_lossy(data);

        let mut tokens = BTreeSet::new();
        for captures in KEY_PAT.captures_iter(&text) {
            let Some(token) = captures.get(1) else {
                continue;
            };
            // glpat- prefixed tokens are a different generation with their
            // own issuance format; this pattern would only mangle them.
            let context = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
            if context.contains("glpat-") {
                continue;
            }
            if !PatternUtils::has_min_entropy(token.as_str(), 3.75) {
                continue;
            }
            tokens.insert(token.as_str().to_string());
        }

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            let mut finding = Finding::new(DetectorType::Gitlab, token.clone());
            if verify {
                self.verify_token(&mut finding, &token).await;
            }
            results.push(finding);
        }

        Ok(results)
    }
}
