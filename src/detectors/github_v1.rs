use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::core::error::Result;
use crate::core::result::{DetectorType, Finding, Verification};
use crate::core::traits::{Detector, Endpoints};
use crate::utils::patterns::PatternUtils;
use crate::verify::Verifier;

lazy_static! {
    // Legacy 40-hex tokens carry no distinguishing prefix, so the pattern
    // requires nearby context naming the provider.
    static ref KEY_PAT: Regex = Regex::new(
        r#"(?:(?i:github|token)|(?-i:GH|gh|HUB|[Hh]ub|PAT|[Pp]at|OCTO|[Oo]cto))[^\.].{0,40}[ =:'"]+([a-f0-9]{40})\b"#
    )
    .unwrap();
}

const CLOUD_ENDPOINT: &str = "https://api.github.com";

/// Detects legacy 40-hex GitHub personal access tokens.
pub struct GithubV1 {
    verifier: Arc<Verifier>,
    endpoints: Endpoints,
}

impl GithubV1 {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self {
            verifier,
            endpoints: Endpoints::new(CLOUD_ENDPOINT),
        }
    }

    /// Point verification at enterprise instances instead of the cloud API.
    pub fn with_endpoints(mut self, urls: Vec<String>) -> Result<Self> {
        self.endpoints.set_configured(urls)?;
        Ok(self)
    }
}

#[async_trait]
impl Detector for GithubV1 {
    fn detector_type(&self) -> DetectorType {
        DetectorType::Github
    }

    fn keywords(&self) -> &[&str] {
        &["github", "gh", "hub", "pat", "token", "octo"]
    }

    fn description(&self) -> &str {
        "GitHub personal access tokens grant API access to repositories, \
         issues, and account resources on behalf of a user."
    }

    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>> {
        let text = String::from_utf8_lossy(data);

        let mut tokens = BTreeSet::new();
        for captures in KEY_PAT.captures_iter(&text) {
            let Some(token) = captures.get(1) else {
                continue;
            };
            // Commit hashes in raw.githubusercontent.com URLs satisfy the
            // context pattern but are never credentials.
            let context = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
            if context.contains("githubusercontent") {
                continue;
            }
            if !PatternUtils::has_min_entropy(token.as_str(), 3.0) {
                continue;
            }
            tokens.insert(token.as_str().to_string());
        }

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            let mut finding = Finding::new(DetectorType::Github, token.clone());

            if verify {
                let (status, extra_data) =
                    verify_token(&self.verifier, &self.endpoints, &token).await;
                finding.verified_at = Some(Utc::now());
                match status {
                    Verification::Error { error } => finding.set_verification_error(error, &token),
                    status => finding.verification = status,
                }
                finding.extra_data.extend(extra_data);
            }

            results.push(finding);
        }

        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    id: i64,
    #[serde(rename = "type")]
    user_type: Option<String>,
}

/// Verify a token of any generation against `{endpoint}/user`.
///
/// A 403 is ambiguous and resolved by body: a rate-limit message means the
/// attempt is inconclusive, anything else means the token authenticated but
/// lacks the scope for this endpoint, which still proves it live.
pub(super) async fn verify_token(
    verifier: &Verifier,
    endpoints: &Endpoints,
    token: &str,
) -> (Verification, HashMap<String, String>) {
    let mut last_error = None;

    for base in endpoints.all() {
        let headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", token)),
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("User-Agent".to_string(), "secret-hound".to_string()),
        ];

        let response = match verifier.get(token, &format!("{}/user", base), headers).await {
            Ok(response) => response,
            Err(e) => {
                // Try the next configured endpoint before giving up.
                last_error = Some(e.to_string());
                continue;
            }
        };

        match response.status_code {
            200 => {
                let mut extra_data = HashMap::new();
                if let Ok(user) = response.json::<GithubUser>() {
                    extra_data.insert("username".to_string(), user.login);
                    extra_data.insert("user_id".to_string(), user.id.to_string());
                    if let Some(user_type) = user.user_type {
                        extra_data.insert("account_type".to_string(), user_type);
                    }
                }
                return (Verification::ConfirmedValid, extra_data);
            }
            401 => return (Verification::ConfirmedInvalid, HashMap::new()),
            403 => {
                let body = response.text().unwrap_or_default();
                if body.to_lowercase().contains("rate limit") {
                    return (
                        Verification::Error {
                            error: "rate limited by provider".to_string(),
                        },
                        HashMap::new(),
                    );
                }
                // Authenticated but under-privileged for /user.
                let mut extra_data = HashMap::new();
                extra_data.insert(
                    "permission_note".to_string(),
                    "token authenticated but lacks scope for the user endpoint".to_string(),
                );
                return (Verification::ConfirmedValid, extra_data);
            }
            status => {
                return (
                    Verification::Error {
                        error: format!("unexpected HTTP response status {}", status),
                    },
                    HashMap::new(),
                )
            }
        }
    }

    (
        Verification::Error {
            error: last_error.unwrap_or_else(|| "no verification endpoint reachable".to_string()),
        },
        HashMap::new(),
    )
}
