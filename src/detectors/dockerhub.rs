use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::core::error::Result;
use crate::core::result::{DetectorType, Finding, Verification};
use crate::core::traits::Detector;
use crate::utils::patterns::PatternUtils;
use crate::verify::Verifier;

lazy_static! {
    static ref ACCESS_TOKEN_PAT: Regex = Regex::new(
        r"\b(dckr_pat_[a-zA-Z0-9_-]{27}|dckr_oat_[a-zA-Z0-9_-]{32})(?:[^a-zA-Z0-9_-]|\z)"
    )
    .unwrap();
    static ref USERNAME_PAT: Regex =
        Regex::new(r#"(?im)(?:user|usr|-u|id)\S{0,40}?[:=\s]{1,3}[ '"=]?([a-zA-Z0-9]{4,40})\b"#)
            .unwrap();
    static ref EMAIL_PAT: Regex =
        Regex::new(r"\b([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b").unwrap();
}

const AUTH_URL: &str = "https://hub.docker.com/v2/auth/token";

/// Docker Hub accepts a token paired with any account identifier, so a chunk
/// with no recognizable username is still worth one attempt.
const UNKNOWN_USERNAME: &str = "false";

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AuthFailure {
    #[serde(default)]
    detail: String,
    #[serde(default)]
    login_2fa_token: String,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    #[serde(default)]
    scope: String,
    #[serde(rename = "https://hub.docker.com", default)]
    hub: HubClaims,
}

#[derive(Debug, Default, Deserialize)]
struct HubClaims {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
}

/// Detects Docker Hub personal and organization access tokens, pairing each
/// with nearby account identifiers for verification.
pub struct Dockerhub {
    verifier: Arc<Verifier>,
}

impl Dockerhub {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self { verifier }
    }

    async fn verify_pair(&self, finding: &mut Finding, username: &str, token: &str) {
        finding.verified_at = Some(Utc::now());

        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        let body = json!({ "identifier": username, "secret": token }).to_string();

        let response = match self.verifier.post(token, AUTH_URL, headers, body).await {
            Ok(response) => response,
            Err(e) => {
                finding.set_verification_error(e.to_string(), token);
                return;
            }
        };

        match response.status_code {
            200 => {
                finding.verification = Verification::ConfirmedValid;
                if let Ok(auth) = response.json::<AuthResponse>() {
                    let jwt = if auth.token.is_empty() {
                        auth.access_token
                    } else {
                        auth.token
                    };
                    if let Some(claims) = decode_claims(&jwt) {
                        finding
                            .extra_data
                            .insert("hub_username".to_string(), claims.hub.username);
                        finding
                            .extra_data
                            .insert("hub_email".to_string(), claims.hub.email);
                        finding
                            .extra_data
                            .insert("hub_scope".to_string(), claims.scope);
                    }
                }
            }
            401 => {
                // Two-factor challenges only happen for live credentials.
                let failure = response.json::<AuthFailure>().unwrap_or(AuthFailure {
                    detail: String::new(),
                    login_2fa_token: String::new(),
                });
                if !failure.login_2fa_token.is_empty() {
                    finding.verification = Verification::ConfirmedValid;
                    finding
                        .extra_data
                        .insert("2fa_required".to_string(), "true".to_string());
                    if username != UNKNOWN_USERNAME {
                        finding
                            .extra_data
                            .insert("hub_username".to_string(), username.to_string());
                    }
                } else {
                    finding.verification = Verification::ConfirmedInvalid;
                    if !failure.detail.is_empty() {
                        finding
                            .extra_data
                            .insert("detail".to_string(), failure.detail);
                    }
                }
            }
            status => finding.set_verification_error(
                format!("unexpected HTTP response status {}", status),
                token,
            ),
        }
    }
}

/// Claims from the payload segment of a hub-issued JWT. Signature checking
/// is the provider's job; only the 200 status proves validity here.
fn decode_claims(jwt: &str) -> Option<JwtClaims> {
    let payload = jwt.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&decoded).ok()
}

#[async_trait]
impl Detector for Dockerhub {
    fn detector_type(&self) -> DetectorType {
        DetectorType::Dockerhub
    }

    fn keywords(&self) -> &[&str] {
        &["dckr_pat_", "dckr_oat_"]
    }

    fn description(&self) -> &str {
        "Docker Hub access tokens authenticate registry pulls, pushes, and \
         Hub API operations for a user or organization."
    }

    fn version(&self) -> u32 {
        2
    }

    fn is_false_positive(&self, _raw: &str) -> bool {
        false
    }

    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>> {
        let text = String::from_utf8_lossy(data);

        let mut tokens = Vec::new();
        for captures in ACCESS_TOKEN_PAT.captures_iter(&text) {
            let Some(token) = captures.get(1) else {
                continue;
            };
            let token = token.as_str().to_string();
            if !PatternUtils::has_min_entropy(&token, 4.0) {
                continue;
            }
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut usernames = Vec::new();
        for captures in USERNAME_PAT
            .captures_iter(&text)
            .chain(EMAIL_PAT.captures_iter(&text))
        {
            let Some(username) = captures.get(1) else {
                continue;
            };
            let username = username.as_str().to_string();
            if !usernames.contains(&username) {
                usernames.push(username);
            }
        }
        if usernames.is_empty() {
            usernames.push(UNKNOWN_USERNAME.to_string());
        }

        let mut results = Vec::new();
        for token in &tokens {
            for username in &usernames {
                let mut finding = Finding::new(DetectorType::Dockerhub, token.clone())
                    .with_version(self.version());
                finding.raw_v2 = Some(format!("{}{}", token, username));

                if verify {
                    self.verify_pair(&mut finding, username, token).await;
                }

                let done = finding.is_verified();
                results.push(finding);
                if done {
                    break;
                }
            }
        }

        Ok(results)
    }
}
