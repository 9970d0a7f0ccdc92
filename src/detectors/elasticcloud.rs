use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::core::error::Result;
use crate::core::result::{DetectorType, Finding, Verification};
use crate::core::traits::Detector;
use crate::utils::patterns::PatternUtils;
use crate::verify::Verifier;

lazy_static! {
    // Issued keys are base64 with an `essu_` prefix.
    static ref KEY_PAT: Regex = Regex::new(r"\b(essu_[a-zA-Z0-9+/]{24,}={0,3})").unwrap();
}

const DEPLOYMENTS_URL: &str = "https://api.elastic-cloud.com/api/v1/deployments";

#[derive(Debug, Deserialize)]
struct DeploymentsResponse {
    #[serde(default)]
    deployments: Vec<Deployment>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    name: String,
}

pub struct ElasticCloud {
    verifier: Arc<Verifier>,
}

impl ElasticCloud {
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self { verifier }
    }

    async fn verify_key(&self, finding: &mut Finding, key: &str) {
        finding.verified_at = Some(Utc::now());

        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("ApiKey {}", key)),
        ];

        let response = match self.verifier.get(key, DEPLOYMENTS_URL, headers).await {
            Ok(response) => response,
            Err(e) => {
                finding.set_verification_error(e.to_string(), key);
                return;
            }
        };

        match response.status_code {
            200 => {
                finding.verification = Verification::ConfirmedValid;
                if let Ok(listing) = response.json::<DeploymentsResponse>() {
                    let names: Vec<String> =
                        listing.deployments.into_iter().map(|d| d.name).collect();
                    if !names.is_empty() {
                        finding
                            .extra_data
                            .insert("deployments".to_string(), names.join(","));
                    }
                }
            }
            401 => finding.verification = Verification::ConfirmedInvalid,
            // Authenticated but missing the deployments permission.
            403 => finding.verification = Verification::ConfirmedValid,
            status => finding.set_verification_error(
                format!(
                    "unexpected HTTP response status {}: {}",
                    status,
                    response.text().unwrap_or_default()
                ),
                key,
            ),
        }
    }
}

#[async_trait]
impl Detector for ElasticCloud {
    fn detector_type(&self) -> DetectorType {
        DetectorType::ElasticCloud
    }

    fn keywords(&self) -> &[&str] {
        &["essu_"]
    }

    fn description(&self) -> &str {
        "Elastic Cloud API keys manage deployments and account resources \
         through the Elastic Cloud REST API."
    }

    async fn from_data(&self, verify: bool, data: &[u8]) -> Result<Vec<Finding>> {
        let text = String::from_utf8_lossy(data);

        let keys: BTreeSet<String> = KEY_PAT
            .captures_iter(&text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|k| PatternUtils::has_min_entropy(k, 4.0))
            .collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let mut finding = Finding::new(DetectorType::ElasticCloud, key.clone());
            if verify {
                self.verify_key(&mut finding, &key).await;
            }
            results.push(finding);
        }

        Ok(results)
    }
}
