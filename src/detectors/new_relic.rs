use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::result::{DetectorType, Verification};
use crate::utils::patterns::prefix_regex;
use crate::verify::Verifier;

use super::standard::StandardDetector;

lazy_static! {
    static ref KEY_PAT: Regex = Regex::new(&format!(
        r"{}\b([A-Za-z0-9_\.]{{4}}-[A-Za-z0-9_\.]{{42}})\b",
        prefix_regex(&["newrelic"])
    ))
    .unwrap();
}

const US_ENDPOINT: &str = "https://api.newrelic.com/v2/applications.json";
const EU_ENDPOINT: &str = "https://api.eu.newrelic.com/v2/applications.json";

/// New Relic API keys are region-bound, so verification asks both regions
/// and a 2xx from either one confirms the key.
pub fn new_relic(verifier: Arc<Verifier>) -> StandardDetector {
    StandardDetector::builder()
        .detector_type(DetectorType::NewRelic)
        .description(
            "New Relic API keys query and configure monitoring data through \
             the New Relic REST API.",
        )
        .keywords(&["newrelic"])
        .pattern(KEY_PAT.clone())
        .verify_fn(Box::new(|verifier, key| {
            Box::pin(async move {
                let mut last_status = None;
                for endpoint in [US_ENDPOINT, EU_ENDPOINT] {
                    let headers = vec![("X-Api-Key".to_string(), key.to_string())];
                    match verifier.get(key, endpoint, headers).await {
                        Ok(response) if response.is_success() => {
                            let mut extra = HashMap::new();
                            let region = if endpoint == EU_ENDPOINT { "eu" } else { "us" };
                            extra.insert("region".to_string(), region.to_string());
                            return (Verification::ConfirmedValid, extra);
                        }
                        Ok(response) => last_status = Some(response.status_code),
                        Err(e) => {
                            return (
                                Verification::Error {
                                    error: e.to_string(),
                                },
                                HashMap::new(),
                            )
                        }
                    }
                }
                match last_status {
                    Some(401) | Some(403) => (Verification::ConfirmedInvalid, HashMap::new()),
                    Some(status) => (
                        Verification::Error {
                            error: format!("unexpected HTTP response status {}", status),
                        },
                        HashMap::new(),
                    ),
                    None => (Verification::Skipped, HashMap::new()),
                }
            })
        }))
        .build(verifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Detector;
    use crate::utils::http::{HttpResponse, MockTransport};

    const KEY: &str = "NRAK-W9QLziywvnccr2zkfgmrqe53q7hy8mks2rn1ykjx5a";

    fn response(status_code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status_code,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_key_requires_provider_context() {
        let detector = new_relic(Arc::new(Verifier::new(Arc::new(MockTransport::new()))));

        let data = format!("NEWRELIC_API_KEY = {}", KEY);
        let results = detector.from_data(false, data.as_bytes()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].raw, KEY);

        let results = detector.from_data(false, KEY.as_bytes()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_eu_fallback_confirms_key() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|url, _| {
            if url.contains("api.eu.") {
                Ok(response(200, r#"{"applications": []}"#))
            } else {
                Ok(response(401, r#"{"error": "invalid key"}"#))
            }
        });
        let detector = new_relic(Arc::new(Verifier::new(Arc::new(transport))));

        let data = format!("newrelic key: {}", KEY);
        let results = detector.from_data(true, data.as_bytes()).await.unwrap();
        assert!(results[0].is_verified());
        assert_eq!(results[0].extra_data["region"], "eu");
    }

    #[tokio::test]
    async fn test_rejected_in_both_regions_is_invalid() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_, _| Ok(response(401, r#"{"error": "invalid key"}"#)));
        let detector = new_relic(Arc::new(Verifier::new(Arc::new(transport))));

        let data = format!("newrelic key: {}", KEY);
        let results = detector.from_data(true, data.as_bytes()).await.unwrap();
        assert_eq!(results[0].verification, Verification::ConfirmedInvalid);
    }
}
