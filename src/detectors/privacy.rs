use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::result::{DetectorType, Verification};
use crate::utils::patterns::prefix_regex;
use crate::verify::Verifier;

use super::standard::StandardDetector;

lazy_static! {
    // Privacy keys are bare UUIDs, so provider context is mandatory.
    static ref KEY_PAT: Regex = Regex::new(&format!(
        r"{}\b([0-9a-f]{{8}}-[0-9a-f]{{4}}-[0-9a-f]{{4}}-[0-9a-f]{{4}}-[0-9a-f]{{12}})\b",
        prefix_regex(&["privacy"])
    ))
    .unwrap();
}

const CARD_URL: &str = "https://api.privacy.com/v1/card?page=1&page_size=50";

pub fn privacy(verifier: Arc<Verifier>) -> StandardDetector {
    StandardDetector::builder()
        .detector_type(DetectorType::Privacy)
        .description(
            "Privacy.com API keys create and manage virtual payment cards \
             on the account they belong to.",
        )
        .keywords(&["privacy"])
        .pattern(KEY_PAT.clone())
        .verify_fn(Box::new(|verifier, key| {
            Box::pin(async move {
                let headers = vec![("Authorization".to_string(), format!("api-key {}", key))];
                match verifier.get(key, CARD_URL, headers).await {
                    Ok(response) => match response.status_code {
                        200 => (Verification::ConfirmedValid, HashMap::new()),
                        401 => (Verification::ConfirmedInvalid, HashMap::new()),
                        status => (
                            Verification::Error {
                                error: format!("unexpected HTTP response status {}", status),
                            },
                            HashMap::new(),
                        ),
                    },
                    Err(e) => (
                        Verification::Error {
                            error: e.to_string(),
                        },
                        HashMap::new(),
                    ),
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

    const KEY: &str = "9e53f095-6eb2-4d8c-bfba-8de12a704c7b";

    fn response(status_code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status_code,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_uuid_requires_provider_context() {
        let detector = privacy(Arc::new(Verifier::new(Arc::new(MockTransport::new()))));

        let data = format!("privacy_api_key = {}", KEY);
        let results = detector.from_data(false, data.as_bytes()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].raw, KEY);

        // A bare UUID could belong to anything.
        let results = detector.from_data(false, KEY.as_bytes()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_card_listing_confirms_key() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|url, headers| {
            assert!(url.contains("api.privacy.com/v1/card"));
            assert!(headers
                .iter()
                .any(|(k, v)| k == "Authorization" && v.starts_with("api-key ")));
            Ok(response(200, r#"{"data": [], "total_entries": 0}"#))
        });
        let detector = privacy(Arc::new(Verifier::new(Arc::new(transport))));

        let data = format!("privacy key {}", KEY);
        let results = detector.from_data(true, data.as_bytes()).await.unwrap();
        assert!(results[0].is_verified());
    }

    #[tokio::test]
    async fn test_unauthorized_is_confirmed_invalid() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_, _| Ok(response(401, r#"{"message": "invalid api key"}"#)));
        let detector = privacy(Arc::new(Verifier::new(Arc::new(transport))));

        let data = format!("privacy key {}", KEY);
        let results = detector.from_data(true, data.as_bytes()).await.unwrap();
        assert_eq!(results[0].verification, Verification::ConfirmedInvalid);
    }

    #[tokio::test]
    async fn test_server_error_is_inconclusive() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_, _| Ok(response(503, "unavailable")));
        let detector = privacy(Arc::new(Verifier::new(Arc::new(transport))));

        let data = format!("privacy key {}", KEY);
        let results = detector.from_data(true, data.as_bytes()).await.unwrap();
        match &results[0].verification {
            Verification::Error { error } => assert!(error.contains("503")),
            other => panic!("expected inconclusive outcome, got {:?}", other),
        }
    }
}
