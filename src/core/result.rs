use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identity for a detector's matching logic. Together with the
/// detector version this uniquely identifies a pattern revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectorType {
    Dockerhub,
    ElasticCloud,
    Github,
    Gitlab,
    NewRelic,
    Privacy,
    PrivateKey,
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorType::Dockerhub => "dockerhub",
            DetectorType::ElasticCloud => "elastic_cloud",
            DetectorType::Github => "github",
            DetectorType::Gitlab => "gitlab",
            DetectorType::NewRelic => "new_relic",
            DetectorType::Privacy => "privacy",
            DetectorType::PrivateKey => "private_key",
        };
        write!(f, "{}", name)
    }
}

/// Which transform produced the chunk a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecoderType {
    Plain,
    Percent,
}

/// Explicit verification outcome. Provider APIs return ambiguous statuses
/// (e.g. 403 "valid key, wrong scope" vs 401 "invalid key" vs 5xx), so this
/// is a four-state model rather than a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    /// Verification was not requested.
    Skipped,
    /// Verification was attempted but inconclusive (network failure, timeout,
    /// unexpected status). The candidate is still reported.
    Error { error: String },
    ConfirmedValid,
    ConfirmedInvalid,
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::ConfirmedValid)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Verification::Error { error } => Some(error),
            _ => None,
        }
    }

    /// Ranking used by the aggregator when merging duplicate findings.
    pub(crate) fn strength(&self) -> u8 {
        match self {
            Verification::Skipped => 0,
            Verification::Error { .. } => 1,
            Verification::ConfirmedInvalid => 2,
            Verification::ConfirmedValid => 3,
        }
    }
}

/// A detected (and optionally verified) secret, produced inside a detector's
/// `from_data` and immutable once handed to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub detector_type: DetectorType,
    pub detector_version: u32,
    pub decoder_type: DecoderType,
    /// The raw matched secret.
    pub raw: String,
    /// Composite key for multi-part credentials (e.g. token + username).
    pub raw_v2: Option<String>,
    /// Display-safe form of the secret, when the raw value is large.
    pub redacted: Option<String>,
    pub verification: Verification,
    pub verified_at: Option<DateTime<Utc>>,
    pub extra_data: HashMap<String, String>,
    pub analysis_info: HashMap<String, String>,
}

impl Finding {
    pub fn new(detector_type: DetectorType, raw: impl Into<String>) -> Self {
        Self {
            detector_type,
            detector_version: 1,
            decoder_type: DecoderType::Plain,
            raw: raw.into(),
            raw_v2: None,
            redacted: None,
            verification: Verification::Skipped,
            verified_at: None,
            extra_data: HashMap::new(),
            analysis_info: HashMap::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.detector_version = version;
        self
    }

    pub fn is_verified(&self) -> bool {
        self.verification.is_verified()
    }

    pub fn verification_error(&self) -> Option<&str> {
        self.verification.error()
    }

    /// Record an inconclusive verification attempt. The secret itself is
    /// scrubbed from the error text so findings can be logged safely.
    pub fn set_verification_error(&mut self, err: impl fmt::Display, secret: &str) {
        let mut message = err.to_string();
        if !secret.is_empty() {
            message = message.replace(secret, "<redacted>");
        }
        self.verification = Verification::Error { error: message };
        self.verified_at = Some(Utc::now());
    }

    /// Key identifying a logical secret for deduplication.
    pub(crate) fn dedup_key(&self) -> (DetectorType, String, Option<String>) {
        (self.detector_type, self.raw.clone(), self.raw_v2.clone())
    }
}
