use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::{Result, ScanError};

/// Engine configuration, loadable from TOML. All knobs are resolved once at
/// registry construction; nothing here is consulted at scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Attempt live verification of candidates when the chunk requests it.
    pub verify: bool,
    /// Deadline for a single verification HTTP round-trip, in milliseconds.
    pub verify_timeout_ms: u64,
    /// Optional pacing of verification calls across all detectors.
    pub verify_requests_per_second: Option<u32>,
    /// Wall-clock budget for one detector on one chunk, in milliseconds.
    pub detector_timeout_ms: u64,
    /// Per-detector toggles and endpoint overrides, keyed by detector name.
    pub detectors: HashMap<String, DetectorConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify: true,
            verify_timeout_ms: 30_000,
            verify_requests_per_second: None,
            detector_timeout_ms: 60_000,
            detectors: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ScanError::Config(e.to_string()))
    }

    pub fn detector(&self, name: &str) -> DetectorConfig {
        self.detectors.get(name).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.detector(name).enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub enabled: bool,
    /// Self-hosted / enterprise base URLs replacing the cloud endpoint.
    pub endpoints: Option<Vec<String>>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoints: None,
        }
    }
}
