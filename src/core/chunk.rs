use serde::{Deserialize, Serialize};

/// The unit of scanned data: raw bytes plus source provenance.
///
/// A chunk is immutable once produced by a source connector. Decoders derive
/// new chunks via [`Chunk::derived`] rather than mutating in place, so
/// concurrent consumers can safely read the same chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub data: Vec<u8>,
    pub source_name: String,
    pub source_id: i64,
    pub job_id: i64,
    pub secret_id: i64,
    pub source_type: String,
    /// Opaque connector-specific metadata, passed through untouched.
    pub source_metadata: serde_json::Value,
    /// Whether detectors should attempt live verification of candidates.
    pub verify: bool,
}

impl Chunk {
    pub fn new(data: impl Into<Vec<u8>>, source_name: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            source_name: source_name.into(),
            source_id: 0,
            job_id: 0,
            secret_id: 0,
            source_type: String::new(),
            source_metadata: serde_json::Value::Null,
            verify: false,
        }
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Create a new chunk carrying `data` but this chunk's provenance.
    /// Used by decoders: the derived chunk is additive, the original still
    /// runs through detection.
    pub fn derived(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            source_name: self.source_name.clone(),
            source_id: self.source_id,
            job_id: self.job_id,
            secret_id: self.secret_id,
            source_type: self.source_type.clone(),
            source_metadata: self.source_metadata.clone(),
            verify: self.verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_preserves_provenance() {
        let mut chunk = Chunk::new(b"secret=abc".to_vec(), "repo").with_verify(true);
        chunk.source_id = 7;
        chunk.job_id = 42;

        let derived = chunk.derived(b"secret=xyz".to_vec());
        assert_eq!(derived.data, b"secret=xyz");
        assert_eq!(derived.source_id, 7);
        assert_eq!(derived.job_id, 42);
        assert_eq!(derived.source_name, "repo");
        assert!(derived.verify);

        // Original untouched.
        assert_eq!(chunk.data, b"secret=abc");
    }
}
