pub mod aggregator;
pub mod prefilter;

pub use aggregator::Aggregator;
pub use prefilter::KeywordPrefilter;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::chunk::Chunk;
use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::result::{DecoderType, Finding};
use crate::core::traits::Detector;
use crate::decoders::{default_decoders, Decoder};
use crate::verify::Verifier;

/// The detection dispatch pipeline: decoder chain, keyword prefilter, and
/// detector registry, wired together once at startup.
///
/// The registry and prefilter are immutable after construction and safe for
/// unlimited concurrent readers; each chunk's pipeline runs to completion
/// independently of others.
pub struct Engine {
    detectors: Vec<Arc<dyn Detector>>,
    prefilter: KeywordPrefilter,
    decoders: Vec<Box<dyn Decoder>>,
    detector_timeout: Duration,
    verify: bool,
}

impl Engine {
    /// Build an engine over a fixed detector registry. Fails when any
    /// detector violates the non-empty keyword invariant.
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Result<Self> {
        let prefilter = KeywordPrefilter::build(&detectors)?;
        Ok(Self {
            detectors,
            prefilter,
            decoders: default_decoders(),
            detector_timeout: Duration::from_secs(60),
            verify: true,
        })
    }

    /// Build the production engine: curl-backed verifier and the full
    /// detector registry, both resolved from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let verifier = Arc::new(Verifier::from_config(config));
        let detectors = crate::detectors::all_detectors(verifier, config)?;
        Ok(Self::new(detectors)?
            .with_detector_timeout(Duration::from_millis(config.detector_timeout_ms))
            .with_verify(config.verify))
    }

    pub fn with_decoders(mut self, decoders: Vec<Box<dyn Decoder>>) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn with_detector_timeout(mut self, detector_timeout: Duration) -> Self {
        self.detector_timeout = detector_timeout;
        self
    }

    /// Globally disable verification regardless of what chunks request.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn detectors(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    /// Run one chunk through the full pipeline: the original bytes plus every
    /// decoded variant, each prefiltered down to candidate detectors, with
    /// results deduplicated across variants.
    pub async fn scan_chunk(&self, chunk: &Chunk) -> Vec<Finding> {
        let verify = self.verify && chunk.verify;
        let mut aggregator = Aggregator::new();

        self.scan_variant(&chunk.data, DecoderType::Plain, verify, &mut aggregator)
            .await;

        for decoder in &self.decoders {
            if let Some(decoded) = decoder.from_chunk(chunk) {
                self.scan_variant(
                    &decoded.chunk.data,
                    decoded.decoder_type,
                    verify,
                    &mut aggregator,
                )
                .await;
            }
        }

        aggregator.into_findings()
    }

    /// Dispatch one chunk variant to its candidate detectors. Failures are
    /// isolated per detector: one detector erroring or timing out never
    /// prevents the others from running.
    async fn scan_variant(
        &self,
        data: &[u8],
        decoder_type: DecoderType,
        verify: bool,
        aggregator: &mut Aggregator,
    ) {
        let candidates = self.prefilter.matching_detectors(data);
        debug!(
            candidates = candidates.len(),
            total = self.detectors.len(),
            ?decoder_type,
            "prefilter selected detectors"
        );

        for idx in candidates {
            let detector = &self.detectors[idx];
            match timeout(self.detector_timeout, detector.from_data(verify, data)).await {
                Ok(Ok(findings)) => {
                    for mut finding in findings {
                        finding.decoder_type = decoder_type;
                        aggregator.add(finding);
                    }
                }
                Ok(Err(e)) => {
                    warn!(
                        detector = %detector.detector_type(),
                        version = detector.version(),
                        error = %e,
                        "detector failed on chunk"
                    );
                }
                Err(_) => {
                    warn!(
                        detector = %detector.detector_type(),
                        version = detector.version(),
                        "detector timed out on chunk"
                    );
                }
            }
        }
    }

    /// Drive a parallel worker pool over a chunk stream, forwarding findings
    /// to `results`. Returns when the chunk channel closes and all in-flight
    /// chunks have finished.
    pub async fn run(
        self: Arc<Self>,
        chunks: mpsc::Receiver<Chunk>,
        results: mpsc::Sender<Finding>,
        workers: usize,
    ) {
        let chunks = Arc::new(AsyncMutex::new(chunks));

        let mut handles = Vec::with_capacity(workers.max(1));
        for _ in 0..workers.max(1) {
            let engine = self.clone();
            let chunks = chunks.clone();
            let results = results.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let chunk = { chunks.lock().await.recv().await };
                    let Some(chunk) = chunk else { break };
                    for finding in engine.scan_chunk(&chunk).await {
                        if results.send(finding).await.is_err() {
                            return;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}
