//! Secret detection and verification engine.
//!
//! Chunks of raw bytes from arbitrary sources are run through a decoder
//! chain, prefiltered by keyword against a registry of provider detectors,
//! and matched with provider-specific patterns. Candidates can be verified
//! live against the issuing provider's API, with outcomes reported as an
//! explicit four-state result rather than a boolean.
//!
//! ```no_run
//! use std::sync::Arc;
//! use secret_hound::core::{Chunk, EngineConfig};
//! use secret_hound::engine::Engine;
//!
//! # async fn run() -> secret_hound::core::Result<()> {
//! let config = EngineConfig::default();
//! let engine = Engine::from_config(&config)?;
//! let findings = engine
//!     .scan_chunk(&Chunk::new(b"token: ghp_...".to_vec(), "README.md"))
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod decoders;
pub mod detectors;
pub mod engine;
pub mod utils;
pub mod verify;

pub use crate::core::{Chunk, DetectorType, EngineConfig, Finding, Result, ScanError, Verification};
pub use crate::engine::Engine;
pub use crate::verify::Verifier;
