pub mod chunk;
pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use chunk::Chunk;
pub use config::{DetectorConfig, EngineConfig};
pub use error::{PemError, Result, ScanError};
pub use result::{DecoderType, DetectorType, Finding, Verification};
pub use traits::{Detector, Endpoints};
