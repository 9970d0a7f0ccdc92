pub mod percent;

pub use percent::Percent;

use crate::core::chunk::Chunk;
use crate::core::result::DecoderType;

/// A decoded variant of a chunk, tagged with the transform that produced it.
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    pub decoder_type: DecoderType,
    pub chunk: Chunk,
}

/// A pure transform producing normalized chunk variants to catch obfuscated
/// secrets. Decoding is additive: the original chunk still runs through
/// detection alongside any decoded variants.
pub trait Decoder: Send + Sync {
    fn decoder_type(&self) -> DecoderType;

    /// Return a derived chunk with the encoding undone, or `None` when the
    /// encoding is not present. Implementations must use a cheap pre-check
    /// before attempting the full transform.
    fn from_chunk(&self, chunk: &Chunk) -> Option<DecodedChunk>;
}

/// The default decoder chain, built once at engine construction.
pub fn default_decoders() -> Vec<Box<dyn Decoder>> {
    vec![Box::new(Percent::new())]
}
