use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::core::chunk::Chunk;
use crate::core::result::DecoderType;

use super::{DecodedChunk, Decoder};

lazy_static! {
    // `!` = `%21`
    static ref PERCENT_ENCODED_PAT: Regex = Regex::new(r"(?i)%[a-f0-9]{2}").unwrap();
}

/// Decodes characters that are percent encoded.
/// https://en.wikipedia.org/wiki/Percent-encoding
///
/// The encoded-sequence table and its pre-check automaton are built once at
/// construction; the engine owns the decoder for the lifetime of the run.
pub struct Percent {
    prefilter: AhoCorasick,
    encoding_to_char: HashMap<Vec<u8>, u8>,
}

impl Percent {
    pub fn new() -> Self {
        let special_chars: &[(u8, &[&str])] = &[
            (b'!', &["%21"]),
            (b'#', &["%23"]),
            (b'$', &["%24"]),
            (b'%', &["%25"]),
            (b'&', &["%26"]),
            (b'\'', &["%27"]),
            (b'(', &["%28"]),
            (b')', &["%29"]),
            (b'*', &["%2A", "%2a"]),
            (b'+', &["%2B", "%2b"]),
            (b',', &["%2C", "%2c"]),
            (b'/', &["%2F", "%2f"]),
            (b':', &["%3A", "%3a"]),
            (b';', &["%3B", "%3b"]),
            (b'=', &["%3D", "%3d"]),
            (b'?', &["%3F", "%3f"]),
            (b'@', &["%40"]),
            (b'[', &["%5B", "%5b"]),
            (b']', &["%5D", "%5d"]),
            (b' ', &["%20"]),
            (b'"', &["%22"]),
            (b'<', &["%3C", "%3c"]),
            (b'>', &["%3E", "%3e"]),
            (b'\\', &["%5C", "%5c"]),
            (b'^', &["%5E", "%5e"]),
            (b'`', &["%60"]),
            (b'{', &["%7B", "%7b"]),
            (b'|', &["%7C", "%7c"]),
            (b'}', &["%7D", "%7d"]),
        ];

        let mut encoding_to_char = HashMap::new();
        let mut keywords = Vec::new();
        for (ch, encodings) in special_chars {
            for encoding in *encodings {
                encoding_to_char.insert(encoding.as_bytes().to_vec(), *ch);
                keywords.push(*encoding);
            }
        }

        let prefilter = AhoCorasick::new(&keywords)
            .expect("percent decoder automaton construction cannot fail");

        Self {
            prefilter,
            encoding_to_char,
        }
    }

    fn decode(&self, input: &[u8]) -> Vec<u8> {
        let mut decoded = Vec::with_capacity(input.len());
        let mut last_index = 0;

        for m in PERCENT_ENCODED_PAT.find_iter(input) {
            let encoded = &input[m.start()..m.end()];
            // Unrecognized escape sequences are left untouched: neither
            // decoded nor an error.
            let Some(&ch) = self.encoding_to_char.get(encoded) else {
                continue;
            };
            decoded.extend_from_slice(&input[last_index..m.start()]);
            decoded.push(ch);
            last_index = m.end();
        }

        decoded.extend_from_slice(&input[last_index..]);
        decoded
    }
}

impl Default for Percent {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Percent {
    fn decoder_type(&self) -> DecoderType {
        DecoderType::Percent
    }

    fn from_chunk(&self, chunk: &Chunk) -> Option<DecodedChunk> {
        if chunk.data.is_empty() {
            return None;
        }
        // Cheap pre-check over the known encoded sequences avoids allocating
        // on the common case of chunks with no percent encoding.
        if !self.prefilter.is_match(&chunk.data) {
            return None;
        }

        Some(DecodedChunk {
            decoder_type: self.decoder_type(),
            chunk: chunk.derived(self.decode(&chunk.data)),
        })
    }
}
