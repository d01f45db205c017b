//! Binary deltas via zstd dictionary compression
//!
//! A patch is the new entry compressed against the base entry as a zstd
//! dictionary. Application is plain dictionary decompression, so the same
//! base and patch bytes always reproduce byte-identical output.

use std::io::Write;

use anyhow::Result;
use zstd::dict::{DecoderDictionary, EncoderDictionary};

/// Compress `new_data` against `base` to produce a patch payload.
///
/// Used by the `diff` authoring command; the engine itself only applies.
pub fn generate_delta(base: &[u8], new_data: &[u8], compression_level: i32) -> Result<Vec<u8>> {
    let dict = EncoderDictionary::copy(base, compression_level);
    let mut encoder = zstd::stream::Encoder::with_prepared_dictionary(Vec::new(), &dict)?;
    encoder.write_all(new_data)?;
    Ok(encoder.finish()?)
}

/// Reconstruct the new entry from `base` and a patch payload.
pub fn apply_delta(base: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    let dict = DecoderDictionary::copy(base);
    let mut decoder = zstd::stream::Decoder::with_prepared_dictionary(patch, &dict)?;
    let mut output = Vec::new();
    std::io::copy(&mut decoder, &mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let base = b"class table entry one, class table entry two, constant pool";
        let new = b"class table entry one, class table entry two, constant pool, patched method body";

        let patch = generate_delta(base, new, 3).unwrap();
        assert!(patch.len() < new.len());

        let rebuilt = apply_delta(base, &patch).unwrap();
        assert_eq!(rebuilt, new);
    }

    #[test]
    fn application_is_deterministic() {
        let base = b"shared prefix material for the dictionary";
        let new = b"shared prefix material for the dictionary plus changes";
        let patch = generate_delta(base, new, 3).unwrap();

        let first = apply_delta(base, &patch).unwrap();
        let second = apply_delta(base, &patch).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_base_creates_new_entries() {
        let new = b"a brand new entry with no base in the origin archive";
        let patch = generate_delta(&[], new, 3).unwrap();
        assert_eq!(apply_delta(&[], &patch).unwrap(), new);
    }
}
