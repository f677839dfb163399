//! Reversible payload encoding.
//!
//! The encoding is base64 followed by a reversal of the resulting character
//! sequence; decoding inverts both steps. It is deterministic, keyless and
//! exactly invertible for every byte string. It is not a confidentiality
//! mechanism.

use base64::{engine::general_purpose, Engine as _};

use crate::errors::{Result, SourceCloakError};

/// Encode raw bytes into a reversed-base64 payload.
pub fn encode_bytes(input: &[u8]) -> String {
    let encoded = general_purpose::STANDARD.encode(input);
    encoded.chars().rev().collect()
}

/// Decode a reversed-base64 payload back into raw bytes.
///
/// Fails with [`SourceCloakError::Decode`] when the un-reversed payload is not
/// valid base64; callers treat this as a hard failure for the affected input.
pub fn decode_bytes(payload: &str) -> Result<Vec<u8>> {
    let reversed: String = payload.chars().rev().collect();
    general_purpose::STANDARD
        .decode(reversed.as_bytes())
        .map_err(|e| SourceCloakError::Decode(e.to_string()))
}

/// Encode source text into a payload string.
pub fn encode(source: &str) -> String {
    encode_bytes(source.as_bytes())
}

/// Decode a payload string back into source text.
pub fn decode(payload: &str) -> Result<String> {
    let bytes = decode_bytes(payload)?;
    String::from_utf8(bytes).map_err(|e| SourceCloakError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_vector() {
        // base64("<?php echo 1;") == "PD9waHAgZWNobyAxOw==", then reversed
        assert_eq!(encode("<?php echo 1;"), "==wOxAyboNWZgAHaw9DP");
    }

    #[test]
    fn decodes_known_vector() {
        assert_eq!(decode("==wOxAyboNWZgAHaw9DP").unwrap(), "<?php echo 1;");
    }

    #[test]
    fn round_trips_empty_string() {
        assert_eq!(decode(&encode("")).unwrap(), "");
    }

    #[test]
    fn round_trips_embedded_nul() {
        let source = "before\0after";
        assert_eq!(decode(&encode(source)).unwrap(), source);
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = decode("not valid base64 at all!").unwrap_err();
        assert!(matches!(err, SourceCloakError::Decode(_)));
    }
}
