//! The `base64_encoded` boundary encoding (§6 of the spec).
//!
//! When `base64_encoded=true`, `source_code`/`stdin`/`expected_output`/
//! `additional_files[*].content` arrive base64-encoded and are decoded before
//! they ever reach the domain layer; on the way out the same fields (plus
//! `stdout`/`stderr`/`compile_output`) are re-encoded. When the flag is
//! false, the JSON strings are taken as raw UTF-8 text verbatim. Internal
//! storage (`judge_protocol::submission::Submission`) is always raw bytes —
//! this module is the only place that cares about the flag.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Base64Error {
    #[error("invalid base64 in field `{field}`: {source}")]
    Invalid {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

/// Decodes one request field into raw bytes, honoring `base64_encoded`.
pub fn decode_field(field: &'static str, value: &str, base64_encoded: bool) -> Result<Vec<u8>, Base64Error> {
    if base64_encoded {
        BASE64
            .decode(value.as_bytes())
            .map_err(|source| Base64Error::Invalid { field, source })
    } else {
        Ok(value.as_bytes().to_vec())
    }
}

/// Decodes an optional request field, passing `None` through unchanged.
pub fn decode_optional_field(
    field: &'static str,
    value: Option<&str>,
    base64_encoded: bool,
) -> Result<Option<Vec<u8>>, Base64Error> {
    value
        .map(|v| decode_field(field, v, base64_encoded))
        .transpose()
}

/// Encodes one response field, honoring `base64_encoded`. When the flag is
/// false, bytes that are not valid UTF-8 are lossily converted rather than
/// failing the response — a submission's stdout is untrusted program output
/// and may contain arbitrary bytes even though the happy path is text.
pub fn encode_field(bytes: &[u8], base64_encoded: bool) -> String {
    if base64_encoded {
        BASE64.encode(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Encodes an optional response field, passing `None` through unchanged.
pub fn encode_optional_field(bytes: Option<&[u8]>, base64_encoded: bool) -> Option<String> {
    bytes.map(|b| encode_field(b, base64_encoded))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes_through_base64() {
        let original: Vec<u8> = (0..=255).collect();
        let encoded = encode_field(&original, true);
        let decoded = decode_field("source_code", &encoded, true).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn raw_mode_preserves_utf8_text_verbatim() {
        let text = "print('Hello, World!')\n";
        let decoded = decode_field("source_code", text, false).unwrap();
        assert_eq!(decoded, text.as_bytes());
        assert_eq!(encode_field(&decoded, false), text);
    }

    #[test]
    fn rejects_malformed_base64() {
        let err = decode_field("stdin", "not-valid-base64!!", true).unwrap_err();
        assert!(matches!(err, Base64Error::Invalid { field: "stdin", .. }));
    }

    #[test]
    fn optional_field_none_passes_through() {
        assert!(decode_optional_field("stdin", None, true).unwrap().is_none());
        assert!(encode_optional_field(None, true).is_none());
    }
}
