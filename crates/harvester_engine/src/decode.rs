use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use serde_json::Value;

use crate::{FetchError, TransportResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
    #[error("invalid json: {0}")]
    Json(String),
}

impl From<DecodeError> for FetchError {
    fn from(err: DecodeError) -> Self {
        FetchError::malformed(err.to_string())
    }
}

/// Decode raw bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng fallback.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedBody, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

/// Decode a response body as text.
pub fn response_text(response: &TransportResponse) -> Result<String, DecodeError> {
    decode_body(&response.body, response.content_type.as_deref()).map(|decoded| decoded.text)
}

/// Decode a response body as JSON. The service always answers in UTF-8 JSON
/// for graph queries, so the text step only matters for BOMs and odd charsets.
pub fn response_json(response: &TransportResponse) -> Result<Value, DecodeError> {
    if let Ok(value) = serde_json::from_slice(&response.body) {
        return Ok(value);
    }
    let text = response_text(response)?;
    serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|err| DecodeError::Json(err.to_string()))
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
        })
        .next()
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedBody, DecodeError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: enc.name().to_string(),
            message: "decoding error".into(),
        });
    }
    Ok(DecodedBody {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}
