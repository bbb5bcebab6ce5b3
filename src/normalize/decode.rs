use base64::Engine as _;

#[derive(Debug, thiserror::Error)]
#[error("invalid base64 payload: {0}")]
pub struct InvalidEncoding(#[from] base64::DecodeError);

/// Strict base64 decoding of a marker value.
///
/// Surrounding whitespace is tolerated since stored values often carry a
/// trailing newline; anything else outside the standard alphabet, or wrong
/// padding, is rejected.
pub fn decode(blob: &str) -> Result<Vec<u8>, InvalidEncoding> {
    Ok(base64::engine::general_purpose::STANDARD.decode(blob.trim())?)
}
