//! Decoding of base64 image data URIs (`data:image/<ext>;base64,<payload>`).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::ValidationError;

const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "gif", "webp"];

/// An uploaded image, decoded to raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
  /// File extension taken from the media subtype, lowercased.
  pub extension: String,
  pub bytes:     Vec<u8>,
}

impl DecodedImage {
  pub fn from_data_uri(uri: &str) -> Result<Self, ValidationError> {
    let invalid = |msg: &str| ValidationError::Image(msg.to_owned());

    let rest = uri
      .trim()
      .strip_prefix("data:image/")
      .ok_or_else(|| invalid("expected a data:image/...;base64 URI"))?;
    let (subtype, payload) = rest
      .split_once(";base64,")
      .ok_or_else(|| invalid("image data must be base64-encoded"))?;

    let extension = subtype.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
      return Err(ValidationError::Image(format!(
        "unsupported image type {subtype:?}"
      )));
    }

    let bytes = B64
      .decode(payload.trim())
      .map_err(|e| ValidationError::Image(format!("invalid base64: {e}")))?;
    if bytes.is_empty() {
      return Err(invalid("image is empty"));
    }

    Ok(Self { extension, bytes })
  }
}
