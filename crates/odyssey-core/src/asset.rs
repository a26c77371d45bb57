//! Generated visual assets.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::StorageError;

const DEFAULT_MIME_TYPE: &str = "image/png";

/// An opaque generated binary blob with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// MIME type reported by the generator.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Asset {
    /// Creates an asset from raw bytes.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Encodes the asset for a string-valued durable store as
    /// `<mime>;base64,<data>`.
    #[must_use]
    pub fn to_durable(&self) -> String {
        format!("{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    /// Decodes a value produced by [`Asset::to_durable`]. A bare base64
    /// payload without a media type prefix is read as PNG.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupt` if the payload is not valid base64.
    pub fn from_durable(key: &str, value: &str) -> Result<Self, StorageError> {
        let (mime_type, payload) = match value.split_once(";base64,") {
            Some((mime, payload)) => (mime, payload),
            None => (DEFAULT_MIME_TYPE, value),
        };
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| StorageError::Corrupt {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(mime_type, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_encoding_keeps_mime_type() {
        let asset = Asset::new("image/jpeg", vec![0xff, 0xd8, 0xff]);

        let decoded = Asset::from_durable("k", &asset.to_durable()).unwrap();

        assert_eq!(decoded, asset);
    }

    #[test]
    fn test_bare_base64_is_read_as_png() {
        let decoded = Asset::from_durable("k", "iVBORw==").unwrap();

        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.data, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_invalid_payload_is_corrupt() {
        let result = Asset::from_durable("odyssey_anchor_1", "image/png;base64,***");

        match result {
            Err(StorageError::Corrupt { key, .. }) => assert_eq!(key, "odyssey_anchor_1"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }
}
