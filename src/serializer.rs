//! Wire encoders for the final render stage.

use serde_json::Value;

/// Encoding failure, boxed so serializers can use any error type.
pub type EncodeError = Box<dyn std::error::Error + Send + Sync>;

/// A wire encoder: a media type and an encode function.
///
/// Plain function pointers keep serializers `Copy` and comparable, which the
/// documentation layer relies on when it emits `produces` entries.
#[derive(Debug, Clone, Copy)]
pub struct Serializer {
    media_type: &'static str,
    encode: fn(&Value) -> Result<Vec<u8>, EncodeError>,
}

impl Serializer {
    /// Build a serializer from its parts.
    #[must_use]
    pub const fn new(
        media_type: &'static str,
        encode: fn(&Value) -> Result<Vec<u8>, EncodeError>,
    ) -> Self {
        Self { media_type, encode }
    }

    /// The `Content-Type` this serializer produces.
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Encode `content` into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying encoder failure.
    pub fn encode(&self, content: &Value) -> Result<Vec<u8>, EncodeError> {
        (self.encode)(content)
    }
}

fn encode_json(content: &Value) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(content)?)
}

/// The default JSON serializer.
#[must_use]
pub const fn json() -> Serializer {
    Serializer::new("application/json", encode_json)
}
