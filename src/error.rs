//! Error kinds raised by the binding and rendering pipeline.
//!
//! The taxonomy is deliberately closed: request-side failures are either a
//! [`ValidationError`] (the payload was structurally readable but one or more
//! fields were invalid) or a [`DecodeError`] (the raw payload could not even
//! be parsed into a loadable structure). Response-side failures are a
//! [`DumpError`]: the handler returned content inconsistent with its own
//! declared response schema, which is a server defect and maps to a 5xx.
//! All of them carry normalized, field-keyed messages so an error handler can
//! render per-field diagnostics.

use std::collections::BTreeMap;
use std::fmt;

use http_kit::{HttpError, StatusCode};
use serde_json::{json, Value};

/// A specialized `Result` for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Field-keyed messages, ordered by field name.
pub type Messages = BTreeMap<String, Vec<String>>;

/// A field-level validation failure produced by schema load or dump.
///
/// Always recoverable: the router renders it as a 400 with one message list
/// per offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    messages: Messages,
}

impl ValidationError {
    /// Create an empty error to be filled with [`push`](Self::push).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an error carrying a single message for `field`.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.push(field, message);
        error
    }

    /// Record a message for `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Fold another error's messages into this one, prefixing every field
    /// with `prefix.` (used for nested schema failures).
    pub fn merge_nested(&mut self, prefix: &str, other: Self) {
        for (field, messages) in other.messages {
            self.messages
                .entry(format!("{prefix}.{field}"))
                .or_default()
                .extend(messages);
        }
    }

    /// True when no message has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The recorded messages, keyed by field name.
    #[must_use]
    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// The messages as a JSON object, one array per field.
    #[must_use]
    pub fn normalized_messages(&self) -> Value {
        json!(self.messages)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request parameters: ")?;
        let mut first = true;
        for field in self.messages.keys() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "`{field}`")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl HttpError for ValidationError {
    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// The raw payload could not be parsed into a loadable structure.
///
/// Same severity class as [`ValidationError`] but kept distinct so
/// diagnostics can say "malformed request" rather than "invalid field".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Create an error with the given diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Normalized single-key message under `_body`.
    #[must_use]
    pub fn normalized_messages(&self) -> Value {
        json!({ "_body": self.message })
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DecodeError {}

impl HttpError for DecodeError {
    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/// The handler's return value could not be serialized by its declared
/// response schema.
///
/// A server-side defect: logged as an error and surfaced as a 500, never
/// silently coerced. Carries the originating validation failure when the
/// schema produced one.
#[derive(Debug, Clone, Default)]
pub struct DumpError {
    orig: Option<ValidationError>,
}

impl DumpError {
    /// Create an error without structured detail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an error wrapping the originating validation failure.
    #[must_use]
    pub fn from_validation(orig: ValidationError) -> Self {
        Self { orig: Some(orig) }
    }

    /// The originating failure, if the dump stage produced one.
    #[must_use]
    pub fn orig(&self) -> Option<&ValidationError> {
        self.orig.as_ref()
    }

    /// Field-keyed messages from the original failure, or the generic
    /// `_schema` message when no structured detail is available.
    #[must_use]
    pub fn normalized_messages(&self) -> Value {
        match &self.orig {
            Some(orig) if !orig.is_empty() => orig.normalized_messages(),
            _ => json!({ "_schema": "Error dump content" }),
        }
    }
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unable to serialize response content")
    }
}

impl std::error::Error for DumpError {}

impl HttpError for DumpError {
    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// A schema definition is malformed (empty name, duplicate field).
///
/// A programming error caught while schemas are first built, never expected
/// at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTypeError {
    message: String,
}

impl SchemaTypeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid schema type: {}", self.message)
    }
}

impl std::error::Error for SchemaTypeError {}

/// Status-bearing error raised from handler code.
#[derive(Debug, Clone)]
pub struct EndpointError {
    status: StatusCode,
    message: String,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EndpointError {}

impl HttpError for EndpointError {
    fn status(&self) -> StatusCode {
        self.status
    }
}

/// The closed union of everything the pipeline can fail with.
#[derive(Debug)]
pub enum Error {
    /// Field-level validation failure (400).
    Validation(ValidationError),
    /// Structurally unparsable payload (400).
    Decode(DecodeError),
    /// Response serialization failure (500).
    Dump(DumpError),
    /// Error raised by handler code, carrying its own status.
    Endpoint(Box<dyn HttpError>),
}

impl Error {
    /// Wrap a status-bearing handler error.
    pub fn endpoint(error: impl HttpError + 'static) -> Self {
        Self::Endpoint(Box::new(error))
    }

    /// Build a handler error from a status code and message.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Endpoint(Box::new(EndpointError {
            status,
            message: message.into(),
        }))
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(e) => e.status(),
            Self::Decode(e) => e.status(),
            Self::Dump(e) => e.status(),
            Self::Endpoint(e) => e.status(),
        }
    }

    /// Field-keyed messages suitable for an error response body.
    #[must_use]
    pub fn normalized_messages(&self) -> Value {
        match self {
            Self::Validation(e) => e.normalized_messages(),
            Self::Decode(e) => e.normalized_messages(),
            Self::Dump(e) => e.normalized_messages(),
            Self::Endpoint(e) => json!({ "_error": e.to_string() }),
        }
    }

    /// The validation failure, when this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// The decode failure, when this is one.
    #[must_use]
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }

    /// The dump failure, when this is one.
    #[must_use]
    pub fn as_dump(&self) -> Option<&DumpError> {
        match self {
            Self::Dump(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => fmt::Display::fmt(e, f),
            Self::Decode(e) => fmt::Display::fmt(e, f),
            Self::Dump(e) => fmt::Display::fmt(e, f),
            Self::Endpoint(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Error {}

impl HttpError for Error {
    fn status(&self) -> StatusCode {
        Self::status(self)
    }
}

impl From<ValidationError> for Error {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Self {
        Self::Decode(error)
    }
}

impl From<DumpError> for Error {
    fn from(error: DumpError) -> Self {
        Self::Dump(error)
    }
}
