//! Operation descriptors: the documentation-facing half of endpoint metadata.

use serde_json::{Map, Value};

use crate::schema::SchemaRef;

/// One documented error response.
#[derive(Debug, Clone)]
pub struct ErrorSpec {
    status: u16,
    description: String,
    schema: Option<SchemaRef>,
}

impl ErrorSpec {
    /// Declare an error response with its status and description.
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            schema: None,
        }
    }

    /// Attach a body schema to the error response.
    #[must_use]
    pub fn schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The body schema, if declared.
    #[must_use]
    pub fn body_schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }
}

/// Free-form documentation attributes of an endpoint.
#[derive(Debug, Clone)]
pub struct Operation {
    tag: String,
    description: Option<String>,
    summary: Option<String>,
    errors: Vec<ErrorSpec>,
    security: Option<Value>,
    extra: Option<Map<String, Value>>,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            tag: "default".to_owned(),
            description: None,
            summary: None,
            errors: Vec::new(),
            security: None,
            extra: None,
        }
    }
}

impl Operation {
    /// Start a descriptor with the default tag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grouping tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Set the long description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the one-line summary.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Declare an error response.
    #[must_use]
    pub fn error(mut self, error: ErrorSpec) -> Self {
        self.errors.push(error);
        self
    }

    /// Set the security requirements value, emitted verbatim.
    #[must_use]
    pub fn security(mut self, security: Value) -> Self {
        self.security = Some(security);
        self
    }

    /// Merge free-form attributes into the emitted operation object.
    #[must_use]
    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }

    pub(crate) fn tag_name(&self) -> &str {
        &self.tag
    }

    pub(crate) fn doc_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn doc_summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub(crate) fn errors(&self) -> &[ErrorSpec] {
        &self.errors
    }

    pub(crate) fn security_value(&self) -> Option<&Value> {
        self.security.as_ref()
    }

    pub(crate) fn extra_attributes(&self) -> Option<&Map<String, Value>> {
        self.extra.as_ref()
    }
}
