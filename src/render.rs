//! The response render chain: schema dump, then wire encoding.

use http_kit::header::{HeaderValue, CONTENT_TYPE};
use http_kit::{Body, Response, StatusCode};
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{DumpError, Error};
use crate::schema::SchemaRef;
use crate::serializer::Serializer;

/// The outcome of a render chain.
#[derive(Debug)]
pub enum Rendered {
    /// Content that still needs wire encoding by the caller.
    Content(Value),
    /// A complete wire response.
    Response(Response),
}

#[derive(Debug, Clone)]
enum Stage {
    Dump(SchemaRef),
    Encode {
        serializer: Serializer,
        status: StatusCode,
    },
}

/// An ordered, fixed pipeline applied to every successful handler result.
#[derive(Debug, Clone, Default)]
pub struct RenderChain {
    stages: SmallVec<[Stage; 2]>,
}

impl RenderChain {
    /// Append a schema-dump stage.
    #[must_use]
    pub fn dump(mut self, schema: SchemaRef) -> Self {
        self.stages.push(Stage::Dump(schema));
        self
    }

    /// Append the final wire-encoding stage.
    #[must_use]
    pub fn encode(mut self, serializer: Serializer, status: StatusCode) -> Self {
        self.stages.push(Stage::Encode { serializer, status });
        self
    }

    /// Run the chain over `content`.
    ///
    /// # Errors
    ///
    /// A dump failure becomes a [`DumpError`] carrying the field messages;
    /// an encoding failure becomes one without structured detail. Both are
    /// logged, since they indicate a handler returning content inconsistent
    /// with its own declaration.
    pub fn render(&self, content: Value) -> Result<Rendered, Error> {
        let mut content = content;
        for stage in &self.stages {
            match stage {
                Stage::Dump(schema) => {
                    content = schema.dump(&content).map_err(|orig| {
                        tracing::error!(
                            schema = schema.name(),
                            errors = %orig.normalized_messages(),
                            "response content failed schema dump"
                        );
                        DumpError::from_validation(orig)
                    })?;
                }
                Stage::Encode { serializer, status } => {
                    return Ok(Rendered::Response(encode_response(
                        *serializer,
                        *status,
                        &content,
                    )?));
                }
            }
        }
        Ok(Rendered::Content(content))
    }
}

/// Encode `content` into a complete wire response.
pub(crate) fn encode_response(
    serializer: Serializer,
    status: StatusCode,
    content: &Value,
) -> Result<Response, Error> {
    let bytes = serializer.encode(content).map_err(|error| {
        tracing::error!(%error, "response content failed encoding");
        Error::from(DumpError::new())
    })?;
    let mut response = Response::new(Body::from_bytes(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(serializer.media_type()),
    );
    Ok(response)
}
