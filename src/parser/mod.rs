//! Request parsers: the closed set of places a request value can come from.
//!
//! A [`Parser`] binds one schema (or file filter) to one request location.
//! Path, query and header parsers are synchronous; JSON, form and upload
//! parsers consume the body and are asynchronous. The split is a fixed
//! property of each variant, decided when the binding is declared rather
//! than discovered per request.

use serde_json::{Map, Value};

use crate::binding::BoundValue;
use crate::error::{DecodeError, Error, ValidationError};
use crate::routing::PathParams;
use crate::schema::{schema_of, SchemaRef, SchemaType, Unknown};
use http_kit::Request;

mod multipart;
mod query;

pub use multipart::{ParsedForm, UploadedFile};
pub(crate) use multipart::form_of;

use query::QueryPlan;

/// Where a parser reads its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Routed path segments.
    Path,
    /// The query string.
    Query,
    /// Request headers.
    Header,
    /// Form fields (urlencoded or multipart).
    FormData,
    /// The raw request body.
    Body,
}

impl Location {
    /// The OpenAPI `in` value for this location.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::FormData => "formData",
            Self::Body => "body",
        }
    }

    /// True only for the raw body location.
    #[must_use]
    pub fn is_body(self) -> bool {
        matches!(self, Self::Body)
    }
}

/// A schema bound to a non-file location.
#[derive(Debug, Clone)]
pub struct SchemaParser {
    schema: SchemaRef,
    unknown: Unknown,
    plan: Option<QueryPlan>,
}

impl SchemaParser {
    fn new(schema: SchemaRef, unknown: Unknown) -> Self {
        Self {
            schema,
            unknown,
            plan: None,
        }
    }

    fn with_plan(schema: SchemaRef, unknown: Unknown) -> Self {
        let plan = QueryPlan::derive(&schema);
        Self {
            schema,
            unknown,
            plan: Some(plan),
        }
    }
}

/// Filter over uploaded files in a multipart body.
#[derive(Debug, Clone, Default)]
pub struct UploadParser {
    names: Vec<String>,
    required: bool,
    description: Option<String>,
}

impl UploadParser {
    /// Require at least one matching file.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a description for documentation output.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Accepted field names, sorted; empty means any field.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True when at least one file must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The documentation description, if set.
    #[must_use]
    pub fn doc_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn select(&self, form: &ParsedForm) -> Result<Vec<UploadedFile>, ValidationError> {
        let files: Vec<UploadedFile> = form
            .files()
            .iter()
            .filter(|file| self.names.is_empty() || self.names.iter().any(|n| n == file.field_name()))
            .cloned()
            .collect();
        if self.required && files.is_empty() {
            return Err(ValidationError::single("form", "Missing required file"));
        }
        Ok(files)
    }
}

impl From<UploadParser> for Parser {
    fn from(parser: UploadParser) -> Self {
        Self::Upload(parser)
    }
}

/// The closed set of request parsers.
#[derive(Debug, Clone)]
pub enum Parser {
    /// Routed path parameters, synchronous.
    Path(SchemaParser),
    /// Query string, synchronous.
    Query(SchemaParser),
    /// Request headers, synchronous.
    Header(SchemaParser),
    /// JSON body, asynchronous.
    Json(SchemaParser),
    /// Form fields, asynchronous.
    Form(SchemaParser),
    /// Uploaded files, asynchronous.
    Upload(UploadParser),
}

/// Bind `S` to the routed path parameters.
#[must_use]
pub fn path<S: SchemaType>() -> Parser {
    Parser::Path(SchemaParser::new(schema_of::<S>(), Unknown::Exclude))
}

/// Bind `S` to the query string.
#[must_use]
pub fn query<S: SchemaType>() -> Parser {
    Parser::Query(SchemaParser::with_plan(schema_of::<S>(), Unknown::Exclude))
}

/// Bind `S` to the request headers.
#[must_use]
pub fn header<S: SchemaType>() -> Parser {
    Parser::Header(SchemaParser::new(schema_of::<S>(), Unknown::Exclude))
}

/// Bind `S` to a JSON request body.
#[must_use]
pub fn json<S: SchemaType>() -> Parser {
    Parser::Json(SchemaParser::new(schema_of::<S>(), Unknown::Exclude))
}

/// Bind `S` to form fields (urlencoded or multipart).
#[must_use]
pub fn form<S: SchemaType>() -> Parser {
    Parser::Form(SchemaParser::new(schema_of::<S>(), Unknown::Exclude))
}

/// Bind uploaded files, optionally restricted to the named fields.
#[must_use]
pub fn upload<I, S>(names: I) -> UploadParser
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
    names.sort();
    UploadParser {
        names,
        required: false,
        description: None,
    }
}

impl Parser {
    /// Override the unknown-key policy of a schema-backed parser.
    #[must_use]
    pub fn unknown(mut self, unknown: Unknown) -> Self {
        match &mut self {
            Self::Path(p) | Self::Query(p) | Self::Header(p) | Self::Json(p) | Self::Form(p) => {
                p.unknown = unknown;
            }
            Self::Upload(_) => {}
        }
        self
    }

    /// The request location this parser reads.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Self::Path(_) => Location::Path,
            Self::Query(_) => Location::Query,
            Self::Header(_) => Location::Header,
            Self::Json(_) => Location::Body,
            Self::Form(_) | Self::Upload(_) => Location::FormData,
        }
    }

    /// The request media type this parser consumes, when it reads the body.
    #[must_use]
    pub fn media_type(&self) -> Option<&'static str> {
        match self {
            Self::Json(_) => Some("application/json"),
            Self::Form(_) | Self::Upload(_) => Some("multipart/form-data"),
            _ => None,
        }
    }

    /// True when parsing must await the request body.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Json(_) | Self::Form(_) | Self::Upload(_))
    }

    /// The bound schema, absent for upload parsers.
    #[must_use]
    pub fn schema(&self) -> Option<&SchemaRef> {
        match self {
            Self::Path(p) | Self::Query(p) | Self::Header(p) | Self::Json(p) | Self::Form(p) => {
                Some(&p.schema)
            }
            Self::Upload(_) => None,
        }
    }

    /// The upload filter, when this is an upload parser.
    #[must_use]
    pub fn upload(&self) -> Option<&UploadParser> {
        match self {
            Self::Upload(p) => Some(p),
            _ => None,
        }
    }

    /// Run a synchronous parser against request metadata.
    ///
    /// # Panics
    ///
    /// Panics when called on an asynchronous variant; the aggregate splits
    /// bindings by [`is_async`](Self::is_async) at declaration time.
    pub(crate) fn parse_sync(&self, request: &Request) -> Result<BoundValue, Error> {
        let value = match self {
            Self::Path(p) => {
                let raw = path_object(request);
                p.schema.load(&raw, p.unknown)?
            }
            Self::Query(p) => {
                let query = request.uri().query().unwrap_or_default();
                let raw = p
                    .plan
                    .as_ref()
                    .map_or_else(|| Ok(Value::Object(Map::new())), |plan| plan.collect(query))?;
                p.schema.load(&raw, p.unknown)?
            }
            Self::Header(p) => {
                let raw = header_object(request);
                p.schema.load(&raw, p.unknown)?
            }
            _ => unreachable!("async parser bound to the sync phase"),
        };
        Ok(BoundValue::Value(value))
    }

    /// Run an asynchronous parser, consuming the request body as needed.
    pub(crate) async fn parse_async(&self, request: &mut Request) -> Result<BoundValue, Error> {
        match self {
            Self::Json(p) => {
                let body = core::mem::replace(request.body_mut(), http_kit::Body::empty());
                let bytes = body
                    .into_bytes()
                    .await
                    .map_err(|e| DecodeError::new(format!("Invalid json body: {e}")))?;
                let raw = if bytes.is_empty() {
                    Value::Object(Map::new())
                } else {
                    serde_json::from_slice(&bytes)
                        .map_err(|_| DecodeError::new("Invalid json body"))?
                };
                Ok(BoundValue::Value(p.schema.load(&raw, p.unknown)?))
            }
            Self::Form(p) => {
                let form = form_of(request).await?;
                let mut raw = Map::new();
                // Repeated fields keep the last value, like an HTML form post.
                for (name, value) in form.fields() {
                    raw.insert(name.clone(), Value::from(value.as_str()));
                }
                Ok(BoundValue::Value(p.schema.load(&Value::Object(raw), p.unknown)?))
            }
            Self::Upload(p) => {
                let form = form_of(request).await?;
                Ok(BoundValue::Files(p.select(&form)?))
            }
            _ => self.parse_sync(request),
        }
    }
}

fn path_object(request: &Request) -> Value {
    let mut raw = Map::new();
    if let Some(params) = request.extensions().get::<PathParams>() {
        for (name, value) in params.iter() {
            raw.insert(name.clone(), Value::from(value.as_str()));
        }
    }
    Value::Object(raw)
}

fn header_object(request: &Request) -> Value {
    let mut raw = Map::new();
    for (name, value) in request.headers() {
        if raw.contains_key(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            raw.insert(name.as_str().to_owned(), Value::from(value));
        }
    }
    Value::Object(raw)
}
