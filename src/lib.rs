#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

//! Declarative request binding and OpenAPI generation on top of `http-kit`.
//!
//! An endpoint is a type: it declares its request bindings, response schema
//! and documentation once in [`Endpoint::metadata`], and handles resolved
//! arguments in [`Endpoint::execute`]. The routing layer dispatches requests
//! through the shared metadata, and [`ApiDocs`] walks the same route tree to
//! serve a cached OpenAPI document.

pub mod binding;
pub mod docs;
pub mod endpoint;
pub mod error;
pub mod operation;
pub mod parser;
pub mod render;
pub mod routing;
pub mod schema;
pub mod serializer;

#[doc(inline)]
pub use binding::{AggregateBuilder, Args, BoundValue, ParamGroup, ParserAggregate};
#[doc(inline)]
pub use docs::{ApiDocs, OpenApiVersion};
#[doc(inline)]
pub use endpoint::{
    endpoint, metadata_of, Dispatcher, Endpoint, EndpointHandler, EndpointMeta, MetaBuilder,
};
#[doc(inline)]
pub use error::{DecodeError, DumpError, Error, Result, SchemaTypeError, ValidationError};
#[doc(inline)]
pub use operation::{ErrorSpec, Operation};
#[doc(inline)]
pub use parser::{
    form, header, json, path, query, upload, Location, ParsedForm, Parser, UploadParser,
    UploadedFile,
};
#[doc(inline)]
pub use render::{RenderChain, Rendered};
#[doc(inline)]
pub use routing::{Handler, PathParams, Route, RouteBuildError, RouteNode, Router};
#[doc(inline)]
pub use schema::{schema_of, Field, FieldKind, Schema, SchemaBuilder, SchemaRef, SchemaType, Unknown};
#[doc(inline)]
pub use serializer::Serializer;

#[doc(inline)]
pub use http_kit::{Body, Method, Request, Response, StatusCode};
