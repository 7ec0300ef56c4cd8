//! Endpoint declarations, the metadata registry and the request dispatcher.
//!
//! An endpoint type declares everything about itself once, in
//! [`Endpoint::metadata`]: its bindings, its response schema, its serializer
//! and status, and its documentation descriptor. [`metadata_of`] caches the
//! declaration per process however many routes point at the type; every
//! request after that works off the same `&'static` metadata.

use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Mutex, OnceLock, PoisonError};

use http_kit::{Request, Response, StatusCode};
use serde_json::Value;

use crate::binding::{AggregateBuilder, Args, ParamGroup, ParserAggregate};
use crate::error::Result;
use crate::operation::Operation;
use crate::parser::Parser;
use crate::render::{RenderChain, Rendered};
use crate::routing::Handler;
use crate::schema::{schema_of, SchemaRef, SchemaType};
use crate::serializer::{self, Serializer};

/// A request handler declared as a type.
///
/// `Default` gives the dispatcher a fresh instance per request, which is the
/// unit of request isolation: an endpoint holding only per-request state
/// needs no synchronization at all.
pub trait Endpoint: Default + Send + Sync + 'static {
    /// Declare bindings, response shape and documentation. The result is
    /// cached per process by [`metadata_of`].
    fn metadata() -> EndpointMeta;

    /// Handle one request's resolved arguments.
    fn execute(&mut self, args: Args) -> impl Future<Output = Result<Value>> + Send;
}

/// Everything declared about an endpoint type.
#[derive(Debug)]
pub struct EndpointMeta {
    aggregate: ParserAggregate,
    response_schema: Option<SchemaRef>,
    operation: Operation,
    serializer: Serializer,
    status: StatusCode,
    chain: RenderChain,
}

impl EndpointMeta {
    /// Start declaring metadata.
    #[must_use]
    pub fn builder() -> MetaBuilder {
        MetaBuilder::default()
    }

    /// The endpoint's binding set.
    #[must_use]
    pub fn aggregate(&self) -> &ParserAggregate {
        &self.aggregate
    }

    /// The declared response schema, if any.
    #[must_use]
    pub fn response_schema(&self) -> Option<&SchemaRef> {
        self.response_schema.as_ref()
    }

    /// The documentation descriptor.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The wire serializer.
    #[must_use]
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// The success status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Every bound parser in resolution order, groups flattened.
    pub(crate) fn parsers(&self) -> Vec<&Parser> {
        self.aggregate.parsers()
    }
}

/// Fluent declaration of an [`EndpointMeta`].
#[derive(Debug)]
pub struct MetaBuilder {
    bindings: AggregateBuilder,
    response_schema: Option<SchemaRef>,
    operation: Operation,
    serializer: Serializer,
    status: StatusCode,
}

impl Default for MetaBuilder {
    fn default() -> Self {
        Self {
            bindings: AggregateBuilder::default(),
            response_schema: None,
            operation: Operation::default(),
            serializer: serializer::json(),
            status: StatusCode::OK,
        }
    }
}

impl MetaBuilder {
    /// Bind a parser under `name`.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, parser: impl Into<Parser>) -> Self {
        self.bindings = self.bindings.bind(name, parser);
        self
    }

    /// Bind the parameter group `G` under `name`.
    #[must_use]
    pub fn group<G: ParamGroup>(mut self, name: impl Into<String>) -> Self {
        self.bindings = self.bindings.group::<G>(name);
        self
    }

    /// Declare the response schema.
    #[must_use]
    pub fn response<S: SchemaType>(mut self) -> Self {
        self.response_schema = Some(schema_of::<S>());
        self
    }

    /// Attach the documentation descriptor.
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    /// Replace the default JSON serializer.
    #[must_use]
    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Set the success status (200 by default).
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Finalize the metadata, fixing the render chain.
    #[must_use]
    pub fn build(self) -> EndpointMeta {
        let mut chain = RenderChain::default();
        if let Some(schema) = &self.response_schema {
            chain = chain.dump(schema.clone());
        }
        chain = chain.encode(self.serializer, self.status);

        EndpointMeta {
            aggregate: self.bindings.build(),
            response_schema: self.response_schema,
            operation: self.operation,
            serializer: self.serializer,
            status: self.status,
            chain,
        }
    }
}

static REGISTRY: OnceLock<Mutex<HashMap<TypeId, &'static EndpointMeta>>> = OnceLock::new();

/// The process-wide metadata of endpoint type `E`, built on first use.
#[must_use]
pub fn metadata_of<E: Endpoint>() -> &'static EndpointMeta {
    let registry = REGISTRY.get_or_init(Mutex::default);
    let key = TypeId::of::<E>();
    if let Some(meta) = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return meta;
    }

    // The declaration runs outside the lock: a metadata declaration may
    // consult another endpoint's metadata, and holding the lock here would
    // re-enter it. A racing duplicate build loses the insert.
    let meta: &'static EndpointMeta = Box::leak(Box::new(E::metadata()));
    *registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(meta)
}

/// Sequences one request through parse, execute and render.
pub struct Dispatcher<'r, E: Endpoint> {
    request: &'r mut Request,
    endpoint: E,
}

impl<E: Endpoint> std::fmt::Debug for Dispatcher<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoint", &std::any::type_name::<E>())
            .finish_non_exhaustive()
    }
}

impl<'r, E: Endpoint> Dispatcher<'r, E> {
    /// Build a dispatcher for one request, with a fresh endpoint instance.
    pub fn new(request: &'r mut Request) -> Self {
        Self {
            request,
            endpoint: E::default(),
        }
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Propagates parse, handler and render failures untouched.
    pub async fn dispatch(mut self) -> Result<Response> {
        let meta = metadata_of::<E>();
        let args = meta.aggregate.parse(self.request).await?;
        let content = self.endpoint.execute(args).await?;
        match meta.chain.render(content)? {
            Rendered::Response(response) => Ok(response),
            Rendered::Content(content) => {
                crate::render::encode_response(meta.serializer, meta.status, &content)
            }
        }
    }
}

/// The route-facing handler for endpoint type `E`.
///
/// Stateless: every call builds a fresh [`Dispatcher`].
pub struct EndpointHandler<E: Endpoint> {
    _marker: PhantomData<fn() -> E>,
}

impl<E: Endpoint> std::fmt::Debug for EndpointHandler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandler")
            .field("endpoint", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: Endpoint> Handler for EndpointHandler<E> {
    fn call<'r>(
        &'r self,
        request: &'r mut Request,
    ) -> futures_core::future::BoxFuture<'r, Result<Response>> {
        Box::pin(Dispatcher::<E>::new(request).dispatch())
    }
}

/// Create the handler object for endpoint type `E`.
#[must_use]
pub fn endpoint<E: Endpoint>() -> EndpointHandler<E> {
    EndpointHandler {
        _marker: PhantomData,
    }
}
