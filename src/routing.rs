//! Route tree and request router.
//!
//! Routes form a tree of mounts and endpoint nodes; [`Router::build`]
//! flattens the tree into a `matchit` trie, concatenating mount prefixes and
//! rejecting duplicate path/method pairs. Handlers are shared `Arc`s, which
//! keeps the tree cheap to clone; the documentation subsystem relies on that
//! to snapshot it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures_core::future::BoxFuture;
use http_kit::{Body, Method, Request, Response, StatusCode};
use matchit::Match;
use serde_json::json;

use crate::endpoint::{endpoint, metadata_of, Endpoint, EndpointMeta};
use crate::error::{Error, Result};

/// A request handler stored in the route tree.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn call<'r>(&'r self, request: &'r mut Request) -> BoxFuture<'r, Result<Response>>;
}

/// Routed path parameters, inserted into the request extensions.
#[derive(Debug, Clone, Default)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub(crate) const fn new(params: Vec<(String, String)>) -> Self {
        Self(params)
    }

    /// Get a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find_map(|(k, v)| if k == name { Some(v.as_str()) } else { None })
    }

    /// Iterate the parameters in match order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

/// Collection of route nodes anchored at a path prefix.
#[derive(Debug, Clone, Default)]
pub struct Route {
    /// All nodes that hang off the route's mount point.
    nodes: Vec<RouteNode>,
}

/// A single node in the routing tree.
#[derive(Debug, Clone)]
pub struct RouteNode {
    path: String,
    kind: RouteNodeKind,
}

#[derive(Debug, Clone)]
enum RouteNodeKind {
    Mount(Route),
    Endpoint(EndpointNode),
}

#[derive(Clone)]
pub(crate) struct EndpointNode {
    handler: Arc<dyn Handler>,
    method: Method,
    docs: Option<&'static EndpointMeta>,
    include_in_docs: bool,
}

impl fmt::Debug for EndpointNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointNode")
            .field("method", &self.method)
            .field("include_in_docs", &self.include_in_docs)
            .finish()
    }
}

impl Route {
    /// Build a route from pre-constructed nodes.
    #[must_use]
    pub fn new(nodes: Vec<RouteNode>) -> Self {
        Self { nodes }
    }

    /// Append a node.
    #[must_use]
    pub fn with(mut self, node: RouteNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub(crate) fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }
}

impl RouteNode {
    /// An endpoint node for endpoint type `E`, documented by its metadata.
    #[must_use]
    pub fn endpoint<E: Endpoint>(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            kind: RouteNodeKind::Endpoint(EndpointNode {
                handler: Arc::new(endpoint::<E>()),
                method,
                docs: Some(metadata_of::<E>()),
                include_in_docs: true,
            }),
        }
    }

    /// An endpoint node for a bare handler, absent from documentation.
    #[must_use]
    pub fn handler(path: impl Into<String>, method: Method, handler: impl Handler) -> Self {
        Self {
            path: path.into(),
            kind: RouteNodeKind::Endpoint(EndpointNode {
                handler: Arc::new(handler),
                method,
                docs: None,
                include_in_docs: false,
            }),
        }
    }

    /// A nested route mounted under `path`.
    #[must_use]
    pub fn mount(path: impl Into<String>, route: Route) -> Self {
        Self {
            path: path.into(),
            kind: RouteNodeKind::Mount(route),
        }
    }

    /// Exclude this node (and, for mounts, everything under it) from
    /// documentation.
    #[must_use]
    pub fn hide(mut self) -> Self {
        self.hide_in_place();
        self
    }

    fn hide_in_place(&mut self) {
        match &mut self.kind {
            RouteNodeKind::Endpoint(node) => node.include_in_docs = false,
            RouteNodeKind::Mount(route) => {
                for node in &mut route.nodes {
                    node.hide_in_place();
                }
            }
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn mounted(&self) -> Option<&Route> {
        match &self.kind {
            RouteNodeKind::Mount(route) => Some(route),
            RouteNodeKind::Endpoint(_) => None,
        }
    }

    pub(crate) fn endpoint_node(&self) -> Option<&EndpointNode> {
        match &self.kind {
            RouteNodeKind::Endpoint(node) => Some(node),
            RouteNodeKind::Mount(_) => None,
        }
    }
}

impl EndpointNode {
    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn docs(&self) -> Option<&'static EndpointMeta> {
        self.docs
    }

    pub(crate) fn is_documented(&self) -> bool {
        self.include_in_docs && self.docs.is_some()
    }
}

/// Error raised while building a router from a route tree.
#[derive(Debug)]
#[non_exhaustive]
pub enum RouteBuildError {
    /// Two endpoint nodes resolve to the same path and method.
    RepeatedMethod {
        /// The conflicting path.
        path: String,
        /// The conflicting method.
        method: Method,
    },
    /// The path could not be inserted into the trie.
    Matchit(matchit::InsertError),
}

impl fmt::Display for RouteBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepeatedMethod { path, method } => {
                write!(f, "method {method} is registered twice at `{path}`")
            }
            Self::Matchit(error) => fmt::Display::fmt(error, f),
        }
    }
}

impl std::error::Error for RouteBuildError {}

impl From<matchit::InsertError> for RouteBuildError {
    fn from(error: matchit::InsertError) -> Self {
        Self::Matchit(error)
    }
}

type FlattenBuf = HashMap<String, Vec<EndpointNode>>;

fn flatten(prefix: &str, route: &Route, buf: &mut FlattenBuf) {
    for node in route.nodes() {
        let path = format!("{}{}", prefix, node.path());
        match &node.kind {
            RouteNodeKind::Mount(route) => flatten(&path, route, buf),
            RouteNodeKind::Endpoint(endpoint) => {
                buf.entry(path).or_default().push(endpoint.clone());
            }
        }
    }
}

/// An HTTP router over a flattened route tree.
///
/// Cheap to clone; the trie and every handler are behind `Arc`s.
#[derive(Clone)]
pub struct Router {
    inner: Arc<matchit::Router<Vec<EndpointNode>>>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl Router {
    /// Flatten `route` into a router.
    ///
    /// # Errors
    ///
    /// Returns [`RouteBuildError`] on duplicate path/method pairs or an
    /// uninsertable path.
    pub fn build(route: &Route) -> std::result::Result<Self, RouteBuildError> {
        let mut buf = HashMap::new();
        flatten("", route, &mut buf);

        let mut router = matchit::Router::new();
        for (path, nodes) in buf {
            let mut seen = HashSet::new();
            for node in &nodes {
                if !seen.insert(node.method().clone()) {
                    return Err(RouteBuildError::RepeatedMethod {
                        path,
                        method: node.method().clone(),
                    });
                }
            }
            router.insert(path, nodes)?;
        }
        Ok(Self {
            inner: Arc::new(router),
        })
    }

    fn search<'s, 'p>(&'s self, path: &'p str, method: &Method) -> Option<Match<'s, 'p, &'s EndpointNode>>
    where
        's: 'p,
    {
        if let Ok(Match { value, params }) = self.inner.at(path) {
            value
                .iter()
                .find(|node| node.method() == method)
                .map(|node| Match { value: node, params })
        } else {
            None
        }
    }

    async fn call(&self, request: &mut Request) -> Result<Response> {
        let path = request.uri().path().to_owned();
        let method = request.method().clone();

        if let Some(Match { value, params }) = self.search(&path, &method) {
            let params: Vec<(String, String)> = params
                .iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect();
            request.extensions_mut().insert(PathParams::new(params));
            value.handler.call(request).await
        } else {
            Err(Error::with_status(StatusCode::NOT_FOUND, "Route not found"))
        }
    }
}

fn error_response(error: &Error) -> Response {
    let status = error.status();
    let class = if status.is_server_error() {
        "server error"
    } else {
        "client error"
    };
    tracing::error!(status = %status, error = %error, "{class}");

    let body = json!({ "errors": error.normalized_messages() });
    let mut response = Response::new(Body::from_bytes(
        serde_json::to_vec(&body).unwrap_or_default(),
    ));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http_kit::header::CONTENT_TYPE,
        http_kit::header::HeaderValue::from_static("application/json"),
    );
    response
}

impl http_kit::Endpoint for Router {
    type Error = Error;

    async fn respond(&mut self, request: &mut Request) -> Result<Response> {
        tracing::info!(method = %request.method(), path = request.uri().path(), "request received");
        Ok(self
            .call(request)
            .await
            .unwrap_or_else(|error| error_response(&error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Args;
    use crate::endpoint::EndpointMeta;
    use crate::parser::path;
    use crate::schema::{Field, Schema, SchemaType};
    use http_kit::Endpoint as _;
    use serde_json::Value;

    struct IdPath;

    impl SchemaType for IdPath {
        fn schema() -> Schema {
            Schema::builder().field(Field::integer("id").required()).build()
        }
    }

    #[derive(Default)]
    struct GetItem;

    impl Endpoint for GetItem {
        fn metadata() -> EndpointMeta {
            EndpointMeta::builder().bind("path", path::<IdPath>()).build()
        }

        async fn execute(&mut self, args: Args) -> Result<Value> {
            Ok(args.value("path").cloned().unwrap_or(Value::Null))
        }
    }

    fn items_route() -> Route {
        Route::new(vec![RouteNode::mount(
            "/items",
            Route::new(vec![RouteNode::endpoint::<GetItem>("/{id}", Method::GET)]),
        )])
    }

    async fn body_json(response: &mut Response) -> Value {
        let body = core::mem::replace(response.body_mut(), Body::empty());
        serde_json::from_slice(&body.into_bytes().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn routes_and_binds_path_params() {
        let mut router = Router::build(&items_route()).unwrap();
        let mut request = Request::new(Body::empty());
        *request.uri_mut() = "http://localhost/items/7".parse().unwrap();

        let mut response = router.respond(&mut request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&mut response).await, json!({"id": 7}));
    }

    #[tokio::test]
    async fn invalid_path_param_renders_field_errors() {
        let mut router = Router::build(&items_route()).unwrap();
        let mut request = Request::new(Body::empty());
        *request.uri_mut() = "http://localhost/items/seven".parse().unwrap();

        let mut response = router.respond(&mut request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&mut response).await,
            json!({"errors": {"id": ["Not a valid integer."]}})
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let mut router = Router::build(&items_route()).unwrap();
        let mut request = Request::new(Body::empty());
        *request.uri_mut() = "http://localhost/nothing".parse().unwrap();

        let response = router.respond(&mut request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_method_is_rejected() {
        let route = Route::new(vec![
            RouteNode::endpoint::<GetItem>("/items/{id}", Method::GET),
            RouteNode::endpoint::<GetItem>("/items/{id}", Method::GET),
        ]);
        assert!(matches!(
            Router::build(&route),
            Err(RouteBuildError::RepeatedMethod { .. })
        ));
    }
}
