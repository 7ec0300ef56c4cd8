//! OpenAPI document generation over a route tree.
//!
//! [`ApiDocs::attach`] snapshots the tree (handlers are `Arc`s, so the clone
//! is cheap) and appends a documentation endpoint. The document itself is
//! assembled on the first request to that endpoint and cached for the life
//! of the router; route tables do not change after startup.

use std::sync::{Arc, OnceLock};

use futures_core::future::BoxFuture;
use http_kit::header::{HeaderValue, CONTENT_TYPE};
use http_kit::{Body, Method, Request, Response};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::routing::{Handler, Route, RouteNode};

mod operation;
mod schema;

use operation::operation_object;
use schema::Definitions;

/// The OpenAPI document flavor to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenApiVersion {
    /// Swagger 2.0.
    #[default]
    V2,
    /// OpenAPI 3.0.
    V3,
}

impl OpenApiVersion {
    fn ref_prefix(self) -> &'static str {
        match self {
            Self::V2 => "#/definitions/",
            Self::V3 => "#/components/schemas/",
        }
    }
}

/// Documentation endpoint configuration.
#[derive(Debug, Clone)]
pub struct ApiDocs {
    title: String,
    version: String,
    openapi_version: OpenApiVersion,
    schemes: Vec<String>,
    base_path: String,
    route_path: String,
    add_head_methods: bool,
}

impl ApiDocs {
    /// Start configuring a documentation endpoint titled `title`.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: "0.0.1".to_owned(),
            openapi_version: OpenApiVersion::V2,
            schemes: vec!["http".to_owned(), "https".to_owned()],
            base_path: "/".to_owned(),
            route_path: "/apidocs.json".to_owned(),
            add_head_methods: false,
        }
    }

    /// Set the documented API version (`0.0.1` by default).
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Choose the OpenAPI flavor (Swagger 2.0 by default).
    #[must_use]
    pub fn openapi_version(mut self, version: OpenApiVersion) -> Self {
        self.openapi_version = version;
        self
    }

    /// Replace the advertised schemes (`http`, `https` by default).
    #[must_use]
    pub fn schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the advertised base path.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Move the documentation endpoint (`/apidocs.json` by default).
    #[must_use]
    pub fn route_path(mut self, path: impl Into<String>) -> Self {
        self.route_path = path.into();
        self
    }

    /// Document HEAD routes too (skipped by default).
    #[must_use]
    pub fn add_head_methods(mut self) -> Self {
        self.add_head_methods = true;
        self
    }

    /// Snapshot `route` and append the documentation endpoint to it.
    ///
    /// The snapshot covers everything mounted so far; the documentation
    /// endpoint itself never appears in the document.
    #[must_use]
    pub fn attach(self, route: Route) -> Route {
        let path = self.route_path.clone();
        let state = Arc::new(DocsState {
            config: self,
            snapshot: route.clone(),
            cache: OnceLock::new(),
        });
        route.with(RouteNode::handler(path, Method::GET, DocsHandler { state }))
    }
}

#[derive(Debug)]
struct DocsState {
    config: ApiDocs,
    snapshot: Route,
    cache: OnceLock<Value>,
}

#[derive(Debug, Clone)]
struct DocsHandler {
    state: Arc<DocsState>,
}

impl Handler for DocsHandler {
    fn call<'r>(&'r self, _request: &'r mut Request) -> BoxFuture<'r, Result<Response>> {
        Box::pin(async move {
            let document = self.state.cache.get_or_init(|| {
                tracing::info!(title = %self.state.config.title, "assembling openapi document");
                assemble(&self.state.config, &self.state.snapshot)
            });

            let mut response = Response::new(Body::from_bytes(
                serde_json::to_vec(document).unwrap_or_default(),
            ));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Ok(response)
        })
    }
}

fn assemble(config: &ApiDocs, snapshot: &Route) -> Value {
    let mut definitions = Definitions::new(config.openapi_version);
    let mut paths = Map::new();
    walk(snapshot, "", config, &mut paths, &mut definitions);

    let mut document = Map::new();
    match config.openapi_version {
        OpenApiVersion::V2 => {
            document.insert("swagger".to_owned(), json!("2.0"));
        }
        OpenApiVersion::V3 => {
            document.insert("openapi".to_owned(), json!("3.0.2"));
        }
    }
    document.insert(
        "info".to_owned(),
        json!({ "title": config.title, "version": config.version }),
    );
    if config.openapi_version == OpenApiVersion::V2 {
        document.insert("basePath".to_owned(), json!(config.base_path));
        document.insert("schemes".to_owned(), json!(config.schemes));
    }
    document.insert("paths".to_owned(), Value::Object(paths));

    let components: Map<String, Value> = definitions
        .into_map()
        .into_iter()
        .collect();
    match config.openapi_version {
        OpenApiVersion::V2 => {
            document.insert("definitions".to_owned(), Value::Object(components));
        }
        OpenApiVersion::V3 => {
            document.insert(
                "components".to_owned(),
                json!({ "schemas": components }),
            );
        }
    }
    Value::Object(document)
}

fn walk(
    route: &Route,
    prefix: &str,
    config: &ApiDocs,
    paths: &mut Map<String, Value>,
    definitions: &mut Definitions,
) {
    for node in route.nodes() {
        let path = format!("{}{}", prefix, node.path());
        if let Some(mounted) = node.mounted() {
            walk(mounted, &path, config, paths, definitions);
            continue;
        }

        let Some(endpoint) = node.endpoint_node() else {
            continue;
        };
        if !endpoint.is_documented() {
            continue;
        }
        if *endpoint.method() == Method::HEAD && !config.add_head_methods {
            continue;
        }
        let Some(meta) = endpoint.docs() else {
            continue;
        };

        let operation = operation_object(meta, config.openapi_version, definitions);
        let entry = paths
            .entry(convert_path(&path))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert(endpoint.method().as_str().to_lowercase(), operation);
        }
    }
}

/// Normalize route templates to plain `{name}` placeholders.
fn convert_path(path: &str) -> String {
    path.split('/')
        .map(convert_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn convert_segment(segment: &str) -> String {
    if let Some(name) = segment.strip_prefix(':') {
        return format!("{{{name}}}");
    }
    if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let name = inner
            .trim_start_matches('*')
            .split(':')
            .next()
            .unwrap_or(inner);
        return format!("{{{name}}}");
    }
    segment.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_templates_normalize() {
        assert_eq!(convert_path("/users/{user_id:int}"), "/users/{user_id}");
        assert_eq!(convert_path("/users/:name"), "/users/{name}");
        assert_eq!(convert_path("/files/{*path}"), "/files/{path}");
        assert_eq!(convert_path("/plain/path"), "/plain/path");
    }
}
