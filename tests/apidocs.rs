//! OpenAPI document generation over a routed application.

use http_kit::Endpoint as _;
use martlet::{
    json, path, query, upload, ApiDocs, Args, Endpoint, EndpointMeta, ErrorSpec, Field, FieldKind,
    Method, OpenApiVersion, Operation, Result, Route, RouteNode, Router, Schema, SchemaType,
    StatusCode,
};
use serde_json::{json as json_value, Value};

struct IdPath;

impl SchemaType for IdPath {
    fn schema() -> Schema {
        Schema::builder()
            .name("IdPath")
            .field(Field::integer("id").required())
            .build()
    }
}

struct BodySchema;

impl SchemaType for BodySchema {
    fn schema() -> Schema {
        Schema::builder()
            .name("BodySchema")
            .field(Field::string("name"))
            .field(Field::string("email"))
            .build()
    }
}

struct CreateUserResponse;

impl SchemaType for CreateUserResponse {
    fn schema() -> Schema {
        Schema::builder()
            .name("CreateUserResponse")
            .field(Field::integer("id").dump_only())
            .field(Field::string("name"))
            .field(Field::string("email"))
            .build()
    }
}

struct SearchQuery;

impl SchemaType for SearchQuery {
    fn schema() -> Schema {
        Schema::builder()
            .name("SearchQuery")
            .field(Field::string("q"))
            .build()
    }
}

struct ItemsQuery;

impl SchemaType for ItemsQuery {
    fn schema() -> Schema {
        Schema::builder()
            .name("ItemsQuery")
            .field(Field::list("id", FieldKind::Integer))
            .build()
    }
}

struct ItemsModel;

impl SchemaType for ItemsModel {
    fn schema() -> Schema {
        Schema::builder()
            .name("ItemsModel")
            .field(Field::list("items", FieldKind::Raw))
            .build()
    }
}

#[derive(Default)]
struct CreateUser;

impl Endpoint for CreateUser {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("path", path::<IdPath>())
            .bind("body", json::<BodySchema>())
            .response::<CreateUserResponse>()
            .status(StatusCode::CREATED)
            .operation(Operation::new().tag("users").description("create user"))
            .build()
    }

    async fn execute(&mut self, args: Args) -> Result<Value> {
        Ok(args.value("body").cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct SearchUser;

impl Endpoint for SearchUser {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("path", path::<IdPath>())
            .bind("query", query::<SearchQuery>())
            .build()
    }

    async fn execute(&mut self, _args: Args) -> Result<Value> {
        Ok(json_value!({}))
    }
}

#[derive(Default)]
struct GetItemsEcho;

impl Endpoint for GetItemsEcho {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("query", query::<ItemsQuery>())
            .response::<ItemsModel>()
            .operation(Operation::new().tag("items").description("get items"))
            .build()
    }

    async fn execute(&mut self, _args: Args) -> Result<Value> {
        Ok(json_value!({"items": []}))
    }
}

#[derive(Default)]
struct UploadDocument;

impl Endpoint for UploadDocument {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind(
                "files",
                upload(["doc"]).required().description("the document"),
            )
            .operation(
                Operation::new()
                    .tag("documents")
                    .error(ErrorSpec::new(404, "owner not found")),
            )
            .build()
    }

    async fn execute(&mut self, _args: Args) -> Result<Value> {
        Ok(json_value!({}))
    }
}

async fn fetch_docs(route: Route) -> Value {
    let mut router = Router::build(&route).expect("route tree should build");
    let mut request = http_kit::Request::new(http_kit::Body::empty());
    *request.uri_mut() = "http://localhost/apidocs.json".parse().unwrap();

    let mut response = router.respond(&mut request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = core::mem::replace(response.body_mut(), http_kit::Body::empty());
    serde_json::from_slice(&body.into_bytes().await.unwrap()).unwrap()
}

#[tokio::test]
async fn generates_a_v2_document() {
    let route = Route::new(vec![RouteNode::endpoint::<CreateUser>(
        "/users/{id}",
        Method::POST,
    )]);
    let docs = ApiDocs::new("test").attach(route);
    let body = fetch_docs(docs).await;

    assert_eq!(body["swagger"], json_value!("2.0"));
    assert_eq!(body["info"], json_value!({"title": "test", "version": "0.0.1"}));
    assert_eq!(body["basePath"], json_value!("/"));
    assert_eq!(body["schemes"], json_value!(["http", "https"]));

    assert_eq!(
        body["paths"],
        json_value!({
            "/users/{id}": {
                "post": {
                    "tags": ["users"],
                    "description": "create user",
                    "produces": ["application/json"],
                    "parameters": [
                        {"in": "path", "name": "id", "required": true,
                         "type": "integer", "format": "int32"},
                        {"in": "body", "name": "body", "required": false,
                         "schema": {"$ref": "#/definitions/BodySchema"}}
                    ],
                    "responses": {
                        "201": {"schema": {"$ref": "#/definitions/CreateUserResponse"}},
                        "400": {"description": "Bad request"}
                    }
                }
            }
        })
    );

    assert_eq!(
        body["definitions"],
        json_value!({
            "BodySchema": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "email": {"type": "string"}
                }
            },
            "CreateUserResponse": {
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "format": "int32"},
                    "name": {"type": "string"},
                    "email": {"type": "string"}
                }
            }
        })
    );
}

#[tokio::test]
async fn mounts_concatenate_prefixes() {
    let route = Route::new(vec![RouteNode::mount(
        "/v1",
        Route::new(vec![
            RouteNode::endpoint::<CreateUser>("/users/{id}", Method::POST),
            RouteNode::endpoint::<SearchUser>("/users/{id}", Method::GET),
        ]),
    )]);
    let body = fetch_docs(ApiDocs::new("test").attach(route)).await;

    let path = &body["paths"]["/v1/users/{id}"];
    assert_eq!(path["post"]["tags"], json_value!(["users"]));
    assert_eq!(path["get"]["tags"], json_value!(["default"]));
    assert_eq!(
        path["get"]["parameters"],
        json_value!([
            {"in": "path", "name": "id", "required": true,
             "type": "integer", "format": "int32"},
            {"in": "query", "name": "q", "required": false, "type": "string"}
        ])
    );
    assert_eq!(
        path["get"]["responses"],
        json_value!({"400": {"description": "Bad request"}})
    );
}

#[tokio::test]
async fn list_query_params_expand_as_multi_arrays() {
    let route = Route::new(vec![RouteNode::endpoint::<GetItemsEcho>(
        "/items",
        Method::GET,
    )]);
    let body = fetch_docs(ApiDocs::new("test").attach(route)).await;

    assert_eq!(
        body["paths"]["/items"]["get"]["parameters"],
        json_value!([
            {"in": "query", "name": "id", "required": false,
             "collectionFormat": "multi", "type": "array",
             "items": {"type": "integer", "format": "int32"}}
        ])
    );
    assert_eq!(
        body["paths"]["/items"]["get"]["responses"]["200"],
        json_value!({"schema": {"$ref": "#/definitions/ItemsModel"}})
    );
}

#[tokio::test]
async fn upload_params_and_declared_404_suppress_the_fallback() {
    let route = Route::new(vec![RouteNode::endpoint::<UploadDocument>(
        "/documents",
        Method::POST,
    )]);
    let body = fetch_docs(ApiDocs::new("test").attach(route)).await;

    let operation = &body["paths"]["/documents"]["post"];
    assert_eq!(
        operation["parameters"],
        json_value!([
            {"in": "formData", "type": "file", "description": "the document",
             "name": "doc", "required": true}
        ])
    );
    assert_eq!(
        operation["responses"],
        json_value!({"404": {"description": "owner not found"}})
    );
}

#[tokio::test]
async fn hidden_routes_and_the_docs_route_are_excluded() {
    let route = Route::new(vec![
        RouteNode::endpoint::<GetItemsEcho>("/items", Method::GET),
        RouteNode::endpoint::<SearchUser>("/internal/{id}", Method::GET).hide(),
    ]);
    let body = fetch_docs(ApiDocs::new("test").attach(route)).await;

    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/items"));
    assert!(!paths.contains_key("/internal/{id}"));
    assert!(!paths.contains_key("/apidocs.json"));
}

#[tokio::test]
async fn hiding_a_mount_hides_its_whole_subtree() {
    let route = Route::new(vec![
        RouteNode::endpoint::<GetItemsEcho>("/items", Method::GET),
        RouteNode::mount(
            "/admin",
            Route::new(vec![
                RouteNode::endpoint::<SearchUser>("/users/{id}", Method::GET),
                RouteNode::mount(
                    "/audit",
                    Route::new(vec![RouteNode::endpoint::<GetItemsEcho>(
                        "/log",
                        Method::GET,
                    )]),
                ),
            ]),
        )
        .hide(),
    ]);
    let body = fetch_docs(ApiDocs::new("test").attach(route)).await;

    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/items"));
    assert!(!paths.contains_key("/admin/users/{id}"));
    assert!(!paths.contains_key("/admin/audit/log"));
}

#[tokio::test]
async fn head_methods_are_skipped_by_default() {
    let route = Route::new(vec![
        RouteNode::endpoint::<GetItemsEcho>("/items", Method::GET),
        RouteNode::endpoint::<GetItemsEcho>("/items", Method::HEAD),
    ]);
    let body = fetch_docs(ApiDocs::new("test").attach(route.clone())).await;
    let methods = body["paths"]["/items"].as_object().unwrap();
    assert!(methods.contains_key("get"));
    assert!(!methods.contains_key("head"));

    let body = fetch_docs(ApiDocs::new("test").add_head_methods().attach(route)).await;
    let methods = body["paths"]["/items"].as_object().unwrap();
    assert!(methods.contains_key("head"));
}

#[tokio::test]
async fn v3_documents_use_request_body_and_components() {
    let route = Route::new(vec![RouteNode::endpoint::<CreateUser>(
        "/users/{id}",
        Method::POST,
    )]);
    let docs = ApiDocs::new("test")
        .openapi_version(OpenApiVersion::V3)
        .attach(route);
    let body = fetch_docs(docs).await;

    assert_eq!(body["openapi"], json_value!("3.0.2"));
    let operation = &body["paths"]["/users/{id}"]["post"];
    assert_eq!(
        operation["requestBody"],
        json_value!({
            "content": {
                "application/json": {
                    "schema": {"$ref": "#/components/schemas/BodySchema"}
                }
            }
        })
    );
    assert_eq!(
        operation["parameters"],
        json_value!([
            {"in": "path", "name": "id", "required": true,
             "schema": {"type": "integer", "format": "int32"}}
        ])
    );
    assert!(body["components"]["schemas"]
        .as_object()
        .unwrap()
        .contains_key("CreateUserResponse"));
}

#[tokio::test]
async fn document_is_cached_across_requests() {
    let route = Route::new(vec![RouteNode::endpoint::<GetItemsEcho>(
        "/items",
        Method::GET,
    )]);
    let attached = ApiDocs::new("test").attach(route);
    let mut router = Router::build(&attached).unwrap();

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let mut request = http_kit::Request::new(http_kit::Body::empty());
        *request.uri_mut() = "http://localhost/apidocs.json".parse().unwrap();
        let mut response = router.respond(&mut request).await.unwrap();
        let body = core::mem::replace(response.body_mut(), http_kit::Body::empty());
        let value: Value = serde_json::from_slice(&body.into_bytes().await.unwrap()).unwrap();
        bodies.push(value);
    }
    assert_eq!(bodies[0], bodies[1]);
}
