//! End-to-end dispatch through the router.

use http_kit::header::{HeaderValue, CONTENT_TYPE};
use http_kit::Endpoint as _;
use martlet::{
    json, path, query, Args, Endpoint, EndpointMeta, ErrorSpec, Field, FieldKind, Method,
    Operation, Result, Route, RouteNode, Router, Schema, SchemaType, StatusCode,
};
use serde_json::{json as json_value, Value};

struct UserIdPath;

impl SchemaType for UserIdPath {
    fn schema() -> Schema {
        Schema::builder()
            .field(Field::integer("id").required())
            .build()
    }
}

struct SearchQuery;

impl SchemaType for SearchQuery {
    fn schema() -> Schema {
        Schema::builder().field(Field::string("q")).build()
    }
}

struct UserBody;

impl SchemaType for UserBody {
    fn schema() -> Schema {
        Schema::builder()
            .field(Field::string("name").required())
            .field(Field::string("email"))
            .build()
    }
}

struct UserResponse;

impl SchemaType for UserResponse {
    fn schema() -> Schema {
        Schema::builder()
            .field(Field::integer("id"))
            .field(Field::string("name"))
            .field(Field::string("email"))
            .build()
    }
}

struct ItemsQuery;

impl SchemaType for ItemsQuery {
    fn schema() -> Schema {
        Schema::builder()
            .field(Field::list("id", FieldKind::Integer))
            .build()
    }
}

struct ItemSchema;

impl SchemaType for ItemSchema {
    fn schema() -> Schema {
        Schema::builder().field(Field::integer("id")).build()
    }
}

struct ItemsModel;

impl SchemaType for ItemsModel {
    fn schema() -> Schema {
        Schema::builder()
            .field(Field::list(
                "items",
                FieldKind::Nested(martlet::schema_of::<ItemSchema>()),
            ))
            .build()
    }
}

#[derive(Default)]
struct SearchUser;

impl Endpoint for SearchUser {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("path", path::<UserIdPath>())
            .bind("query", query::<SearchQuery>())
            .build()
    }

    async fn execute(&mut self, args: Args) -> Result<Value> {
        let mut out = args.value("path").cloned().unwrap_or_default();
        if let (Some(out), Some(query)) = (out.as_object_mut(), args.value("query")) {
            if let Some(object) = query.as_object() {
                out.extend(object.clone());
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
struct CreateUser;

impl Endpoint for CreateUser {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("path", path::<UserIdPath>())
            .bind("body", json::<UserBody>())
            .response::<UserResponse>()
            .status(StatusCode::CREATED)
            .operation(
                Operation::new()
                    .tag("users")
                    .description("create user")
                    .error(ErrorSpec::new(409, "user already exists")),
            )
            .build()
    }

    async fn execute(&mut self, args: Args) -> Result<Value> {
        let mut out = args.value("path").cloned().unwrap_or_default();
        if let (Some(out), Some(body)) = (out.as_object_mut(), args.value("body")) {
            if let Some(object) = body.as_object() {
                out.extend(object.clone());
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
struct GetItemsEcho;

impl Endpoint for GetItemsEcho {
    fn metadata() -> EndpointMeta {
        EndpointMeta::builder()
            .bind("query", query::<ItemsQuery>())
            .response::<ItemsModel>()
            .build()
    }

    async fn execute(&mut self, args: Args) -> Result<Value> {
        let ids = args
            .value("query")
            .and_then(|query| query.get("id"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let items: Vec<Value> = ids.into_iter().map(|id| json_value!({"id": id})).collect();
        Ok(json_value!({ "items": items }))
    }
}

fn app() -> Router {
    let route = Route::new(vec![
        RouteNode::endpoint::<SearchUser>("/users/{id}", Method::GET),
        RouteNode::endpoint::<CreateUser>("/users/{id}", Method::POST),
        RouteNode::endpoint::<GetItemsEcho>("/items", Method::GET),
    ]);
    Router::build(&route).expect("route tree should build")
}

fn get(uri: &str) -> http_kit::Request {
    let mut request = http_kit::Request::new(http_kit::Body::empty());
    *request.uri_mut() = uri.parse().expect("invalid uri");
    request
}

fn post_json(uri: &str, body: &'static str) -> http_kit::Request {
    let mut request = http_kit::Request::new(http_kit::Body::from_bytes(body.as_bytes()));
    *request.method_mut() = Method::POST;
    *request.uri_mut() = uri.parse().expect("invalid uri");
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    request
}

async fn body_json(response: &mut http_kit::Response) -> Value {
    let body = core::mem::replace(response.body_mut(), http_kit::Body::empty());
    serde_json::from_slice(&body.into_bytes().await.expect("readable body"))
        .expect("json response body")
}

#[tokio::test]
async fn search_merges_path_and_query() {
    let mut router = app();
    let mut request = get("http://localhost/users/1?q=Test");
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"id": 1, "q": "Test"})
    );
}

#[tokio::test]
async fn optional_query_can_be_absent() {
    let mut router = app();
    let mut request = get("http://localhost/users/7");
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(&mut response).await, json_value!({"id": 7}));
}

#[tokio::test]
async fn invalid_path_param_is_a_field_error() {
    let mut router = app();
    let mut request = get("http://localhost/users/abc");
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"errors": {"id": ["Not a valid integer."]}})
    );
}

#[tokio::test]
async fn create_user_dumps_through_the_response_schema() {
    let mut router = app();
    let mut request = post_json(
        "http://localhost/users/3",
        r#"{"name": "fry", "email": "fry@example.com"}"#,
    );
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"id": 3, "name": "fry", "email": "fry@example.com"})
    );
}

#[tokio::test]
async fn missing_required_body_field_is_a_field_error() {
    let mut router = app();
    let mut request = post_json("http://localhost/users/3", r#"{"email": "x@example.com"}"#);
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"errors": {"name": ["Missing data for required field."]}})
    );
}

#[tokio::test]
async fn malformed_json_is_a_body_error() {
    let mut router = app();
    let mut request = post_json("http://localhost/users/3", "{broken");
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"errors": {"_body": "Invalid json body"}})
    );
}

#[tokio::test]
async fn multi_value_query_renders_nested_items() {
    let mut router = app();
    let mut request = get("http://localhost/items?id=1&id=2&id=3");
    let mut response = router.respond(&mut request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(&mut response).await,
        json_value!({"items": [{"id": 1}, {"id": 2}, {"id": 3}]})
    );
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let mut router = app();
    let mut request = get("http://localhost/unknown");
    let response = router.respond(&mut request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_not_found() {
    let mut router = app();
    let mut request = get("http://localhost/items");
    *request.method_mut() = Method::DELETE;
    let response = router.respond(&mut request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
