//! Operation-object emission for one documented endpoint.

use serde_json::{json, Map, Value};

use crate::endpoint::EndpointMeta;
use crate::parser::Parser;

use super::schema::Definitions;
use super::OpenApiVersion;

pub(super) fn operation_object(
    meta: &EndpointMeta,
    version: OpenApiVersion,
    definitions: &mut Definitions,
) -> Value {
    let options = meta.operation();
    let mut operation = Map::new();

    operation.insert("tags".to_owned(), json!([options.tag_name()]));
    if let Some(description) = options.doc_description() {
        operation.insert("description".to_owned(), json!(description));
    }
    if let Some(summary) = options.doc_summary() {
        operation.insert("summary".to_owned(), json!(summary));
    }
    operation.insert(
        "produces".to_owned(),
        json!([meta.serializer().media_type()]),
    );

    let mut parameters = non_body_parameters(meta, definitions);
    match version {
        OpenApiVersion::V2 => parameters.extend(body_parameters(meta, definitions)),
        OpenApiVersion::V3 => {
            if let Some(body) = request_body(meta, definitions) {
                operation.insert("requestBody".to_owned(), body);
            }
        }
    }
    operation.insert("parameters".to_owned(), Value::Array(parameters));
    operation.insert("responses".to_owned(), responses(meta, definitions));

    if let Some(security) = options.security_value() {
        operation.insert("security".to_owned(), security.clone());
    }
    if let Some(extra) = options.extra_attributes() {
        operation.extend(extra.clone());
    }

    Value::Object(operation)
}

fn non_body_parameters(meta: &EndpointMeta, definitions: &mut Definitions) -> Vec<Value> {
    let mut parameters = Vec::new();
    for parser in meta.parsers() {
        let location = parser.location();
        if location.is_body() {
            continue;
        }
        if let Some(schema) = parser.schema() {
            for field in schema.fields() {
                if field.is_dump_only() || field.is_constant() {
                    continue;
                }
                parameters.push(definitions.parameter(location.as_str(), field));
            }
        } else if let Some(upload) = parser.upload() {
            if upload.names().is_empty() {
                parameters.push(file_parameter(upload, "upfile"));
            } else {
                for name in upload.names() {
                    parameters.push(file_parameter(upload, name));
                }
            }
        }
    }
    parameters
}

fn file_parameter(upload: &crate::parser::UploadParser, name: &str) -> Value {
    json!({
        "in": "formData",
        "type": "file",
        "description": upload.doc_description().unwrap_or(""),
        "name": name,
        "required": upload.is_required(),
    })
}

fn body_parameters(meta: &EndpointMeta, definitions: &mut Definitions) -> Vec<Value> {
    meta.parsers()
        .into_iter()
        .filter(|parser| parser.location().is_body() && parser.media_type().is_some())
        .filter_map(Parser::schema)
        .map(|schema| {
            json!({
                "name": "body",
                "in": "body",
                "required": false,
                "schema": definitions.reference(schema),
            })
        })
        .collect()
}

fn request_body(meta: &EndpointMeta, definitions: &mut Definitions) -> Option<Value> {
    let mut content = Map::new();
    for parser in meta.parsers() {
        if !parser.location().is_body() {
            continue;
        }
        if let (Some(media_type), Some(schema)) = (parser.media_type(), parser.schema()) {
            content.insert(
                media_type.to_owned(),
                json!({ "schema": definitions.reference(schema) }),
            );
        }
    }
    if content.is_empty() {
        None
    } else {
        Some(json!({ "content": content }))
    }
}

fn responses(meta: &EndpointMeta, definitions: &mut Definitions) -> Value {
    let mut responses = Map::new();
    if let Some(schema) = meta.response_schema() {
        responses.insert(
            meta.status().as_u16().to_string(),
            json!({ "schema": definitions.reference(schema) }),
        );
    }

    for error in meta.operation().errors() {
        let mut entry = Map::new();
        entry.insert("description".to_owned(), json!(error.description()));
        if let Some(schema) = error.body_schema() {
            entry.insert("schema".to_owned(), definitions.reference(schema));
        }
        responses.insert(error.status().to_string(), Value::Object(entry));
    }

    // The generic client-error fallback is suppressed by a declared 404,
    // not by a declared 400.
    if !meta.aggregate().is_empty() && !responses.contains_key("404") {
        responses.insert("400".to_owned(), json!({"description": "Bad request"}));
    }

    Value::Object(responses)
}
