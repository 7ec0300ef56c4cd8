//! Schema-to-document conversion: component definitions and property shapes.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::schema::{Field, FieldKind, SchemaRef};

use super::OpenApiVersion;

/// Component-definition registry, filled while operations are emitted.
#[derive(Debug, Default)]
pub(super) struct Definitions {
    version: OpenApiVersion,
    items: BTreeMap<String, Value>,
}

impl Definitions {
    pub(super) fn new(version: OpenApiVersion) -> Self {
        Self {
            version,
            items: BTreeMap::new(),
        }
    }

    /// Register `schema` (and, transitively, its nested schemas) and return
    /// its `$ref` value.
    pub(super) fn reference(&mut self, schema: &SchemaRef) -> Value {
        let name = schema.name().to_owned();
        if !self.items.contains_key(&name) {
            // Reserve the slot first so self-referential schemas terminate.
            self.items.insert(name.clone(), Value::Null);
            let definition = self.definition(schema);
            self.items.insert(name.clone(), definition);
        }
        json!({ "$ref": format!("{}{name}", self.version.ref_prefix()) })
    }

    fn definition(&mut self, schema: &SchemaRef) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in schema.fields() {
            properties.insert(field.load_key().to_owned(), self.property(field.kind()));
            if field.is_required() && !field.is_dump_only() {
                required.push(Value::from(field.load_key()));
            }
        }

        let mut definition = Map::new();
        definition.insert("type".to_owned(), json!("object"));
        definition.insert("properties".to_owned(), Value::Object(properties));
        if !required.is_empty() {
            definition.insert("required".to_owned(), Value::Array(required));
        }
        Value::Object(definition)
    }

    /// The inline property object for a field kind.
    pub(super) fn property(&mut self, kind: &FieldKind) -> Value {
        match kind {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::Integer => json!({"type": "integer", "format": "int32"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Raw => json!({}),
            FieldKind::List(inner) => {
                json!({"type": "array", "items": self.property(inner)})
            }
            FieldKind::Nested(schema) => self.reference(schema),
            FieldKind::Constant(value) => constant_property(value),
        }
    }

    /// An expanded non-body parameter object for one schema field.
    pub(super) fn parameter(&mut self, location: &str, field: &Field) -> Value {
        let mut parameter = Map::new();
        parameter.insert("in".to_owned(), json!(location));
        parameter.insert("name".to_owned(), json!(field.load_key()));
        parameter.insert("required".to_owned(), json!(field.is_required()));

        match self.version {
            OpenApiVersion::V2 => {
                if let Value::Object(props) = self.property(field.kind()) {
                    parameter.extend(props);
                }
                if field.is_list() {
                    parameter.insert("collectionFormat".to_owned(), json!("multi"));
                }
            }
            OpenApiVersion::V3 => {
                parameter.insert("schema".to_owned(), self.property(field.kind()));
            }
        }
        Value::Object(parameter)
    }

    pub(super) fn into_map(self) -> BTreeMap<String, Value> {
        self.items
    }
}

fn constant_property(value: &Value) -> Value {
    match value {
        Value::String(_) => json!({"type": "string"}),
        Value::Bool(_) => json!({"type": "boolean"}),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            json!({"type": "integer", "format": "int32"})
        }
        Value::Number(_) => json!({"type": "number"}),
        _ => json!({}),
    }
}
