//! The load/dump schema capability backing every parser.
//!
//! A [`Schema`] is an ordered list of [`Field`] descriptors with two
//! operations: `load` validates and coerces a raw JSON structure into a
//! typed one (string inputs from query/path/header are coerced to their
//! declared kinds), `dump` serializes a typed structure back out. Both fail
//! with a field-keyed [`ValidationError`].
//!
//! Schema instances are expensive enough to build that parsers never
//! construct them per request: [`schema_of`] resolves a [`SchemaType`] to a
//! process-wide cached instance.

use serde_json::{Map, Value};

use crate::error::{SchemaTypeError, ValidationError};

mod field;
mod registry;

pub use field::{Field, FieldKind};
pub use registry::{schema_of, SchemaRef, SchemaType};

/// Policy applied to input keys that match no declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unknown {
    /// Drop unknown keys (the default).
    #[default]
    Exclude,
    /// Fail the load with an `Unknown field.` message.
    Raise,
    /// Copy unknown keys through untouched.
    Include,
}

/// A named, ordered collection of fields with load/dump semantics.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
}

/// Fluent constructor for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    name: Option<String>,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Override the derived component name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a field declaration. Order is preserved and significant for
    /// documentation output.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate the definition and build the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaTypeError`] when two fields share a name or wire key.
    pub fn try_build(self) -> Result<Schema, SchemaTypeError> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name().is_empty() {
                return Err(SchemaTypeError::new("field with an empty name"));
            }
            if !seen.insert(field.name().to_owned()) {
                return Err(SchemaTypeError::new(format!(
                    "duplicate field `{}`",
                    field.name()
                )));
            }
        }
        Ok(Schema {
            name: self.name.unwrap_or_default(),
            fields: self.fields,
        })
    }

    /// Build the schema.
    ///
    /// # Panics
    ///
    /// Panics on a malformed definition; schemas are declared at startup and
    /// a bad declaration is a programming error.
    #[must_use]
    pub fn build(self) -> Schema {
        match self.try_build() {
            Ok(schema) => schema,
            Err(error) => panic!("{error}"),
        }
    }
}

impl Schema {
    /// Start declaring a schema.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The component-definition name (derived from the defining type when the
    /// schema came through [`schema_of`]).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn find_input<'a>(&self, field: &Field, object: &'a Map<String, Value>) -> Option<&'a Value> {
        // Both the wire key and the canonical name are accepted as input.
        if let Some(key) = &field.data_key {
            if let Some(value) = object.get(key) {
                return Some(value);
            }
        }
        object.get(&field.name)
    }

    fn is_known_key(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.name == key || f.data_key.as_deref() == Some(key))
    }

    /// Validate and coerce `raw` into a typed structure.
    ///
    /// Output keys are the canonical field names; string inputs are coerced
    /// to the declared kinds; constants and defaults are filled in.
    ///
    /// # Errors
    ///
    /// Returns a field-keyed [`ValidationError`] collecting every failure.
    pub fn load(&self, raw: &Value, unknown: Unknown) -> Result<Value, ValidationError> {
        let Some(object) = raw.as_object() else {
            return Err(ValidationError::single("_schema", "Invalid input type."));
        };

        let mut out = Map::new();
        let mut errors = ValidationError::new();

        for field in &self.fields {
            if field.dump_only {
                continue;
            }
            if let FieldKind::Constant(value) = &field.kind {
                out.insert(field.name.clone(), value.clone());
                continue;
            }
            match self.find_input(field, object) {
                Some(value) => {
                    if let Some(coerced) = coerce(&field.kind, value, &field.name, &mut errors) {
                        out.insert(field.name.clone(), coerced);
                    }
                }
                None => {
                    if let Some(default) = &field.default {
                        out.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        errors.push(&field.name, "Missing data for required field.");
                    }
                }
            }
        }

        match unknown {
            Unknown::Exclude => {}
            Unknown::Raise => {
                for key in object.keys() {
                    if !self.is_known_key(key) {
                        errors.push(key, "Unknown field.");
                    }
                }
            }
            Unknown::Include => {
                for (key, value) in object {
                    if !self.is_known_key(key) {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(errors)
        }
    }

    /// Serialize `value` back to its wire structure.
    ///
    /// Output keys are the wire keys (`data_key` when declared); `load_only`
    /// fields are skipped; declared-but-absent attributes are omitted.
    ///
    /// # Errors
    ///
    /// Returns a field-keyed [`ValidationError`] when an attribute does not
    /// fit its declared kind.
    pub fn dump(&self, value: &Value) -> Result<Value, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::single("_schema", "Invalid object type."));
        };

        let mut out = Map::new();
        let mut errors = ValidationError::new();

        for field in &self.fields {
            if field.load_only {
                continue;
            }
            if let FieldKind::Constant(constant) = &field.kind {
                out.insert(field.load_key().to_owned(), constant.clone());
                continue;
            }
            if let Some(attr) = object.get(&field.name) {
                if let Some(dumped) = dump_value(&field.kind, attr, &field.name, &mut errors) {
                    out.insert(field.load_key().to_owned(), dumped);
                }
            }
        }

        if errors.is_empty() {
            Ok(Value::Object(out))
        } else {
            Err(errors)
        }
    }
}

fn coerce(kind: &FieldKind, value: &Value, field: &str, errors: &mut ValidationError) -> Option<Value> {
    match kind {
        FieldKind::Raw => Some(value.clone()),
        FieldKind::String => match value {
            Value::String(_) => Some(value.clone()),
            _ => {
                errors.push(field, "Not a valid string.");
                None
            }
        },
        FieldKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::String(s) => match s.parse::<i64>() {
                Ok(n) => Some(Value::from(n)),
                Err(_) => {
                    errors.push(field, "Not a valid integer.");
                    None
                }
            },
            _ => {
                errors.push(field, "Not a valid integer.");
                None
            }
        },
        FieldKind::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) => serde_json::Number::from_f64(n).map(Value::Number).or_else(|| {
                    errors.push(field, "Not a valid number.");
                    None
                }),
                Err(_) => {
                    errors.push(field, "Not a valid number.");
                    None
                }
            },
            _ => {
                errors.push(field, "Not a valid number.");
                None
            }
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => {
                    errors.push(field, "Not a valid boolean.");
                    None
                }
            },
            _ => {
                errors.push(field, "Not a valid boolean.");
                None
            }
        },
        FieldKind::List(inner) => match value {
            Value::Array(items) => {
                let before = errors.messages().len();
                let coerced: Vec<Value> = items
                    .iter()
                    .filter_map(|item| coerce(inner, item, field, errors))
                    .collect();
                if errors.messages().len() > before {
                    None
                } else {
                    Some(Value::Array(coerced))
                }
            }
            _ => {
                errors.push(field, "Not a valid list.");
                None
            }
        },
        FieldKind::Nested(schema) => match schema.load(value, Unknown::Exclude) {
            Ok(loaded) => Some(loaded),
            Err(nested) => {
                errors.merge_nested(field, nested);
                None
            }
        },
        // Constants never reach coercion; callers emit them directly.
        FieldKind::Constant(constant) => Some(constant.clone()),
    }
}

/// Dump-side counterpart of `coerce`: nested values recurse through `dump`
/// so aliases and `load_only` visibility apply at every level.
fn dump_value(
    kind: &FieldKind,
    value: &Value,
    field: &str,
    errors: &mut ValidationError,
) -> Option<Value> {
    match kind {
        FieldKind::Nested(schema) => match schema.dump(value) {
            Ok(dumped) => Some(dumped),
            Err(nested) => {
                errors.merge_nested(field, nested);
                None
            }
        },
        FieldKind::List(inner) => match value {
            Value::Array(items) => {
                let before = errors.messages().len();
                let dumped: Vec<Value> = items
                    .iter()
                    .filter_map(|item| dump_value(inner, item, field, errors))
                    .collect();
                if errors.messages().len() > before {
                    None
                } else {
                    Some(Value::Array(dumped))
                }
            }
            _ => {
                errors.push(field, "Not a valid list.");
                None
            }
        },
        _ => coerce(kind, value, field, errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_schema() -> Schema {
        Schema::builder()
            .field(Field::integer("limit").required())
            .field(Field::list("item_id", FieldKind::Integer))
            .field(Field::string("a").data_key("b"))
            .field(Field::constant("n", json!(1)))
            .build()
    }

    #[test]
    fn load_coerces_and_fills_constants() {
        let schema = query_schema();
        let loaded = schema
            .load(
                &json!({"limit": "1000", "item_id": ["1", "2"], "b": "2"}),
                Unknown::Exclude,
            )
            .unwrap();
        assert_eq!(loaded, json!({"limit": 1000, "item_id": [1, 2], "a": "2", "n": 1}));
    }

    #[test]
    fn load_missing_required_field() {
        let schema = query_schema();
        let error = schema
            .load(&json!({"item_id": ["1"]}), Unknown::Exclude)
            .unwrap_err();
        assert_eq!(
            error.normalized_messages(),
            json!({"limit": ["Missing data for required field."]})
        );
    }

    #[test]
    fn load_alias_symmetry() {
        let schema = query_schema();
        let via_key = schema
            .load(&json!({"limit": "1", "b": "x"}), Unknown::Exclude)
            .unwrap();
        let via_name = schema
            .load(&json!({"limit": "1", "a": "x"}), Unknown::Exclude)
            .unwrap();
        assert_eq!(via_key, via_name);
        assert_eq!(via_key["a"], json!("x"));
    }

    #[test]
    fn load_unknown_policies() {
        let schema = Schema::builder().field(Field::string("q")).build();
        let raw = json!({"q": "x", "extra": "y"});

        assert_eq!(
            schema.load(&raw, Unknown::Exclude).unwrap(),
            json!({"q": "x"})
        );
        assert_eq!(
            schema.load(&raw, Unknown::Include).unwrap(),
            json!({"q": "x", "extra": "y"})
        );
        let error = schema.load(&raw, Unknown::Raise).unwrap_err();
        assert_eq!(
            error.normalized_messages(),
            json!({"extra": ["Unknown field."]})
        );
    }

    #[test]
    fn load_applies_defaults() {
        let schema = Schema::builder()
            .field(Field::integer("limit").default_value(json!(100)))
            .field(Field::integer("offset").default_value(json!(0)))
            .build();
        let loaded = schema.load(&json!({}), Unknown::Exclude).unwrap();
        assert_eq!(loaded, json!({"limit": 100, "offset": 0}));
    }

    #[test]
    fn load_nested_errors_are_prefixed() {
        let item = std::sync::Arc::new(
            Schema::builder()
                .field(Field::integer("id").required())
                .build(),
        );
        let schema = Schema::builder().field(Field::nested("item", item)).build();
        let error = schema
            .load(&json!({"item": {}}), Unknown::Exclude)
            .unwrap_err();
        assert_eq!(
            error.normalized_messages(),
            json!({"item.id": ["Missing data for required field."]})
        );
    }

    #[test]
    fn dump_respects_keys_and_visibility() {
        let schema = Schema::builder()
            .field(Field::integer("id"))
            .field(Field::string("a").data_key("b"))
            .field(Field::string("secret").load_only())
            .build();
        let dumped = schema
            .dump(&json!({"id": 1, "a": "x", "secret": "hidden"}))
            .unwrap();
        assert_eq!(dumped, json!({"id": 1, "b": "x"}));
    }

    #[test]
    fn dump_recurses_nested_schemas() {
        let item = std::sync::Arc::new(
            Schema::builder()
                .field(Field::integer("id"))
                .field(Field::string("token").load_only())
                .build(),
        );
        let schema = Schema::builder()
            .field(Field::list("items", FieldKind::Nested(item)))
            .build();
        let dumped = schema
            .dump(&json!({"items": [{"id": 1, "token": "x"}, {"id": 2}]}))
            .unwrap();
        assert_eq!(dumped, json!({"items": [{"id": 1}, {"id": 2}]}));
    }

    #[test]
    fn dump_type_mismatch_fails() {
        let schema = Schema::builder().field(Field::integer("id")).build();
        let error = schema.dump(&json!({"id": "test"})).unwrap_err();
        assert_eq!(
            error.normalized_messages(),
            json!({"id": ["Not a valid integer."]})
        );
    }

    #[test]
    fn duplicate_field_is_a_schema_type_error() {
        let result = Schema::builder()
            .field(Field::string("q"))
            .field(Field::integer("q"))
            .try_build();
        assert!(result.is_err());
    }
}
