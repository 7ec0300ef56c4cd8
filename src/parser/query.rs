use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::schema::{FieldKind, Schema};

/// Extraction plan for a query-string schema, derived once per schema.
///
/// Each loadable field contributes one entry; constants and dump-only fields
/// are filled by the schema itself and never read from the wire.
#[derive(Debug, Clone)]
pub(crate) struct QueryPlan {
    entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone)]
struct PlanEntry {
    load_key: String,
    source_keys: Vec<String>,
    list: bool,
}

impl QueryPlan {
    pub(crate) fn derive(schema: &Schema) -> Self {
        let entries = schema
            .fields()
            .iter()
            .filter(|field| !field.is_dump_only() && !field.is_constant())
            .map(|field| {
                let mut source_keys = Vec::with_capacity(2);
                if field.load_key() != field.name() {
                    source_keys.push(field.load_key().to_owned());
                }
                source_keys.push(field.name().to_owned());
                PlanEntry {
                    load_key: field.load_key().to_owned(),
                    source_keys,
                    list: matches!(field.kind(), FieldKind::List(_)),
                }
            })
            .collect();
        Self { entries }
    }

    /// Collect raw field values from a query string into a loadable object.
    ///
    /// List fields take every non-empty occurrence in order; scalar fields
    /// take the first non-empty occurrence or are omitted entirely.
    pub(crate) fn collect(&self, query: &str) -> Result<Value, DecodeError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| DecodeError::new(format!("Invalid query string: {e}")))?;

        let mut out = Map::new();
        for entry in &self.entries {
            let values: Vec<&str> = pairs
                .iter()
                .filter(|(key, value)| {
                    !value.is_empty() && entry.source_keys.iter().any(|source| source == key)
                })
                .map(|(_, value)| value.as_str())
                .collect();

            if entry.list {
                out.insert(
                    entry.load_key.clone(),
                    Value::Array(values.into_iter().map(Value::from).collect()),
                );
            } else if let Some(first) = values.first() {
                out.insert(entry.load_key.clone(), Value::from(*first));
            }
        }
        Ok(Value::Object(out))
    }
}
