use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::Schema;

/// Shared handle to a cached schema instance.
pub type SchemaRef = Arc<Schema>;

/// A type that declares a schema.
///
/// Implementors are unit structs used purely as registry keys; the schema
/// they describe is cached per process by [`schema_of`]. A declaration may
/// run more than once under a race, in which case the first registered
/// instance wins and the duplicate is discarded.
pub trait SchemaType: 'static {
    /// Declare the schema.
    fn schema() -> Schema;
}

static REGISTRY: OnceLock<Mutex<HashMap<TypeId, SchemaRef>>> = OnceLock::new();

/// Resolve `T` to its process-wide cached schema instance.
///
/// Two calls for the same `T` always return the same instance, so parsers
/// and documentation share one schema per type. When the declaration leaves
/// the name empty it is derived from the type path (`::` replaced with `.`).
#[must_use]
pub fn schema_of<T: SchemaType>() -> SchemaRef {
    let registry = REGISTRY.get_or_init(Mutex::default);
    let key = TypeId::of::<T>();
    if let Some(schema) = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return schema.clone();
    }

    // The declaration runs outside the lock: schemas compose other schemas
    // through `schema_of`, and holding the lock here would re-enter it.
    let mut schema = T::schema();
    if schema.name().is_empty() {
        schema.set_name(std::any::type_name::<T>().replace("::", "."));
    }
    let schema = Arc::new(schema);

    registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(schema)
        .clone()
}
