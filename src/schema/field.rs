use serde_json::Value;

use super::SchemaRef;

/// The wire shape of a single schema field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Number,
    /// Boolean.
    Boolean,
    /// Passed through untouched.
    Raw,
    /// Homogeneous list of an inner kind.
    List(Box<FieldKind>),
    /// Nested object validated by its own schema.
    Nested(SchemaRef),
    /// Fixed value, emitted on both load and dump regardless of input.
    Constant(Value),
}

/// One declared field of a [`Schema`](super::Schema).
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) data_key: Option<String>,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
    pub(crate) dump_only: bool,
    pub(crate) load_only: bool,
    pub(crate) default: Option<Value>,
}

impl Field {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            data_key: None,
            kind,
            required: false,
            dump_only: false,
            load_only: false,
            default: None,
        }
    }

    /// A string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// An integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// A floating point field.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// A boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// An untyped field, passed through as-is.
    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Raw)
    }

    /// A list field with the given element kind.
    pub fn list(name: impl Into<String>, inner: FieldKind) -> Self {
        Self::new(name, FieldKind::List(Box::new(inner)))
    }

    /// A nested object field validated by `schema`.
    pub fn nested(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, FieldKind::Nested(schema))
    }

    /// A constant field, always yielding `value`.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, FieldKind::Constant(value))
    }

    /// Mark the field as required on load.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declare an alternate input/output key.
    #[must_use]
    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    /// Exclude the field from load (serialization only).
    #[must_use]
    pub fn dump_only(mut self) -> Self {
        self.dump_only = true;
        self
    }

    /// Exclude the field from dump (deserialization only).
    #[must_use]
    pub fn load_only(mut self) -> Self {
        self.load_only = true;
        self
    }

    /// Value substituted when the input omits the field.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Canonical attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key used on the wire: `data_key` when declared, else the name.
    #[must_use]
    pub fn load_key(&self) -> &str {
        self.data_key.as_deref().unwrap_or(&self.name)
    }

    /// The field's wire shape.
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// True for required-on-load fields.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// True for list-shaped fields.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.kind, FieldKind::List(_))
    }

    /// True for constant fields.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, FieldKind::Constant(_))
    }

    /// True when the field never participates in load.
    #[must_use]
    pub fn is_dump_only(&self) -> bool {
        self.dump_only
    }
}
