//! Resource metadata: the read-only description of a backend resource
//! graph that the engine classifies field names against.
//!
//! The engine never reflects over anything at runtime; it consults a
//! [`MetadataProvider`] that answers four questions about a (resource,
//! field) pair. [`SchemaRegistry`] is the in-memory implementation, built
//! once per process and safely shared across concurrent requests.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::types::FieldKind;

/// Declared type of a resource attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    /// A plain scalar value.
    Scalar,
    /// An embedded sub-resource: simultaneously a plain attribute and a
    /// nested-resource container. The string names the embedded schema.
    Embedded(String),
    /// A tagged union value.
    Union(UnionDef),
}

/// How a union-typed attribute is physically stored, and what members it
/// declares. Storage mode only matters to the union value normalizer;
/// nothing downstream of it may branch on this.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDef {
    pub storage: UnionStorage,
    pub members: IndexMap<String, MemberKind>,
}

impl UnionDef {
    /// A union stored as an explicit `{"type": tag, "value": payload}` pair.
    pub fn type_and_value() -> Self {
        Self {
            storage: UnionStorage::TypeAndValue,
            members: IndexMap::new(),
        }
    }

    /// A union stored as a flat map carrying its tag under `tag_key`.
    pub fn map_with_tag(tag_key: impl Into<String>) -> Self {
        Self {
            storage: UnionStorage::MapWithTag {
                tag_key: tag_key.into(),
            },
            members: IndexMap::new(),
        }
    }

    /// Declare a member.
    pub fn member(mut self, tag: impl Into<String>, kind: MemberKind) -> Self {
        self.members.insert(tag.into(), kind);
        self
    }
}

/// Physical storage encoding of a union value.
#[derive(Debug, Clone, PartialEq)]
pub enum UnionStorage {
    /// Explicit tag alongside the typed payload.
    TypeAndValue,
    /// Flat map whose tag lives under a designated key inside the payload.
    MapWithTag { tag_key: String },
}

/// What one union member holds.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    /// A scalar member; selected verbatim.
    Primitive,
    /// A structured member backed by an embedded schema.
    Embedded(String),
}

/// Declared signature of a calculation: its argument schema and what it
/// returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationSignature {
    pub args: IndexMap<String, ArgumentSpec>,
    pub returns: ReturnKind,
}

impl CalculationSignature {
    /// A calculation returning a scalar value.
    pub fn scalar() -> Self {
        Self {
            args: IndexMap::new(),
            returns: ReturnKind::Scalar,
        }
    }

    /// A calculation returning an instance (or list) of `target`.
    pub fn resource(target: impl Into<String>) -> Self {
        Self {
            args: IndexMap::new(),
            returns: ReturnKind::Resource(target.into()),
        }
    }

    /// Declare an argument.
    pub fn arg(mut self, name: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.args.insert(name.into(), spec);
        self
    }
}

/// Return type of a calculation, as far as planning cares: scalar results
/// are opaque, resource results support nested selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnKind {
    Scalar,
    Resource(String),
}

/// Constraints on one declared calculation argument.
///
/// Structural only: type casting is the backend's responsibility.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgumentSpec {
    /// Whether an explicit `null` is acceptable.
    pub allow_nil: bool,
    /// Backend-side default, if any. The processor never injects it; its
    /// presence only makes an explicit `null` legal.
    pub default: Option<Value>,
}

impl ArgumentSpec {
    /// An argument that must be non-null when passed.
    pub fn required() -> Self {
        Self::default()
    }

    /// An argument that accepts `null`.
    pub fn nullable() -> Self {
        Self {
            allow_nil: true,
            default: None,
        }
    }

    /// An argument with a backend default.
    pub fn with_default(default: Value) -> Self {
        Self {
            allow_nil: false,
            default: Some(default),
        }
    }
}

/// Metadata lookups for one resource schema.
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    name: String,
    attributes: IndexMap<String, AttributeType>,
    relationships: IndexMap<String, String>,
    calculations: IndexMap<String, CalculationSignature>,
    aggregates: IndexSet<String>,
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an attribute.
    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Declare a relationship to another resource.
    pub fn relationship(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relationships.insert(name.into(), target.into());
        self
    }

    /// Declare a calculation.
    pub fn calculation(mut self, name: impl Into<String>, sig: CalculationSignature) -> Self {
        self.calculations.insert(name.into(), sig);
        self
    }

    /// Declare an aggregate.
    pub fn aggregate(mut self, name: impl Into<String>) -> Self {
        self.aggregates.insert(name.into());
        self
    }

    /// Classify a canonical field name.
    ///
    /// The check order is load-bearing: an embedded-resource (or union)
    /// attribute is simultaneously a plain attribute and a structured
    /// container, so the structured interpretations must win before the
    /// plain-attribute fallback ever sees the name.
    pub fn classify(&self, field: &str) -> FieldKind {
        if let Some(ty) = self.attributes.get(field) {
            match ty {
                AttributeType::Embedded(_) => return FieldKind::EmbeddedResource,
                AttributeType::Union(_) => return FieldKind::Union,
                AttributeType::Scalar => {}
            }
        }
        if self.relationships.contains_key(field) {
            return FieldKind::Relationship;
        }
        if self.calculations.contains_key(field) {
            return FieldKind::Calculation;
        }
        if self.aggregates.contains(field) {
            return FieldKind::Aggregate;
        }
        if self.attributes.contains_key(field) {
            return FieldKind::Attribute;
        }
        FieldKind::Unknown
    }

    /// The resource a field points at, for fields that have one: embedded
    /// attributes, relationships, and resource-returning calculations.
    pub fn target_resource(&self, field: &str) -> Option<&str> {
        if let Some(AttributeType::Embedded(target)) = self.attributes.get(field) {
            return Some(target);
        }
        if let Some(target) = self.relationships.get(field) {
            return Some(target);
        }
        if let Some(sig) = self.calculations.get(field) {
            if let ReturnKind::Resource(target) = &sig.returns {
                return Some(target);
            }
        }
        None
    }

    pub fn calculation_signature(&self, field: &str) -> Option<&CalculationSignature> {
        self.calculations.get(field)
    }

    pub fn union_def(&self, field: &str) -> Option<&UnionDef> {
        match self.attributes.get(field) {
            Some(AttributeType::Union(def)) => Some(def),
            _ => None,
        }
    }
}

/// The read-only metadata boundary the engine plans against.
///
/// Implementations must be pure: identical inputs always yield identical
/// answers, and lookups are safe to share across threads.
pub trait MetadataProvider {
    fn classify(&self, resource: &str, field: &str) -> FieldKind;
    fn target_resource(&self, resource: &str, field: &str) -> Option<String>;
    fn calculation_signature(&self, resource: &str, field: &str) -> Option<CalculationSignature>;
    fn union_member_types(&self, resource: &str, field: &str) -> Option<UnionDef>;
}

/// In-memory metadata provider over a set of registered schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    resources: IndexMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its own name.
    pub fn register(mut self, schema: ResourceSchema) -> Self {
        self.resources.insert(schema.name.clone(), schema);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceSchema> {
        self.resources.get(name)
    }
}

impl MetadataProvider for SchemaRegistry {
    fn classify(&self, resource: &str, field: &str) -> FieldKind {
        self.resources
            .get(resource)
            .map_or(FieldKind::Unknown, |r| r.classify(field))
    }

    fn target_resource(&self, resource: &str, field: &str) -> Option<String> {
        self.resources
            .get(resource)?
            .target_resource(field)
            .map(str::to_string)
    }

    fn calculation_signature(&self, resource: &str, field: &str) -> Option<CalculationSignature> {
        self.resources
            .get(resource)?
            .calculation_signature(field)
            .cloned()
    }

    fn union_member_types(&self, resource: &str, field: &str) -> Option<UnionDef> {
        self.resources.get(resource)?.union_def(field).cloned()
    }
}
