//! Core types for field selection: the canonical spec tree, field kinds,
//! naming conventions, and the per-request context.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default bound on field-spec nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How a resource field resolves against its metadata.
///
/// Produced by the classifier; the priority order lives in
/// [`crate::ResourceSchema::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Attribute,
    Relationship,
    Calculation,
    Aggregate,
    EmbeddedResource,
    Union,
    Unknown,
}

/// One node of the canonical field-selection tree.
///
/// The normalizer is the only producer; the planner and the projector both
/// consume the same tree, which is what keeps request and response shapes
/// symmetric. Names are always canonical (snake_case) here.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpecNode {
    /// A bare field name.
    Plain(String),
    /// A field with a nested selection (relationship or embedded resource).
    Nested {
        name: String,
        children: Vec<FieldSpecNode>,
    },
    /// A calculation, optionally customized with arguments and a nested
    /// selection over its resource-typed result.
    Calculation {
        name: String,
        args: Map<String, Value>,
        children: Vec<FieldSpecNode>,
    },
    /// A tagged-union field with per-member selections.
    UnionSelection {
        name: String,
        members: IndexMap<String, MemberSpec>,
    },
}

impl FieldSpecNode {
    /// The canonical field name this node selects.
    pub fn name(&self) -> &str {
        match self {
            FieldSpecNode::Plain(name) => name,
            FieldSpecNode::Nested { name, .. } => name,
            FieldSpecNode::Calculation { name, .. } => name,
            FieldSpecNode::UnionSelection { name, .. } => name,
        }
    }
}

/// Selection for one union member.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberSpec {
    /// Include the member value verbatim.
    Primitive,
    /// Project the member payload down to these fields.
    Fields(Vec<FieldSpecNode>),
}

/// Client-side naming convention for field names and argument keys.
///
/// Canonical (internal) names are snake_case; the normalizer translates
/// client names to canonical form on the way in and the projector formats
/// output keys back on the way out. Those are the only two places naming
/// conventions appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    /// camelCase (the common JSON wire default).
    #[default]
    Camel,
    /// snake_case, identical to canonical form.
    Snake,
    /// PascalCase.
    Pascal,
}

impl FieldFormat {
    /// Parse a format name from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camel" => Some(FieldFormat::Camel),
            "snake" => Some(FieldFormat::Snake),
            "pascal" => Some(FieldFormat::Pascal),
            _ => None,
        }
    }

    /// Translate a client-supplied name to canonical snake_case.
    pub fn to_canonical(self, name: &str) -> String {
        match self {
            FieldFormat::Snake => name.to_string(),
            FieldFormat::Camel | FieldFormat::Pascal => to_snake_case(name),
        }
    }

    /// Format a canonical name for client-facing output.
    pub fn from_canonical(self, name: &str) -> String {
        match self {
            FieldFormat::Snake => name.to_string(),
            FieldFormat::Camel => to_camel_case(name),
            FieldFormat::Pascal => to_pascal_case(name),
        }
    }
}

/// Convert CamelCase or camelCase to snake_case.
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Convert snake_case to camelCase.
fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

/// Convert snake_case to PascalCase.
fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => camel,
    }
}

/// Per-request context threaded through normalization, planning, and
/// projection. There is no ambient configuration; everything the engine
/// needs to know about the request travels in this value.
#[derive(Debug, Clone)]
pub struct SelectContext {
    /// The resource the selection is rooted at.
    pub resource: String,
    /// Client naming convention.
    pub format: FieldFormat,
    /// Maximum allowed nesting depth of the field spec.
    pub max_depth: usize,
}

impl SelectContext {
    /// Create a context with the camelCase default format and default
    /// depth bound.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            format: FieldFormat::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the client naming convention.
    pub fn format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the maximum nesting depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
