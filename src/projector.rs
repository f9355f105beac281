//! Result projection: a raw backend result is reshaped down to exactly
//! the requested field-selection tree.
//!
//! Dispatch mirrors the planner over the same canonical tree. The
//! security contract holds at every nesting level: the output key-set is
//! exactly the subset of the requested keys actually present in the raw
//! result — never more. Extra data the backend eagerly loaded never
//! leaks through, absence is never an error for plain fields, and values
//! are never fabricated. Output keys are formatted to the client naming
//! convention here, the counterpart of the normalizer's inbound
//! translation.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::ProjectError;
use crate::metadata::{MemberKind, MetadataProvider, ReturnKind, UnionDef};
use crate::planner::PlannedQuery;
use crate::types::{FieldKind, FieldSpecNode, MemberSpec, SelectContext};
use crate::union::normalize_union_value;
use crate::wire::{is_not_loaded, to_wire};

/// Project an executed raw result against the same plan that produced
/// the backend query.
///
/// Array-valued results (list queries) project element-wise, preserving
/// order and length.
///
/// # Errors
///
/// `NotLoaded` when a calculation the plan asked for came back as a
/// placeholder or not at all; that is a plan/execution mismatch, logged
/// as a server-side invariant violation.
pub fn project(
    raw: &Value,
    planned: &PlannedQuery,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
) -> Result<Value, ProjectError> {
    project_value(raw, &planned.selection, &ctx.resource, ctx, meta, "")
}

fn project_value(
    raw: &Value,
    nodes: &[FieldSpecNode],
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
) -> Result<Value, ProjectError> {
    match raw {
        Value::Array(rows) => {
            let projected = rows
                .iter()
                .map(|row| project_value(row, nodes, resource, ctx, meta, path))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(projected))
        }
        Value::Null => Ok(Value::Null),
        Value::Object(map) => project_object(map, nodes, resource, ctx, meta, path),
        // A non-object row carries no keys to select from.
        other => Ok(to_wire(other)),
    }
}

fn project_object(
    raw: &Map<String, Value>,
    nodes: &[FieldSpecNode],
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
) -> Result<Value, ProjectError> {
    let mut out = Map::new();

    for node in nodes {
        let name = node.name();
        let node_path = format!("{path}/{name}");
        let out_key = ctx.format.from_canonical(name);

        match node {
            FieldSpecNode::Plain(name) => match meta.classify(resource, name) {
                FieldKind::Calculation => match raw.get(name) {
                    Some(value) if !is_not_loaded(value) => {
                        out.insert(out_key, to_wire(value));
                    }
                    _ => return not_loaded(&node_path),
                },
                FieldKind::Union => {
                    if let Some(value) = raw.get(name) {
                        if let Some(def) = meta.union_member_types(resource, name) {
                            out.insert(out_key, whole_union(value, &def, ctx));
                        }
                    }
                }
                _ => {
                    // Copy if present, omit if absent. Absence is not an
                    // error for plain fields.
                    if let Some(value) = raw.get(name) {
                        out.insert(out_key, to_wire(value));
                    }
                }
            },

            FieldSpecNode::Nested { name, children } => match raw.get(name) {
                None => {}
                Some(Value::Null) => {
                    out.insert(out_key, Value::Null);
                }
                Some(value) => {
                    if let Some(target) = meta.target_resource(resource, name) {
                        out.insert(
                            out_key,
                            project_value(value, children, &target, ctx, meta, &node_path)?,
                        );
                    }
                }
            },

            FieldSpecNode::Calculation { name, children, .. } => match raw.get(name) {
                None => return not_loaded(&node_path),
                Some(value) if is_not_loaded(value) => return not_loaded(&node_path),
                Some(Value::Null) => {
                    // A legitimately-nil computed value, distinct from a
                    // value that was never computed.
                    out.insert(out_key, Value::Null);
                }
                Some(value) => {
                    if children.is_empty() {
                        // Empty recorded spec: return the value verbatim,
                        // no trimming.
                        out.insert(out_key, to_wire(value));
                    } else {
                        match meta
                            .calculation_signature(resource, name)
                            .map(|sig| sig.returns)
                        {
                            Some(ReturnKind::Resource(target)) => {
                                out.insert(
                                    out_key,
                                    project_value(value, children, &target, ctx, meta, &node_path)?,
                                );
                            }
                            _ => {
                                out.insert(out_key, to_wire(value));
                            }
                        }
                    }
                }
            },

            FieldSpecNode::UnionSelection { name, members } => match raw.get(name) {
                None => {}
                Some(Value::Null) => {
                    out.insert(out_key, Value::Null);
                }
                Some(value) => {
                    let Some(def) = meta.union_member_types(resource, name) else {
                        continue;
                    };
                    match value {
                        Value::Array(items) => {
                            // Element-wise, preserving order and length;
                            // unmatched members project to null.
                            let projected = items
                                .iter()
                                .map(|item| {
                                    project_union_item(item, members, &def, ctx, meta, &node_path)
                                        .map(|slot| slot.unwrap_or(Value::Null))
                                })
                                .collect::<Result<Vec<_>, _>>()?;
                            out.insert(out_key, Value::Array(projected));
                        }
                        item => {
                            if let Some(projected) =
                                project_union_item(item, members, &def, ctx, meta, &node_path)?
                            {
                                out.insert(out_key, projected);
                            }
                        }
                    }
                }
            },
        }
    }

    Ok(Value::Object(out))
}

/// Intersect one stored union value with the requested members.
///
/// `Ok(None)` means the value either did not normalize or its tag was not
/// requested; the caller decides between omission and a null slot.
fn project_union_item(
    item: &Value,
    members: &IndexMap<String, MemberSpec>,
    def: &UnionDef,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
) -> Result<Option<Value>, ProjectError> {
    let Some(normalized) = normalize_union_value(item, def) else {
        return Ok(None);
    };
    let Some(spec) = members.get(&normalized.tag) else {
        return Ok(None);
    };

    let inner = match spec {
        MemberSpec::Primitive => to_wire(&normalized.payload),
        MemberSpec::Fields(children) => match def.members.get(&normalized.tag) {
            Some(MemberKind::Embedded(target)) => {
                project_value(&normalized.payload, children, target, ctx, meta, path)?
            }
            _ => to_wire(&normalized.payload),
        },
    };

    let mut wrapped = Map::new();
    wrapped.insert(ctx.format.from_canonical(&normalized.tag), inner);
    Ok(Some(Value::Object(wrapped)))
}

/// Project a union requested as a plain field: the whole normalized value
/// in `{tag: payload}` form, storage mode erased.
fn whole_union(value: &Value, def: &UnionDef, ctx: &SelectContext) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| whole_union(item, def, ctx))
                .collect(),
        ),
        Value::Null => Value::Null,
        item => match normalize_union_value(item, def) {
            Some(normalized) => {
                let mut wrapped = Map::new();
                wrapped.insert(
                    ctx.format.from_canonical(&normalized.tag),
                    to_wire(&normalized.payload),
                );
                Value::Object(wrapped)
            }
            None => Value::Null,
        },
    }
}

fn not_loaded(path: &str) -> Result<Value, ProjectError> {
    // Server-side invariant violation: the plan asked for this value and
    // the execution engine did not produce it.
    error!(path, "planned calculation missing from executed result");
    Err(ProjectError::NotLoaded {
        path: path.to_string(),
    })
}
