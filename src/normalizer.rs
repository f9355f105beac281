//! Field-spec normalization: the untyped client tree becomes the canonical
//! [`FieldSpecNode`] tree.
//!
//! This is the single boundary where shape-branching over the untyped wire
//! form happens, and the only place client naming conventions are
//! translated to canonical form on the way in. Everything downstream
//! pattern-matches on the tagged tree.
//!
//! Accepted wire shapes, per entry:
//! - `"name"` — plain field
//! - `{"name": [ ... ]}` — nested selection (union member selection when
//!   the field classifies as a union)
//! - `{"name": {"args": {...}, "fields": [...]}}` — calculation
//!
//! Anything else is `InvalidFieldSpec` with the path to the entry. All
//! client-input errors, including calculation argument problems, surface
//! here — before any plan is built or executed.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::args::process_arguments;
use crate::error::PlanError;
use crate::metadata::{MemberKind, MetadataProvider, ReturnKind};
use crate::types::{json_type_name, FieldKind, FieldSpecNode, MemberSpec, SelectContext};

/// Normalize a client field-selection tree against resource metadata.
///
/// Pure: no side effects, deterministic for identical inputs.
///
/// # Errors
///
/// `InvalidFieldSpec` for malformed shapes, `UnknownField` for names that
/// do not resolve on the current resource (unresolvable names always fail
/// the whole request), `UnknownArgument`/`InvalidArgument` from argument
/// processing, and `DepthExceeded` for pathological nesting.
pub fn normalize_fields(
    raw: &Value,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
) -> Result<Vec<FieldSpecNode>, PlanError> {
    let Value::Array(entries) = raw else {
        return Err(PlanError::InvalidFieldSpec {
            path: "/".into(),
            reason: format!(
                "expected an array of field entries, got {}",
                json_type_name(raw)
            ),
        });
    };
    normalize_entries(entries, &ctx.resource, ctx, meta, "", 0)
}

fn normalize_entries(
    entries: &[Value],
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
) -> Result<Vec<FieldSpecNode>, PlanError> {
    if depth > ctx.max_depth {
        return Err(PlanError::DepthExceeded {
            path: path.to_string(),
            max_depth: ctx.max_depth,
        });
    }

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        nodes.push(normalize_entry(entry, resource, ctx, meta, path, depth)?);
    }
    Ok(nodes)
}

fn normalize_entry(
    entry: &Value,
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
) -> Result<FieldSpecNode, PlanError> {
    match entry {
        Value::String(raw_name) => {
            let name = ctx.format.to_canonical(raw_name);
            ensure_known(resource, &name, meta, path)?;
            Ok(FieldSpecNode::Plain(name))
        }

        Value::Object(map) => {
            let Some((raw_name, value)) = single_entry(map) else {
                return Err(PlanError::InvalidFieldSpec {
                    path: path.to_string(),
                    reason: format!("expected a single-key object, got {} keys", map.len()),
                });
            };
            let name = ctx.format.to_canonical(raw_name);
            let node_path = format!("{path}/{name}");
            let kind = meta.classify(resource, &name);
            if kind == FieldKind::Unknown {
                return Err(PlanError::UnknownField {
                    path: node_path,
                    resource: resource.to_string(),
                    name,
                });
            }

            match value {
                Value::Object(body) => {
                    normalize_calculation(name, kind, body, resource, ctx, meta, &node_path, depth)
                }
                Value::Array(children) if kind == FieldKind::Union => {
                    normalize_union(name, children, resource, ctx, meta, &node_path, depth)
                }
                Value::Array(children) if kind == FieldKind::Calculation => {
                    // List form on a calculation is shorthand for no args.
                    let sig = require_signature(resource, &name, meta, &node_path)?;
                    let children =
                        normalize_calc_fields(children, &sig.returns, ctx, meta, &node_path, depth)?;
                    Ok(FieldSpecNode::Calculation {
                        name,
                        args: Map::new(),
                        children,
                    })
                }
                Value::Array(children) => {
                    let Some(target) = meta.target_resource(resource, &name) else {
                        return Err(PlanError::InvalidFieldSpec {
                            path: node_path,
                            reason: format!("field \"{name}\" does not support nested selection"),
                        });
                    };
                    let children =
                        normalize_entries(children, &target, ctx, meta, &node_path, depth + 1)?;
                    Ok(FieldSpecNode::Nested { name, children })
                }
                other => Err(PlanError::InvalidFieldSpec {
                    path: node_path,
                    reason: format!(
                        "expected an array or an args/fields object, got {}",
                        json_type_name(other)
                    ),
                }),
            }
        }

        other => Err(PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: format!(
                "expected a string or single-key object, got {}",
                json_type_name(other)
            ),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn normalize_calculation(
    name: String,
    kind: FieldKind,
    body: &Map<String, Value>,
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
) -> Result<FieldSpecNode, PlanError> {
    if kind != FieldKind::Calculation {
        return Err(PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: format!("field \"{name}\" is not a calculation and does not take args/fields"),
        });
    }

    for key in body.keys() {
        if key != "args" && key != "fields" {
            return Err(PlanError::InvalidFieldSpec {
                path: path.to_string(),
                reason: format!("unexpected key \"{key}\" in calculation spec"),
            });
        }
    }

    let sig = require_signature(resource, &name, meta, path)?;

    let raw_args = match body.get("args") {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(PlanError::InvalidFieldSpec {
                path: format!("{path}/args"),
                reason: format!("expected an object, got {}", json_type_name(other)),
            })
        }
        None => Map::new(),
    };
    let args = process_arguments(&raw_args, &sig, ctx.format, path)?;

    let children = match body.get("fields") {
        Some(Value::Array(fields)) => {
            normalize_calc_fields(fields, &sig.returns, ctx, meta, path, depth)?
        }
        Some(other) => {
            return Err(PlanError::InvalidFieldSpec {
                path: format!("{path}/fields"),
                reason: format!("expected an array, got {}", json_type_name(other)),
            })
        }
        None => Vec::new(),
    };

    Ok(FieldSpecNode::Calculation {
        name,
        args,
        children,
    })
}

fn normalize_calc_fields(
    fields: &[Value],
    returns: &ReturnKind,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
) -> Result<Vec<FieldSpecNode>, PlanError> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }
    match returns {
        ReturnKind::Resource(target) => {
            normalize_entries(fields, target, ctx, meta, path, depth + 1)
        }
        ReturnKind::Scalar => Err(PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: "calculation returns a scalar and does not support field selection".into(),
        }),
    }
}

fn normalize_union(
    name: String,
    entries: &[Value],
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
) -> Result<FieldSpecNode, PlanError> {
    let Some(def) = meta.union_member_types(resource, &name) else {
        return Err(PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: format!("field \"{name}\" has no declared union members"),
        });
    };

    let mut members: IndexMap<String, MemberSpec> = IndexMap::new();
    for entry in entries {
        let (tag, spec) = match entry {
            Value::String(raw_tag) => {
                let tag = ctx.format.to_canonical(raw_tag);
                if !def.members.contains_key(&tag) {
                    return Err(PlanError::UnknownField {
                        path: format!("{path}/{tag}"),
                        resource: resource.to_string(),
                        name: tag,
                    });
                }
                (tag, MemberSpec::Primitive)
            }
            Value::Object(map) => {
                let Some((raw_tag, value)) = single_entry(map) else {
                    return Err(PlanError::InvalidFieldSpec {
                        path: path.to_string(),
                        reason: format!(
                            "expected a single-key member object, got {} keys",
                            map.len()
                        ),
                    });
                };
                let tag = ctx.format.to_canonical(raw_tag);
                let member_path = format!("{path}/{tag}");
                let Some(member_kind) = def.members.get(&tag) else {
                    return Err(PlanError::UnknownField {
                        path: member_path,
                        resource: resource.to_string(),
                        name: tag,
                    });
                };
                let MemberKind::Embedded(target) = member_kind else {
                    return Err(PlanError::InvalidFieldSpec {
                        path: member_path,
                        reason: format!(
                            "primitive union member \"{tag}\" does not support field selection"
                        ),
                    });
                };
                let Value::Array(fields) = value else {
                    return Err(PlanError::InvalidFieldSpec {
                        path: member_path,
                        reason: format!(
                            "expected an array of member fields, got {}",
                            json_type_name(value)
                        ),
                    });
                };
                let children =
                    normalize_entries(fields, target, ctx, meta, &member_path, depth + 1)?;
                (tag, MemberSpec::Fields(children))
            }
            other => {
                return Err(PlanError::InvalidFieldSpec {
                    path: path.to_string(),
                    reason: format!(
                        "expected a member tag or single-key object, got {}",
                        json_type_name(other)
                    ),
                })
            }
        };

        if members.insert(tag.clone(), spec).is_some() {
            return Err(PlanError::InvalidFieldSpec {
                path: format!("{path}/{tag}"),
                reason: format!("duplicate union member \"{tag}\""),
            });
        }
    }

    Ok(FieldSpecNode::UnionSelection { name, members })
}

fn ensure_known(
    resource: &str,
    name: &str,
    meta: &impl MetadataProvider,
    path: &str,
) -> Result<(), PlanError> {
    if meta.classify(resource, name) == FieldKind::Unknown {
        return Err(PlanError::UnknownField {
            path: format!("{path}/{name}"),
            resource: resource.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

fn require_signature(
    resource: &str,
    name: &str,
    meta: &impl MetadataProvider,
    path: &str,
) -> Result<crate::metadata::CalculationSignature, PlanError> {
    meta.calculation_signature(resource, name)
        .ok_or_else(|| PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: format!("field \"{name}\" has no calculation signature"),
        })
}

fn single_entry(map: &Map<String, Value>) -> Option<(&String, &Value)> {
    if map.len() == 1 {
        map.iter().next()
    } else {
        None
    }
}
