//! Query plan building: the canonical field-spec tree becomes a minimal
//! backend query plan.
//!
//! Every requested field lands in exactly one of two buckets: direct
//! fetch (plain retrieval) or computed load (calculations, aggregates,
//! relationship traversal). Embedded resources are dual-nature and may
//! land in both. Union member filtering and calculation result trimming
//! are never pushed into the plan; the projector applies them post-fetch
//! against the specs recorded here.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PlanError;
use crate::metadata::{MetadataProvider, ReturnKind};
use crate::normalizer::normalize_fields;
use crate::types::{FieldKind, FieldSpecNode, MemberSpec, SelectContext};

/// What the backend is asked to retrieve and compute.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryPlan {
    /// Attribute names obtainable by simple retrieval.
    pub direct_fetch: IndexSet<String>,
    /// Fields requiring calculation, aggregation, or traversal. A name
    /// appears here at most once.
    pub computed_load: Vec<LoadEntry>,
}

/// One computed-load request, at minimal arity: no empty args map or
/// child list is ever emitted where the bare form would do, because "no
/// customization" and "customization with an empty payload" are
/// distinguishable states to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoadEntry {
    Bare(String),
    WithArgs {
        name: String,
        args: Map<String, Value>,
    },
    WithFields {
        name: String,
        fields: Vec<LoadEntry>,
    },
    WithArgsAndFields {
        name: String,
        args: Map<String, Value>,
        fields: Vec<LoadEntry>,
    },
}

impl LoadEntry {
    /// The field this entry loads.
    pub fn name(&self) -> &str {
        match self {
            LoadEntry::Bare(name) => name,
            LoadEntry::WithArgs { name, .. } => name,
            LoadEntry::WithFields { name, .. } => name,
            LoadEntry::WithArgsAndFields { name, .. } => name,
        }
    }

    /// Build the minimal-arity entry for the given pieces.
    fn assemble(name: String, args: Map<String, Value>, fields: Vec<LoadEntry>) -> Self {
        match (args.is_empty(), fields.is_empty()) {
            (true, true) => LoadEntry::Bare(name),
            (false, true) => LoadEntry::WithArgs { name, args },
            (true, false) => LoadEntry::WithFields { name, fields },
            (false, false) => LoadEntry::WithArgsAndFields { name, args, fields },
        }
    }
}

/// A built plan together with the canonical tree it came from and the
/// post-fetch filtering specs, all keyed by slash path into the spec.
///
/// The same `selection` tree that produced the plan drives projection;
/// that single source of truth is what guarantees request/response
/// symmetry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    pub selection: Vec<FieldSpecNode>,
    pub plan: QueryPlan,
    /// Requested union members per union field, recorded verbatim for the
    /// projector. Member filtering is always post-fetch because the
    /// concrete member type is only known per row.
    pub union_selections: IndexMap<String, IndexMap<String, MemberSpec>>,
    /// Requested result fields per calculation. An empty entry means the
    /// value is returned verbatim.
    pub calculation_specs: IndexMap<String, Vec<FieldSpecNode>>,
}

/// Normalize a raw client tree and build its plan in one step.
///
/// # Errors
///
/// Any [`PlanError`]; all are client-input errors raised before anything
/// executes.
pub fn plan_request(
    raw: &Value,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
) -> Result<PlannedQuery, PlanError> {
    let selection = normalize_fields(raw, ctx, meta)?;
    build_plan(&selection, ctx, meta)
}

/// Build a [`PlannedQuery`] from an already-normalized selection.
pub fn build_plan(
    selection: &[FieldSpecNode],
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
) -> Result<PlannedQuery, PlanError> {
    let mut union_selections = IndexMap::new();
    let mut calculation_specs = IndexMap::new();
    let plan = plan_level(
        selection,
        &ctx.resource,
        ctx,
        meta,
        "",
        0,
        &mut union_selections,
        &mut calculation_specs,
    )?;
    debug!(
        resource = %ctx.resource,
        direct = plan.direct_fetch.len(),
        computed = plan.computed_load.len(),
        "built query plan"
    );
    Ok(PlannedQuery {
        selection: selection.to_vec(),
        plan,
        union_selections,
        calculation_specs,
    })
}

#[allow(clippy::too_many_arguments)]
fn plan_level(
    nodes: &[FieldSpecNode],
    resource: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    path: &str,
    depth: usize,
    unions: &mut IndexMap<String, IndexMap<String, MemberSpec>>,
    calcs: &mut IndexMap<String, Vec<FieldSpecNode>>,
) -> Result<QueryPlan, PlanError> {
    if depth > ctx.max_depth {
        return Err(PlanError::DepthExceeded {
            path: path.to_string(),
            max_depth: ctx.max_depth,
        });
    }

    let mut plan = QueryPlan::default();

    for node in nodes {
        let node_path = format!("{path}/{}", node.name());
        match node {
            FieldSpecNode::Plain(name) => match meta.classify(resource, name) {
                FieldKind::Attribute | FieldKind::EmbeddedResource | FieldKind::Union => {
                    plan.direct_fetch.insert(name.clone());
                }
                FieldKind::Relationship | FieldKind::Aggregate | FieldKind::Calculation => {
                    push_load(&mut plan, LoadEntry::Bare(name.clone()), &node_path)?;
                }
                FieldKind::Unknown => {
                    return Err(PlanError::UnknownField {
                        path: node_path,
                        resource: resource.to_string(),
                        name: name.clone(),
                    });
                }
            },

            FieldSpecNode::Nested { name, children } => match meta.classify(resource, name) {
                FieldKind::EmbeddedResource => {
                    // Dual-nature: the container always direct-fetches;
                    // computed children additionally need a nested load.
                    plan.direct_fetch.insert(name.clone());
                    let sub = plan_target_level(
                        children, resource, name, ctx, meta, &node_path, depth, unions, calcs,
                    )?;
                    if !sub.computed_load.is_empty() {
                        push_load(
                            &mut plan,
                            LoadEntry::assemble(name.clone(), Map::new(), sub.computed_load),
                            &node_path,
                        )?;
                    }
                }
                FieldKind::Relationship => {
                    let sub = plan_target_level(
                        children, resource, name, ctx, meta, &node_path, depth, unions, calcs,
                    )?;
                    // Plain children of the relationship arrive with the
                    // loaded rows; only computed children need nesting.
                    push_load(
                        &mut plan,
                        LoadEntry::assemble(name.clone(), Map::new(), sub.computed_load),
                        &node_path,
                    )?;
                }
                _ => {
                    return Err(PlanError::InvalidFieldSpec {
                        path: node_path,
                        reason: format!("field \"{name}\" does not support nested selection"),
                    });
                }
            },

            FieldSpecNode::Calculation {
                name,
                args,
                children,
            } => {
                let fields = if children.is_empty() {
                    Vec::new()
                } else {
                    let target = match meta
                        .calculation_signature(resource, name)
                        .map(|sig| sig.returns)
                    {
                        Some(ReturnKind::Resource(target)) => target,
                        _ => {
                            return Err(PlanError::InvalidFieldSpec {
                                path: node_path,
                                reason: format!(
                                    "calculation \"{name}\" does not return a resource"
                                ),
                            });
                        }
                    };
                    let sub = plan_level(
                        children,
                        &target,
                        ctx,
                        meta,
                        &node_path,
                        depth + 1,
                        unions,
                        calcs,
                    )?;
                    sub.computed_load
                };
                calcs.insert(node_path.clone(), children.clone());
                push_load(
                    &mut plan,
                    LoadEntry::assemble(name.clone(), args.clone(), fields),
                    &node_path,
                )?;
            }

            FieldSpecNode::UnionSelection { name, members } => {
                // Post-fetch only: the concrete member type is per-row.
                plan.direct_fetch.insert(name.clone());
                unions.insert(node_path, members.clone());
            }
        }
    }

    Ok(plan)
}

/// Plan the children of a nested field against its target resource.
#[allow(clippy::too_many_arguments)]
fn plan_target_level(
    children: &[FieldSpecNode],
    resource: &str,
    name: &str,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    node_path: &str,
    depth: usize,
    unions: &mut IndexMap<String, IndexMap<String, MemberSpec>>,
    calcs: &mut IndexMap<String, Vec<FieldSpecNode>>,
) -> Result<QueryPlan, PlanError> {
    let Some(target) = meta.target_resource(resource, name) else {
        return Err(PlanError::InvalidFieldSpec {
            path: node_path.to_string(),
            reason: format!("field \"{name}\" has no target resource"),
        });
    };
    plan_level(
        children,
        &target,
        ctx,
        meta,
        node_path,
        depth + 1,
        unions,
        calcs,
    )
}

/// Append a load entry, deduplicating identical repeats and rejecting
/// conflicting ones.
fn push_load(plan: &mut QueryPlan, entry: LoadEntry, path: &str) -> Result<(), PlanError> {
    match plan
        .computed_load
        .iter()
        .find(|existing| existing.name() == entry.name())
    {
        Some(existing) if *existing == entry => Ok(()),
        Some(_) => Err(PlanError::InvalidFieldSpec {
            path: path.to_string(),
            reason: format!("conflicting duplicate selection for \"{}\"", entry.name()),
        }),
        None => {
            plan.computed_load.push(entry);
            Ok(())
        }
    }
}
