//! Field-Selection Engine
//!
//! Bridges a dynamically-described backend resource graph (attributes,
//! relationships, argumented calculations, aggregates, embedded
//! sub-resources, tagged unions) to a client-specified field-selection
//! request, producing both a minimal backend query plan and an
//! exactly-shaped response.
//!
//! The pipeline: a client tree is normalized into one canonical
//! [`FieldSpecNode`] tree, the planner turns that tree into a
//! [`QueryPlan`] (direct fetch vs computed load), an external
//! [`QueryExecutor`] runs the plan, and the projector reuses the *same*
//! tree to trim the raw result down to exactly the requested shape.
//!
//! # Example
//!
//! ```
//! use fieldplan::{
//!     plan_request, project, AttributeType, ResourceSchema, SchemaRegistry, SelectContext,
//! };
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new().register(
//!     ResourceSchema::new("todo")
//!         .attribute("id", AttributeType::Scalar)
//!         .attribute("title", AttributeType::Scalar)
//!         .attribute("completed", AttributeType::Scalar),
//! );
//! let ctx = SelectContext::new("todo");
//!
//! let planned = plan_request(&json!(["id", "title"]), &ctx, &registry).unwrap();
//! assert!(planned.plan.direct_fetch.contains("id"));
//!
//! let raw = json!({"id": "1", "title": "Buy milk", "completed": false});
//! let out = project(&raw, &planned, &ctx, &registry).unwrap();
//! assert_eq!(out, json!({"id": "1", "title": "Buy milk"}));
//! ```
//!
//! # Guarantees
//!
//! - The engine is pure and stateless per request: identical inputs
//!   always yield identical output, with no I/O and no suspension.
//! - At every nesting level, projected output keys are exactly the
//!   subset of the requested keys present in the raw result — extra
//!   data the backend eagerly loaded never leaks through.
//! - Client-input errors surface before any execution is attempted.

mod args;
mod error;
mod executor;
mod metadata;
mod normalizer;
mod planner;
mod projector;
mod types;
mod union;
mod wire;

pub use args::process_arguments;
pub use error::{ExecutionError, PlanError, ProjectError, SelectError};
pub use executor::{run_selection, QueryExecutor};
pub use metadata::{
    ArgumentSpec, AttributeType, CalculationSignature, MemberKind, MetadataProvider, ResourceSchema,
    ReturnKind, SchemaRegistry, UnionDef, UnionStorage,
};
pub use normalizer::normalize_fields;
pub use planner::{build_plan, plan_request, LoadEntry, PlannedQuery, QueryPlan};
pub use projector::project;
pub use types::{
    json_type_name, FieldFormat, FieldKind, FieldSpecNode, MemberSpec, SelectContext,
    DEFAULT_MAX_DEPTH,
};
pub use union::{normalize_union_value, NormalizedUnion};
pub use wire::{is_not_loaded, is_scalar_wrapper, to_wire, NOT_LOADED_KEY, SCALAR_WRAPPER_KEY};
