//! The query-execution boundary and the end-to-end pipeline.
//!
//! The engine itself never performs I/O; an external [`QueryExecutor`]
//! runs the plan against whatever backend exists. [`run_selection`] wires
//! the full flow together: client-input errors surface before execution
//! is attempted, and a failed or canceled fetch is total failure — it is
//! never partially projected.

use serde_json::Value;
use tracing::error;

use crate::error::{ExecutionError, SelectError};
use crate::metadata::MetadataProvider;
use crate::planner::{plan_request, QueryPlan};
use crate::projector::project;
use crate::types::SelectContext;

/// Executes a query plan against the backend.
///
/// Returns one raw result object or an array of them. Implementations may
/// block or be driven by an awaited future upstream; the engine does not
/// care about timing, only about the returned value.
pub trait QueryExecutor {
    fn execute(&self, resource: &str, plan: &QueryPlan) -> Result<Value, ExecutionError>;
}

/// Plan, execute, and project one field-selection request.
///
/// # Errors
///
/// `SelectError::Plan` for client-input problems (raised before
/// `execute` is ever called), `SelectError::Execution` passed through
/// from the executor with internal detail logged but not surfaced, and
/// `SelectError::Project` for plan/execution mismatches.
pub fn run_selection(
    fields: &Value,
    ctx: &SelectContext,
    meta: &impl MetadataProvider,
    executor: &impl QueryExecutor,
) -> Result<Value, SelectError> {
    let planned = plan_request(fields, ctx, meta)?;

    let raw = executor.execute(&ctx.resource, &planned.plan).map_err(|e| {
        if let Some(detail) = e.detail() {
            error!(resource = %ctx.resource, detail, "query execution failed");
        }
        e
    })?;

    Ok(project(&raw, &planned, ctx, meta)?)
}
