//! Calculation argument processing.
//!
//! Canonicalizes client-named argument keys and validates them against the
//! calculation's declared argument schema. Structural checks only; type
//! casting is the backend's responsibility.

use serde_json::{Map, Value};

use crate::error::PlanError;
use crate::metadata::CalculationSignature;
use crate::types::FieldFormat;

/// Convert a client args map into a canonical args map.
///
/// Keys are translated to canonical form. Values pass through untouched.
///
/// # Errors
///
/// `UnknownArgument` when a key does not resolve to a declared argument,
/// `InvalidArgument` when `null` is passed for a non-nullable argument
/// without a default, or when two client keys collapse to the same
/// canonical name.
pub fn process_arguments(
    args: &Map<String, Value>,
    signature: &CalculationSignature,
    format: FieldFormat,
    path: &str,
) -> Result<Map<String, Value>, PlanError> {
    let mut canonical = Map::new();

    for (raw_name, value) in args {
        let name = format.to_canonical(raw_name);
        let arg_path = format!("{path}/{raw_name}");

        let Some(spec) = signature.args.get(&name) else {
            return Err(PlanError::UnknownArgument {
                path: arg_path,
                name: raw_name.clone(),
            });
        };

        if value.is_null() && !spec.allow_nil && spec.default.is_none() {
            return Err(PlanError::InvalidArgument {
                path: arg_path,
                name: raw_name.clone(),
                reason: "argument is not nullable and has no default".into(),
            });
        }

        if canonical.insert(name, value.clone()).is_some() {
            return Err(PlanError::InvalidArgument {
                path: arg_path,
                name: raw_name.clone(),
                reason: "duplicate argument after name canonicalization".into(),
            });
        }
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ArgumentSpec;
    use serde_json::json;

    fn signature() -> CalculationSignature {
        CalculationSignature::scalar()
            .arg("prefix", ArgumentSpec::required())
            .arg("max_length", ArgumentSpec::with_default(json!(80)))
            .arg("separator", ArgumentSpec::nullable())
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn canonicalizes_camel_keys() {
        let args = as_map(json!({ "maxLength": 10 }));
        let out = process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap();
        assert_eq!(out.get("max_length"), Some(&json!(10)));
        assert!(out.get("maxLength").is_none());
    }

    #[test]
    fn unknown_argument_errors_with_path() {
        let args = as_map(json!({ "suffix": "!" }));
        let err =
            process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap_err();
        match err {
            PlanError::UnknownArgument { path, name } => {
                assert_eq!(path, "/display/suffix");
                assert_eq!(name, "suffix");
            }
            other => panic!("expected UnknownArgument, got {other:?}"),
        }
    }

    #[test]
    fn null_for_required_argument_errors() {
        let args = as_map(json!({ "prefix": null }));
        let err =
            process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }

    #[test]
    fn null_is_fine_with_default_or_nullable() {
        let args = as_map(json!({ "maxLength": null, "separator": null }));
        let out = process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap();
        assert_eq!(out.get("max_length"), Some(&json!(null)));
        assert_eq!(out.get("separator"), Some(&json!(null)));
    }

    #[test]
    fn values_pass_through_untouched() {
        // No casting: a string stays a string even where a number is likely.
        let args = as_map(json!({ "maxLength": "10" }));
        let out = process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap();
        assert_eq!(out.get("max_length"), Some(&json!("10")));
    }

    #[test]
    fn empty_args_stay_empty() {
        let args = Map::new();
        let out = process_arguments(&args, &signature(), FieldFormat::Camel, "/display").unwrap();
        assert!(out.is_empty());
    }
}
