//! Integration tests for result projection, end-to-end pipeline, and the
//! engine's algebraic properties.

use fieldplan::{
    plan_request, project, run_selection, ArgumentSpec, AttributeType, CalculationSignature,
    ExecutionError, MemberKind, ProjectError, QueryExecutor, QueryPlan, ResourceSchema,
    SchemaRegistry, SelectContext, SelectError, UnionDef,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .register(
            ResourceSchema::new("todo")
                .attribute("id", AttributeType::Scalar)
                .attribute("title", AttributeType::Scalar)
                .attribute("completed", AttributeType::Scalar)
                .attribute("metadata", AttributeType::Embedded("todo_metadata".into()))
                .attribute(
                    "content",
                    AttributeType::Union(
                        UnionDef::type_and_value()
                            .member("note", MemberKind::Primitive)
                            .member("text", MemberKind::Embedded("text_content".into())),
                    ),
                )
                .attribute(
                    "attachment",
                    AttributeType::Union(
                        UnionDef::map_with_tag("attachment_type")
                            .member("text", MemberKind::Embedded("text_content".into())),
                    ),
                )
                .relationship("comments", "comment")
                .calculation(
                    "self",
                    CalculationSignature::resource("todo").arg("prefix", ArgumentSpec::nullable()),
                )
                .calculation("display_title", CalculationSignature::scalar())
                .aggregate("comment_count"),
        )
        .register(
            ResourceSchema::new("todo_metadata")
                .attribute("category", AttributeType::Scalar)
                .attribute("priority", AttributeType::Scalar),
        )
        .register(
            ResourceSchema::new("text_content")
                .attribute("text", AttributeType::Scalar)
                .attribute("word_count", AttributeType::Scalar)
                .attribute("formatting", AttributeType::Scalar),
        )
        .register(ResourceSchema::new("comment").attribute("body", AttributeType::Scalar))
}

fn ctx() -> SelectContext {
    SelectContext::new("todo")
}

fn run(spec: Value, raw: Value) -> Result<Value, ProjectError> {
    let planned = plan_request(&spec, &ctx(), &registry()).unwrap();
    project(&raw, &planned, &ctx(), &registry())
}

// === End-to-end scenarios ===

mod scenarios {
    use super::*;

    #[test]
    fn plain_selection_trims_to_requested_names() {
        // ["id","title"] on {id, title, completed}.
        let out = run(
            json!(["id", "title"]),
            json!({"id": "1", "title": "Buy milk", "completed": false}),
        )
        .unwrap();
        assert_eq!(out, json!({"id": "1", "title": "Buy milk"}));
    }

    #[test]
    fn recursive_calculation_round_trip() {
        let spec = json!([{"self": {"args": {"prefix": "x"}, "fields": ["id", {"self": {"args": {}, "fields": ["id"]}}]}}]);
        let raw = json!({
            "self": {
                "id": "1",
                "completed": false,
                "self": {"id": "1", "completed": false}
            }
        });
        let out = run(spec, raw).unwrap();
        assert_eq!(out, json!({"self": {"id": "1", "self": {"id": "1"}}}));
    }

    #[test]
    fn embedded_plain_child() {
        let out = run(
            json!([{"metadata": ["category"]}]),
            json!({"metadata": {"category": "chores", "priority": 2}}),
        )
        .unwrap();
        assert_eq!(out, json!({"metadata": {"category": "chores"}}));
    }

    #[test]
    fn union_structured_member_filtering() {
        let out = run(
            json!([{"content": ["note", {"text": ["wordCount"]}]}]),
            json!({"content": {
                "type": "text",
                "value": {"text": "hello world hi", "word_count": 3, "formatting": "md"}
            }}),
        )
        .unwrap();
        // formatting excluded; note branch absent.
        assert_eq!(out, json!({"content": {"text": {"wordCount": 3}}}));
    }
}

// === Properties ===

mod properties {
    use super::*;

    #[test]
    fn plain_round_trip_restricts_raw() {
        let raw = json!({"id": "1", "title": "t", "completed": true});
        let out = run(json!(["id", "title", "completed"]), raw.clone()).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn dual_nature_merges_into_one_object() {
        let registry = SchemaRegistry::new()
            .register(
                ResourceSchema::new("todo")
                    .attribute("metadata", AttributeType::Embedded("todo_metadata".into())),
            )
            .register(
                ResourceSchema::new("todo_metadata")
                    .attribute("category", AttributeType::Scalar)
                    .calculation("display_category", CalculationSignature::scalar()),
            );
        let spec = json!([{"metadata": ["category", "displayCategory"]}]);
        let planned = plan_request(&spec, &ctx(), &registry).unwrap();

        // Both buckets requested it.
        assert!(planned.plan.direct_fetch.contains("metadata"));
        assert_eq!(planned.plan.computed_load.len(), 1);

        // One merged object comes out.
        let raw = json!({"metadata": {
            "category": "chores",
            "display_category": "Chores",
            "internal": true
        }});
        let out = project(&raw, &planned, &ctx(), &registry).unwrap();
        assert_eq!(
            out,
            json!({"metadata": {"category": "chores", "displayCategory": "Chores"}})
        );
    }

    #[test]
    fn union_encoding_equivalence() {
        // Same logical value stored two ways projects identically.
        let spec_tv = json!([{"content": [{"text": ["wordCount"]}]}]);
        let spec_tag = json!([{"attachment": [{"text": ["wordCount"]}]}]);

        let out_tv = run(
            spec_tv,
            json!({"content": {"type": "text", "value": {"word_count": 3, "text": "x"}}}),
        )
        .unwrap();
        let out_tag = run(
            spec_tag,
            json!({"attachment": {"attachment_type": "text", "word_count": 3, "text": "x"}}),
        )
        .unwrap();

        assert_eq!(out_tv["content"], out_tag["attachment"]);
    }

    #[test]
    fn completeness_requested_and_present_means_included() {
        let raw = json!({"id": "1", "metadata": {"category": "c"}});
        let out = run(json!(["id", {"metadata": ["category"]}]), raw).unwrap();
        assert_eq!(out["id"], json!("1"));
        assert_eq!(out["metadata"], json!({"category": "c"}));
    }

    proptest! {
        // Subset: output keys never exceed the requested names, whatever
        // the raw result contains.
        #[test]
        fn projection_output_is_subset_of_request(
            raw in prop::collection::btree_map("[a-e]", any::<i32>(), 0..6)
        ) {
            let registry = SchemaRegistry::new().register(
                ResourceSchema::new("todo")
                    .attribute("a", AttributeType::Scalar)
                    .attribute("b", AttributeType::Scalar)
                    .attribute("c", AttributeType::Scalar),
            );
            let raw_value = Value::Object(
                raw.iter().map(|(k, v)| (k.clone(), json!(v))).collect::<Map<_, _>>(),
            );
            let planned = plan_request(&json!(["a", "b"]), &ctx(), &registry).unwrap();
            let out = project(&raw_value, &planned, &ctx(), &registry).unwrap();

            let out_map = out.as_object().unwrap();
            for key in out_map.keys() {
                prop_assert!(key == "a" || key == "b");
            }
            // Completeness within the request.
            for requested in ["a", "b"] {
                prop_assert_eq!(raw.contains_key(requested), out_map.contains_key(requested));
            }
        }

        // Idempotence: projecting identical inputs twice yields identical
        // output.
        #[test]
        fn projection_is_deterministic(
            raw in prop::collection::btree_map("[a-c]", any::<i64>(), 0..4)
        ) {
            let registry = SchemaRegistry::new().register(
                ResourceSchema::new("todo")
                    .attribute("a", AttributeType::Scalar)
                    .attribute("b", AttributeType::Scalar)
                    .attribute("c", AttributeType::Scalar),
            );
            let raw_value = Value::Object(
                raw.iter().map(|(k, v)| (k.clone(), json!(v))).collect::<Map<_, _>>(),
            );
            let planned = plan_request(&json!(["a", "c"]), &ctx(), &registry).unwrap();
            let once = project(&raw_value, &planned, &ctx(), &registry).unwrap();
            let twice = project(&raw_value, &planned, &ctx(), &registry).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}

// === Failure modes ===

mod failures {
    use super::*;

    #[test]
    fn not_loaded_is_a_hard_error_with_path() {
        let err = run(
            json!([{"metadata": ["category"]}, "displayTitle"]),
            json!({"metadata": {"category": "x"}}),
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::NotLoaded { path } if path == "/display_title"));
    }

    #[test]
    fn nil_computed_value_is_not_a_failure() {
        // Present-but-nil is a legitimately-nil computed value.
        let out = run(json!(["displayTitle"]), json!({"display_title": null})).unwrap();
        assert_eq!(out, json!({"displayTitle": null}));
    }
}

// === Pipeline ===

mod pipeline {
    use super::*;

    struct MapExecutor {
        result: Value,
    }

    impl QueryExecutor for MapExecutor {
        fn execute(&self, _resource: &str, plan: &QueryPlan) -> Result<Value, ExecutionError> {
            // The engine asked for a minimal plan; echo back a superset to
            // prove the projector trims it.
            assert!(plan.direct_fetch.contains("id"));
            Ok(self.result.clone())
        }
    }

    #[test]
    fn run_selection_projects_exactly() {
        let executor = MapExecutor {
            result: json!({"id": "1", "title": "t", "completed": true}),
        };
        let out = run_selection(&json!(["id"]), &ctx(), &registry(), &executor).unwrap();
        assert_eq!(out, json!({"id": "1"}));
    }

    #[test]
    fn failed_fetch_is_never_partially_projected() {
        struct Failing;
        impl QueryExecutor for Failing {
            fn execute(&self, _: &str, _: &QueryPlan) -> Result<Value, ExecutionError> {
                Err(ExecutionError::new("timed out"))
            }
        }
        let err = run_selection(&json!(["id"]), &ctx(), &registry(), &Failing).unwrap_err();
        assert!(matches!(err, SelectError::Execution(_)));
    }
}
