//! Union value normalization.
//!
//! A tagged-union attribute has two physical storage encodings: an
//! explicit `{"type": tag, "value": payload}` pair, or a flat map whose
//! tag lives under a designated key inside the payload itself. Both
//! collapse here into one logical [`NormalizedUnion`] before any member
//! filtering happens; union-handling code downstream never sees the
//! storage mode.

use serde_json::Value;

use crate::metadata::{UnionDef, UnionStorage};
use crate::wire::is_scalar_wrapper;

/// The one logical shape every stored union value normalizes to.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUnion {
    pub tag: String,
    pub payload: Value,
}

/// Collapse a stored union value into `{tag, payload}`.
///
/// Returns `None` when the value does not carry a recognizable tag for
/// the declared storage mode; callers treat that as absence rather than
/// fabricating a value. Scalar wrappers are not union containers and are
/// never picked apart here.
pub fn normalize_union_value(raw: &Value, def: &UnionDef) -> Option<NormalizedUnion> {
    if is_scalar_wrapper(raw) {
        return None;
    }
    let Value::Object(map) = raw else {
        return None;
    };

    match &def.storage {
        UnionStorage::TypeAndValue => {
            let tag = map.get("type")?.as_str()?.to_string();
            let payload = map.get("value")?.clone();
            Some(NormalizedUnion { tag, payload })
        }
        UnionStorage::MapWithTag { tag_key } => {
            let tag = map.get(tag_key)?.as_str()?.to_string();
            let mut payload = map.clone();
            payload.shift_remove(tag_key);
            Some(NormalizedUnion {
                tag,
                payload: Value::Object(payload),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MemberKind;
    use serde_json::json;

    fn tv_def() -> UnionDef {
        UnionDef::type_and_value()
            .member("note", MemberKind::Primitive)
            .member("text", MemberKind::Embedded("text_content".into()))
    }

    fn tagged_def() -> UnionDef {
        UnionDef::map_with_tag("content_type")
            .member("text", MemberKind::Embedded("text_content".into()))
    }

    #[test]
    fn type_and_value_encoding() {
        let raw = json!({"type": "text", "value": {"text": "hi", "word_count": 1}});
        let norm = normalize_union_value(&raw, &tv_def()).unwrap();
        assert_eq!(norm.tag, "text");
        assert_eq!(norm.payload, json!({"text": "hi", "word_count": 1}));
    }

    #[test]
    fn type_and_value_primitive_payload() {
        let raw = json!({"type": "note", "value": "remember the milk"});
        let norm = normalize_union_value(&raw, &tv_def()).unwrap();
        assert_eq!(norm.tag, "note");
        assert_eq!(norm.payload, json!("remember the milk"));
    }

    #[test]
    fn map_with_tag_encoding() {
        let raw = json!({"content_type": "text", "text": "hi", "word_count": 1});
        let norm = normalize_union_value(&raw, &tagged_def()).unwrap();
        assert_eq!(norm.tag, "text");
        // The tag key is storage detail, not payload.
        assert_eq!(norm.payload, json!({"text": "hi", "word_count": 1}));
    }

    #[test]
    fn both_encodings_yield_identical_logical_shape() {
        let a = normalize_union_value(
            &json!({"type": "text", "value": {"text": "hi", "word_count": 1}}),
            &tv_def(),
        )
        .unwrap();
        let b = normalize_union_value(
            &json!({"content_type": "text", "text": "hi", "word_count": 1}),
            &tagged_def(),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scalar_wrapper_is_not_a_union_container() {
        let raw = json!({"$scalar": "datetime", "value": "2024-01-01T00:00:00Z"});
        assert_eq!(normalize_union_value(&raw, &tv_def()), None);
    }

    #[test]
    fn wrappers_inside_payload_pass_through_unchanged() {
        let raw = json!({
            "type": "text",
            "value": {"published_at": {"$scalar": "datetime", "value": "2024-01-01T00:00:00Z"}}
        });
        let norm = normalize_union_value(&raw, &tv_def()).unwrap();
        assert_eq!(
            norm.payload,
            json!({"published_at": {"$scalar": "datetime", "value": "2024-01-01T00:00:00Z"}})
        );
    }

    #[test]
    fn untagged_values_do_not_normalize() {
        assert_eq!(normalize_union_value(&json!("plain"), &tv_def()), None);
        assert_eq!(normalize_union_value(&json!({"value": 1}), &tv_def()), None);
        assert_eq!(
            normalize_union_value(&json!({"type": 7, "value": 1}), &tv_def()),
            None
        );
    }
}
