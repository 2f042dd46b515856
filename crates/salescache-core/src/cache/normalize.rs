//! Response normalization.
//!
//! The backend has returned lists in several envelopes over time. Each entity
//! declares an ordered list of `ShapeMatcher`s; the first one that matches the
//! raw response supplies the records. No match means no records.

use serde_json::Value;

/// Standard list envelopes: bare array, `{data:[...]}`, `{data:{data:[...]}}`.
pub const STANDARD_LIST: &[ShapeMatcher] = &[
    ShapeMatcher::BareArray,
    ShapeMatcher::DataArray,
    ShapeMatcher::NestedDataArray,
];

/// Structural match for one historical response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeMatcher {
    /// `[...]`
    BareArray,
    /// `{data: [...]}` (also the standard `{status, message, data}` envelope)
    DataArray,
    /// `{data: {data: [...], pagination: {...}}}`
    NestedDataArray,
    /// `{<name>: [...]}`
    Named(&'static str),
    /// `{data: {<name>: [...]}}`
    DataNamed(&'static str),
}

impl ShapeMatcher {
    /// Return the records array if `raw` has this shape.
    pub fn extract<'a>(&self, raw: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            ShapeMatcher::BareArray => raw.as_array(),
            ShapeMatcher::DataArray => raw.get("data")?.as_array(),
            ShapeMatcher::NestedDataArray => raw.get("data")?.get("data")?.as_array(),
            ShapeMatcher::Named(name) => raw.get(*name)?.as_array(),
            ShapeMatcher::DataNamed(name) => raw.get("data")?.get(*name)?.as_array(),
        }
    }
}

/// Try each matcher in order and return the first match.
pub fn extract_records(matchers: &[ShapeMatcher], raw: &Value) -> Option<Vec<Value>> {
    matchers
        .iter()
        .find_map(|matcher| matcher.extract(raw))
        .cloned()
}

/// Matchers for lists that may also arrive keyed by their entity name.
pub const fn multi_envelope(name: &'static str) -> [ShapeMatcher; 4] {
    [
        ShapeMatcher::BareArray,
        ShapeMatcher::DataArray,
        ShapeMatcher::NestedDataArray,
        ShapeMatcher::Named(name),
    ]
}

/// Matchers for responses that carry the list in a named field.
pub const fn named_field(field: &'static str) -> [ShapeMatcher; 4] {
    [
        ShapeMatcher::DataNamed(field),
        ShapeMatcher::Named(field),
        ShapeMatcher::DataArray,
        ShapeMatcher::BareArray,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PURCHASE_ORDERS: [ShapeMatcher; 4] = multi_envelope("purchase_orders");

    #[test]
    fn test_all_envelopes_normalize_to_same_records() {
        let expected = vec![json!({"id": 9})];
        let shapes = [
            json!([{"id": 9}]),
            json!({"status": "success", "message": "", "data": [{"id": 9}]}),
            json!({"data": {"data": [{"id": 9}], "pagination": {"page": 1, "total": 1}}}),
            json!({"purchase_orders": [{"id": 9}]}),
        ];
        for raw in &shapes {
            assert_eq!(
                extract_records(&PURCHASE_ORDERS, raw),
                Some(expected.clone()),
                "shape {raw}"
            );
        }
    }

    #[test]
    fn test_unrecognized_shape_has_no_records() {
        assert_eq!(extract_records(&PURCHASE_ORDERS, &json!({"orders": [1]})), None);
        assert_eq!(extract_records(&PURCHASE_ORDERS, &json!("oops")), None);
        assert_eq!(extract_records(STANDARD_LIST, &Value::Null), None);
    }

    #[test]
    fn test_data_object_without_list_falls_through() {
        // {data:{...}} without an inner list does not match DataArray or NestedDataArray
        let raw = json!({"data": {"pagination": {}}});
        assert_eq!(extract_records(STANDARD_LIST, &raw), None);
    }

    #[test]
    fn test_named_field_priority() {
        let matchers = named_field("payment_methods");
        let raw = json!({"data": {"payment_methods": [{"id": "cash"}]}});
        assert_eq!(
            extract_records(&matchers, &raw),
            Some(vec![json!({"id": "cash"})])
        );

        let flat = json!({"status": "success", "payment_methods": [{"id": "card"}]});
        assert_eq!(
            extract_records(&matchers, &flat),
            Some(vec![json!({"id": "card"})])
        );
    }

    #[test]
    fn test_first_matching_envelope_wins() {
        // A bare array inside data takes priority over the named key
        let raw = json!({"data": [{"id": 1}], "purchase_orders": [{"id": 2}]});
        assert_eq!(
            extract_records(&PURCHASE_ORDERS, &raw),
            Some(vec![json!({"id": 1})])
        );
    }
}
