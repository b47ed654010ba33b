use serde_json::{Map, Value};

/// Read-only view over a JSON object with defensive, typed field access.
///
/// A field that is absent or of an unexpected type reads as the zero value of
/// the requested type (`""`, `0.0`, `0`), never as an error.
#[derive(Debug, Clone, Copy)]
pub struct LooseRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> LooseRecord<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wraps `value` if it is a JSON object.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_object().map(Self::new)
    }

    pub fn str_field(&self, key: &str) -> &'a str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn f64_field(&self, key: &str) -> f64 {
        self.fields.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Integers, or floats truncated toward zero.
    pub fn i64_field(&self, key: &str) -> i64 {
        match self.fields.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Nested object, if present and of object type.
    pub fn record(&self, key: &str) -> Option<LooseRecord<'a>> {
        self.fields.get(key).and_then(LooseRecord::from_value)
    }

    /// Nested array of objects. Non-object entries are skipped and counted.
    pub fn records(&self, key: &str) -> (Vec<LooseRecord<'a>>, usize) {
        match self.fields.get(key) {
            Some(Value::Array(items)) => {
                let records: Vec<LooseRecord<'a>> =
                    items.iter().filter_map(LooseRecord::from_value).collect();
                let skipped = items.len() - records.len();
                (records, skipped)
            }
            _ => (Vec::new(), 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_accessors_degrade_to_zero_values() {
        let value = json!({
            "name": "ssh-bf",
            "count": 3,
            "ratio": 2.5,
            "wrong": ["not", "a", "string"],
            "id_as_float": 42.9,
            "id_as_string": "42"
        });
        let record = LooseRecord::from_value(&value).unwrap();

        assert_eq!(record.str_field("name"), "ssh-bf");
        assert_eq!(record.str_field("count"), "");
        assert_eq!(record.str_field("missing"), "");
        assert_eq!(record.f64_field("ratio"), 2.5);
        assert_eq!(record.f64_field("count"), 3.0);
        assert_eq!(record.f64_field("wrong"), 0.0);
        assert_eq!(record.i64_field("count"), 3);
        assert_eq!(record.i64_field("id_as_float"), 42);
        assert_eq!(record.i64_field("id_as_string"), 0);
    }

    #[test]
    fn records_skips_non_objects() {
        let value = json!({"items": [{"a": 1}, 7, "x", {"b": 2}], "scalar": 1});
        let record = LooseRecord::from_value(&value).unwrap();

        let (items, skipped) = record.records("items");
        assert_eq!(items.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(items[1].i64_field("b"), 2);

        let (none, skipped) = record.records("scalar");
        assert!(none.is_empty());
        assert_eq!(skipped, 0);
        assert!(record.record("scalar").is_none());
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(LooseRecord::from_value(&json!([1, 2])).is_none());
        assert!(LooseRecord::from_value(&json!(null)).is_none());
    }
}
