use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the application settings list.
///
/// Columns other than key and value are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(default)]
    pub settings_key: String,
    #[serde(default)]
    pub settings_value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Setting {
    pub fn new(key: &str, value: impl Into<Value>) -> Self {
        Self {
            settings_key: key.to_string(),
            settings_value: value.into(),
            extra: Map::new(),
        }
    }

    /// Parse a raw settings record. Records that are not objects are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}
