use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{data: [...]}` wrapper kept for consumers that expect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope {
    #[serde(default)]
    pub data: Vec<Value>,
}

impl DataEnvelope {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
