use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded token payload.
///
/// Claims are schema-less across issuers, so they stay a string-keyed JSON map.
/// Typed fields (expiry, subject) are extracted on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// Compact JSON for the outbound header.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}
