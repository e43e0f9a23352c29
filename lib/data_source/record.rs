use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entity (datacenter or building) as exported, field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Identifier rendered for use in a url path.
    ///
    /// Only non-empty strings and numbers count as identifiers; `null`, `""`,
    /// booleans and containers mean the record has not been created remotely yet.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}
