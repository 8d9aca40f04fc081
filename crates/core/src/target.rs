//! Target-edition block: a name plus the canonical state string it was defined with.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{PropertySet, PropertyValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetValue {
    Bool(bool),
    Int(i32),
    Text(String),
}

impl From<&PropertyValue> for TargetValue {
    fn from(v: &PropertyValue) -> Self {
        match v {
            PropertyValue::Byte(b) => TargetValue::Bool(*b != 0),
            PropertyValue::Int(i) => TargetValue::Int(*i),
            PropertyValue::Text(s) => TargetValue::Text(s.clone()),
        }
    }
}

impl From<&TargetValue> for serde_json::Value {
    fn from(v: &TargetValue) -> Self {
        match v {
            TargetValue::Bool(b) => serde_json::Value::Bool(*b),
            TargetValue::Int(i) => serde_json::Value::from(*i),
            TargetValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetBlock {
    name: String,
    state: String,
    props: Vec<(String, TargetValue)>,
}

impl TargetBlock {
    /// A state that fails to parse leaves the block without typed properties; the raw
    /// string is still kept for display.
    pub fn new(name: impl Into<String>, state: impl Into<String>) -> Self {
        let name = name.into();
        let state = state.into();
        let props = match PropertySet::parse(&state) {
            Ok(set) => set.iter().map(|(n, v)| (n.to_string(), TargetValue::from(v))).collect(),
            Err(e) => {
                warn!(block = %name, error = %e, "target state is not a valid property set");
                Vec::new()
            }
        };
        Self { name, state, props }
    }

    pub fn name(&self) -> &str { &self.name }
    /// State string as supplied, quotes included.
    pub fn state(&self) -> &str { &self.state }
    pub fn props(&self) -> &[(String, TargetValue)] { &self.props }

    pub fn has_state(&self) -> bool { !(self.state.is_empty() || self.state == "{}") }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.props.iter().map(|(n, v)| (n.clone(), serde_json::Value::from(v))).collect();
        serde_json::Value::Object(map)
    }
}

impl PartialEq for TargetBlock {
    fn eq(&self, other: &Self) -> bool { self.name == other.name && self.state == other.state }
}

impl Eq for TargetBlock {}

/// Display form: bare name, or `name[state]` with every `"` removed.
impl fmt::Display for TargetBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_state() {
            return f.write_str(&self.name);
        }
        let full = format!("{}[{}]", self.name, self.state);
        f.write_str(&full.replace('"', ""))
    }
}
