use std::collections::BTreeMap;

use serde::{Serialize, Serializer, ser::SerializeStruct};

/// A single action the completion engine asked us to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub name: String,
    pub arguments: ActionArgs,
    /// Opaque id the result must be submitted against.
    pub call_id: String,
}

/// Named string arguments for an action.
///
/// The engine sends arguments as a JSON object. Everything is flattened to
/// strings here and typed again by the registry against each handler's
/// declared parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionArgs(BTreeMap<String, String>);

impl ActionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the JSON-encoded argument object of a function call.
    ///
    /// Strings are kept verbatim, numbers and booleans are stringified,
    /// `null` entries are dropped and nested values are kept as compact JSON.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let map = object
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Number(n) => n.to_string(),
                    nested => nested.to_string(),
                };
                Some((key.clone(), text))
            })
            .collect();
        Self(map)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Argument parsed as an integer. `None` when absent or not a number.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ActionArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Outcome of one action. Exactly one of info or error is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Ok(serde_json::Value),
    Err(String),
}

impl ActionResult {
    /// Success with no payload.
    pub fn done() -> Self {
        Self::Ok(serde_json::Value::Null)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Err(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn info(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Ok(info) => Some(info),
            Self::Err(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Err(message) => Some(message),
        }
    }

    /// Compact JSON submitted back to the engine as the call output.
    pub fn to_output(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => format!(r#"{{"success":false,"info":null,"error":"{e}"}}"#),
        }
    }
}

impl Serialize for ActionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ActionResult", 3)?;
        match self {
            Self::Ok(info) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("info", info)?;
                state.serialize_field("error", &None::<String>)?;
            },
            Self::Err(message) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("info", &serde_json::Value::Null)?;
                state.serialize_field("error", message)?;
            },
        }
        state.end()
    }
}
