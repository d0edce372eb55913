//! Call and result envelopes exchanged with the orchestrator.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::ProbeError;

/// Outcome of one probe: `{"status":"success","data":..}` or
/// `{"status":"error","message":..}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Error {
        message: String,
        /// Extra keys serialised beside `message` (e.g. `available_devices`).
        details: Map<String, Value>,
    },
}

impl ToolResult {
    pub fn success<T: Serialize>(data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::Success(value),
            Err(e) => Self::error(format!("Failed to serialize output: {e}")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success(data) => Some(data),
            Self::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message, .. } => Some(message),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| serialization_failure(&e))
    }
}

/// Error envelope used when a result cannot itself be serialized.
fn serialization_failure(err: &dyn std::fmt::Display) -> Value {
    json!({
        "status": "error",
        "message": format!("Failed to serialize output: {err}"),
    })
}

impl<T: Serialize> From<std::result::Result<T, ProbeError>> for ToolResult {
    fn from(result: std::result::Result<T, ProbeError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => e.into(),
        }
    }
}

impl From<ProbeError> for ToolResult {
    fn from(err: ProbeError) -> Self {
        let mut details = Map::new();
        if let ProbeError::DeviceNotFound { available, .. } = &err {
            details.insert("available_devices".into(), json!(available));
        }
        Self::Error {
            message: err.to_string(),
            details,
        }
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("status", "success")?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            Self::Error { message, details } => {
                let mut map = serializer.serialize_map(Some(2 + details.len()))?;
                map.serialize_entry("status", "error")?;
                map.serialize_entry("message", message)?;
                for (key, value) in details {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// One named probe invocation requested by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Unparsed argument text; takes precedence over `arguments` when present.
    #[serde(default)]
    pub raw_arguments: Option<String>,
}

impl CallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_raw_arguments(mut self, raw: impl Into<String>) -> Self {
        self.raw_arguments = Some(raw.into());
        self
    }

    pub fn with_argument(mut self, key: &str, value: Value) -> Self {
        self.arguments.insert(key.to_string(), value);
        self
    }
}

/// Chat-completion tool call, e.g.
/// `{"id":"..","type":"function","function":{"name":"..","arguments":"{}"}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl From<ToolCall> for CallRequest {
    fn from(call: ToolCall) -> Self {
        let mut request = CallRequest::new(call.id, call.function.name);
        match call.function.arguments {
            Some(Value::String(raw)) => request.raw_arguments = Some(raw),
            Some(Value::Object(map)) => request.arguments = map,
            None | Some(Value::Null) => {}
            Some(other) => warn!(
                "Arguments for {} are not a string or object (got {other}), using defaults",
                request.name
            ),
        }
        request
    }
}

/// Decode one call in either accepted shape. Objects carrying a `function`
/// key are chat tool calls; anything else is read as a native call.
pub fn decode_call(value: Value) -> serde_json::Result<CallRequest> {
    if value.get("function").is_some() {
        serde_json::from_value::<ToolCall>(value).map(CallRequest::from)
    } else {
        serde_json::from_value::<CallRequest>(value)
    }
}

/// One element of a batch, decoded independently of its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Call(CallRequest),
    /// An element that is not a valid call. `id` is whatever id could be
    /// recovered from it, or empty.
    Rejected { id: String, reason: String },
}

impl BatchEntry {
    fn decode(value: Value) -> Self {
        let id = match value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        match decode_call(value) {
            Ok(call) => Self::Call(call),
            Err(e) => Self::Rejected {
                id,
                reason: e.to_string(),
            },
        }
    }
}

/// Parse a JSON batch: a bare array of calls, or an assistant message
/// carrying them under `tool_calls`.
///
/// Only the outer shape can fail; each element is decoded on its own so a
/// bad element becomes a [`BatchEntry::Rejected`] in its original position.
pub fn parse_call_batch(text: &str) -> serde_json::Result<Vec<BatchEntry>> {
    use serde::de::Error as _;

    let elements = match serde_json::from_str::<Value>(text)? {
        Value::Array(elements) => elements,
        Value::Object(mut message) => match message.remove("tool_calls") {
            Some(Value::Array(elements)) => elements,
            _ => {
                return Err(serde_json::Error::custom(
                    "expected a `tool_calls` array in the message",
                ))
            }
        },
        other => {
            return Err(serde_json::Error::custom(format!(
                "expected an array of tool calls, got {other}"
            )))
        }
    };
    Ok(elements.into_iter().map(BatchEntry::decode).collect())
}

/// The result of one call, correlated by the caller's id.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub call_id: String,
    pub result: ToolResult,
}

impl CallResponse {
    pub fn new(call_id: impl Into<String>, result: ToolResult) -> Self {
        Self {
            call_id: call_id.into(),
            result,
        }
    }

    /// Render as a chat `tool` role message carrying the envelope as JSON text.
    pub fn to_chat_message(&self) -> Value {
        let content = serde_json::to_string(&self.result)
            .unwrap_or_else(|e| serialization_failure(&e).to_string());
        json!({
            "role": "tool",
            "tool_call_id": self.call_id,
            "content": content,
        })
    }
}

impl Serialize for CallResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("call_id", &self.call_id)?;
        match &self.result {
            ToolResult::Success(data) => {
                map.serialize_entry("status", "success")?;
                map.serialize_entry("data", data)?;
            }
            ToolResult::Error { message, details } => {
                map.serialize_entry("status", "error")?;
                map.serialize_entry("message", message)?;
                for (key, value) in details {
                    map.serialize_entry(key, value)?;
                }
            }
        }
        map.end()
    }
}
