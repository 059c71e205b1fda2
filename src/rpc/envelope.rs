//! Typed JSON-RPC wire shapes
//!
//! Every handler result and every error travels through these structs and one
//! shared serde path, so the `{result}` / `{error}` exclusivity is a property
//! of the types rather than of handler discipline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::registry::{ResourceDescriptor, ToolDescriptor};

pub const JSONRPC_VERSION: &str = "2.0";

/// A decoded inbound request. `id` keeps the raw JSON value so the echo
/// preserves its type exactly.
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl InboundRequest {
    /// A present, non-null id demands a response; absent and JSON null are
    /// both notification-shaped.
    pub fn effective_id(&self) -> Option<Value> {
        match &self.id {
            Some(Value::Null) | None => None,
            Some(id) => Some(id.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Serialize)]
pub enum ResponseBody {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(ErrorBody),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

#[derive(Debug, Serialize)]
pub struct ErrorData {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ResponseEnvelope {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Result(result),
        }
    }

    pub fn error(id: Value, error: &AppError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            body: ResponseBody::Error(ErrorBody::from_error(error)),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("response envelope serialization")
    }
}

impl ErrorBody {
    pub fn from_error(error: &AppError) -> Self {
        Self {
            code: error.kind.code(),
            message: error.message.clone(),
            data: Some(ErrorData {
                kind: error.kind.as_str(),
                hint: error.hint.clone(),
                detail: error.detail.clone(),
            }),
        }
    }
}

/// The envelope pushed to streaming connections.
#[derive(Debug, Serialize)]
pub struct NotificationEnvelope {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: NotificationParams,
}

#[derive(Debug, Serialize)]
pub struct NotificationParams {
    pub event: String,
    pub payload: Value,
}

impl NotificationEnvelope {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: "notification",
            params: NotificationParams {
                event: event.into(),
                payload,
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("notification envelope serialization")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: &'static str,
    pub server_info: ServerIdentity,
    pub capabilities: ServerCapabilities,
    pub instructions: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServerIdentity {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: ListingCapability,
    pub resources: ResourceCapability,
    pub streaming: StreamingCapability,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCapability {
    pub list_changed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapability {
    pub subscribe: bool,
    pub list_changed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingCapability {
    pub chunked_http: bool,
    pub event_stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
}

#[derive(Debug, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: &'static str,
    pub text: String,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    pub json: Value,
}

impl ToolContent {
    /// Wrap a tool's return value as a single content item carrying both the
    /// JSON-serialized text form and the structured value itself.
    pub fn json_text(value: Value) -> Self {
        Self {
            content_type: "text",
            text: serde_json::to_string(&value).expect("tool result serialization"),
            mime_type: "application/json",
            json: value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

#[derive(Debug, Serialize)]
pub struct ResourceContent {
    pub uri: String,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
    pub text: String,
}

/// Payload of the `tool_result` notification emitted for every tool call.
#[derive(Debug, Serialize)]
pub struct ToolResultEvent {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolResultError>,
}

#[derive(Debug, Serialize)]
pub struct ToolResultError {
    pub code: i64,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl ToolResultEvent {
    pub fn success(name: impl Into<String>, result: Value) -> Self {
        Self {
            name: name.into(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: &AppError) -> Self {
        Self {
            name: name.into(),
            ok: false,
            result: None,
            error: Some(ToolResultError {
                code: error.kind.code(),
                kind: error.kind.as_str(),
                message: error.message.clone(),
                hint: error.hint.clone(),
                detail: error.detail.clone(),
            }),
        }
    }
}
