//! JSON-RPC method routing
//!
//! Decodes the request body, resolves legacy method aliases onto the
//! canonical name set, gates every non-streaming method through the rate
//! limiter, and dispatches to the matching handler. Transport-level failures
//! (parse, missing method, rate limit) are mapped here and never reach a
//! collaborator.

use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::rpc::envelope::{
    CallToolResult, InboundRequest, InitializeResult, ListResourcesResult, ListToolsResult,
    ListingCapability, ReadResourceResult, ResourceCapability, ResourceContent, ResponseEnvelope,
    ServerCapabilities, ServerIdentity, StreamingCapability, ToolContent, ToolResultEvent,
};
use crate::ServerHandle;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const STREAM_EVENTS_METHOD: &str = "stream_events";

const USAGE_INSTRUCTIONS: &str = "POST JSON-RPC 2.0 requests to /, /message, or /mcp. \
    Call list_tools and list_resources to discover the host surface, call_tool to run a \
    guarded operation, and read_resource for state snapshots. Subscribe to server events \
    with the stream_events method (chunked response) or a GET with Accept: text/event-stream.";

/// One-shot outcome of routing a request body.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub envelope: Option<ResponseEnvelope>,
}

impl Reply {
    fn ok(envelope: ResponseEnvelope) -> Self {
        Self {
            status: 200,
            envelope: Some(envelope),
        }
    }

    /// Bare HTTP acknowledgement for a notification-shaped request.
    fn accepted() -> Self {
        Self {
            status: 202,
            envelope: None,
        }
    }

    fn error(id: Option<Value>, error: &AppError) -> Self {
        Self {
            status: error.kind.http_status(),
            envelope: Some(ResponseEnvelope::error(id.unwrap_or(Value::Null), error)),
        }
    }

    fn status_only(status: u16) -> Self {
        Self {
            status,
            envelope: None,
        }
    }
}

#[derive(Debug)]
pub enum RouterOutcome {
    Reply(Reply),
    /// The request is a `stream_events` upgrade; the connection handler takes
    /// over the socket.
    StreamUpgrade,
}

/// Map legacy method aliases onto the canonical name set.
pub fn canonical_method(method: &str) -> &str {
    match method {
        "tools/list" => "list_tools",
        "tools/call" => "call_tool",
        "resources/read" => "read_resource",
        "resources/list" => "list_resources",
        other => other,
    }
}

pub async fn dispatch(handle: &ServerHandle, body: &str) -> RouterOutcome {
    let payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(error) => {
            let failure = AppError::parse_error("request body is not valid JSON")
                .with_detail(json!({"reason": error.to_string()}));
            failure.log_to(handle.log(), "rpc");
            return RouterOutcome::Reply(Reply::error(None, &failure));
        }
    };

    let request: InboundRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(_) => {
            let failure = AppError::invalid_request("request must be a JSON object");
            failure.log_to(handle.log(), "rpc");
            return RouterOutcome::Reply(Reply::error(None, &failure));
        }
    };

    let id = request.effective_id();
    let method = match request.method.as_deref().map(str::trim) {
        Some(method) if !method.is_empty() => canonical_method(method).to_string(),
        _ => {
            let failure = AppError::invalid_request("request method is required");
            failure.log_to(handle.log(), "rpc");
            return RouterOutcome::Reply(Reply::error(id, &failure));
        }
    };

    if method == STREAM_EVENTS_METHOD {
        return RouterOutcome::StreamUpgrade;
    }

    // Streaming upgrades never consume a slot; everything else does, and the
    // slot is released when `_slot` drops, on every exit path.
    let Some(_slot) = handle.limiter().try_acquire() else {
        let failure = AppError::rate_limited("too many parallel requests")
            .with_hint("retry after an in-flight request completes");
        failure.log_to(handle.log(), "rpc");
        return RouterOutcome::Reply(match id {
            Some(_) => Reply::error(id, &failure),
            None => Reply::status_only(failure.kind.http_status()),
        });
    };

    let result = route(handle, &method, request.params).await;
    info!(
        method = %method,
        outcome = if result.is_ok() { "success" } else { "failure" },
        "rpc action"
    );

    RouterOutcome::Reply(match (result, id) {
        (Ok(value), Some(id)) => Reply::ok(ResponseEnvelope::result(id, value)),
        (Ok(_), None) => Reply::accepted(),
        (Err(error), id) => {
            error.log_to(handle.log(), "rpc");
            match id {
                Some(_) => Reply::error(id, &error),
                None => Reply::status_only(error.kind.http_status()),
            }
        }
    })
}

async fn route(handle: &ServerHandle, method: &str, params: Option<Value>) -> Result<Value, AppError> {
    match method {
        "initialize" => initialize(),
        "notifications/initialized" => Ok(json!({"ok": true})),
        "ping" => Ok(json!({})),
        "list_tools" => Ok(to_wire(ListToolsResult {
            tools: handle.tools().list(),
        })),
        "list_resources" => Ok(to_wire(ListResourcesResult {
            resources: handle.resources().list(),
        })),
        "call_tool" => call_tool(handle, params).await,
        "read_resource" => read_resource(handle, params).await,
        _ => Err(AppError::method_not_found("method not found")
            .with_detail(json!({"method": method}))),
    }
}

fn initialize() -> Result<Value, AppError> {
    Ok(to_wire(InitializeResult {
        protocol_version: PROTOCOL_VERSION,
        server_info: ServerIdentity {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
        capabilities: ServerCapabilities {
            tools: ListingCapability {
                list_changed: false,
            },
            resources: ResourceCapability {
                subscribe: false,
                list_changed: false,
            },
            streaming: StreamingCapability {
                chunked_http: true,
                event_stream: true,
            },
        },
        instructions: USAGE_INSTRUCTIONS,
    }))
}

async fn call_tool(handle: &ServerHandle, params: Option<Value>) -> Result<Value, AppError> {
    let params = params.unwrap_or(Value::Null);
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::invalid_argument("params.name is required and must be a string"))?
        .to_string();
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    // Subscribers see every tool outcome, success or failure, even when they
    // did not issue the call.
    match handle.tools().invoke(&name, arguments).await {
        Ok(value) => {
            handle.broadcast(
                "tool_result",
                to_wire(ToolResultEvent::success(name.as_str(), value.clone())),
            );
            Ok(to_wire(CallToolResult {
                content: vec![ToolContent::json_text(value)],
            }))
        }
        Err(error) => {
            handle.broadcast(
                "tool_result",
                to_wire(ToolResultEvent::failure(name.as_str(), &error)),
            );
            Err(error)
        }
    }
}

async fn read_resource(handle: &ServerHandle, params: Option<Value>) -> Result<Value, AppError> {
    let params = params.unwrap_or(Value::Null);
    let uri = params
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::invalid_argument("params.uri is required and must be a string"))?;

    let value = handle.resources().read(uri).await?;
    Ok(to_wire(ReadResourceResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: "application/json",
            text: value.to_string(),
        }],
    }))
}

fn to_wire<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).expect("wire shape serialization")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{canonical_method, dispatch, Reply, RouterOutcome};
    use crate::config::Config;
    use crate::errors::AppError;
    use crate::exec::TokioSpawn;
    use crate::logging::BufferLog;
    use crate::registry::{
        ResourceDescriptor, StaticResourceRegistry, StaticToolRegistry, ToolDescriptor,
    };
    use crate::rpc::envelope::ResponseBody;
    use crate::ServerHandle;

    fn test_handle(max_parallel: usize) -> ServerHandle {
        let mut tools = StaticToolRegistry::new();
        tools.register(
            ToolDescriptor {
                name: "echo".to_string(),
                description: "Return the arguments unchanged".to_string(),
                input_schema: json!({"type": "object"}),
            },
            |arguments| async move { Ok(arguments) },
        );
        tools.register(
            ToolDescriptor {
                name: "locked".to_string(),
                description: "Always denied".to_string(),
                input_schema: json!({"type": "object"}),
            },
            |_| async { Err(AppError::permission_denied("write requires confirmation")) },
        );

        let mut resources = StaticResourceRegistry::new();
        resources.register(
            ResourceDescriptor {
                uri: "resource://scenes".to_string(),
                name: "Scenes".to_string(),
                description: "Top-level scene listing".to_string(),
                mime_type: "application/json".to_string(),
            },
            || async { Ok(json!({"scenes": []})) },
        );

        let config = Config {
            max_parallel_requests: max_parallel,
            ..Config::default()
        };
        ServerHandle::new(
            Arc::new(tools),
            Arc::new(resources),
            Arc::new(BufferLog::new(64)),
            &config,
            Arc::new(TokioSpawn),
        )
    }

    fn reply(outcome: RouterOutcome) -> Reply {
        match outcome {
            RouterOutcome::Reply(reply) => reply,
            RouterOutcome::StreamUpgrade => panic!("expected a reply, got an upgrade"),
        }
    }

    fn envelope_json(reply: &Reply) -> Value {
        serde_json::from_str(
            &reply
                .envelope
                .as_ref()
                .expect("reply should carry an envelope")
                .to_json(),
        )
        .expect("valid envelope json")
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(canonical_method("tools/list"), "list_tools");
        assert_eq!(canonical_method("tools/call"), "call_tool");
        assert_eq!(canonical_method("resources/read"), "read_resource");
        assert_eq!(canonical_method("resources/list"), "list_resources");
        assert_eq!(canonical_method("ping"), "ping");
    }

    #[tokio::test]
    async fn ping_echoes_id_unchanged() {
        let handle = test_handle(4);
        let outcome = dispatch(&handle, r#"{"jsonrpc":"2.0","id":"req-9","method":"ping"}"#).await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 200);
        let encoded = envelope_json(&reply);
        assert_eq!(encoded["id"], "req-9");
        assert!(encoded["result"].is_object());
    }

    #[tokio::test]
    async fn parse_error_replies_with_400() {
        let handle = test_handle(4);
        let outcome = dispatch(&handle, "{").await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 400);
        let encoded = envelope_json(&reply);
        assert_eq!(encoded["error"]["code"], -32700);
        assert_eq!(encoded["id"], Value::Null);
    }

    #[tokio::test]
    async fn missing_method_is_invalid_request() {
        let handle = test_handle(4);
        let outcome = dispatch(&handle, r#"{"jsonrpc":"2.0","id":1}"#).await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 400);
        assert_eq!(envelope_json(&reply)["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let handle = test_handle(4);
        let outcome =
            dispatch(&handle, r#"{"jsonrpc":"2.0","id":1,"method":"no_such_method"}"#).await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 400);
        assert_eq!(envelope_json(&reply)["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notification_without_id_is_accepted_with_empty_body() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 202);
        assert!(reply.envelope.is_none());
    }

    #[tokio::test]
    async fn initialized_with_id_gets_ok_envelope() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":3,"method":"notifications/initialized"}"#,
        )
        .await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 200);
        assert_eq!(envelope_json(&reply)["result"]["ok"], true);
    }

    #[tokio::test]
    async fn list_tools_alias_routes_to_registry() {
        let handle = test_handle(4);
        let outcome =
            dispatch(&handle, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;

        let encoded = envelope_json(&reply(outcome));
        assert_eq!(encoded["result"]["tools"][0]["name"], "echo");
        assert_eq!(encoded["result"]["tools"][1]["name"], "locked");
    }

    #[tokio::test]
    async fn call_tool_wraps_result_as_content_item() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":5,"method":"call_tool","params":{"name":"echo","arguments":{"value":7}}}"#,
        )
        .await;

        let encoded = envelope_json(&reply(outcome));
        let content = &encoded["result"]["content"][0];
        assert_eq!(content["type"], "text");
        assert_eq!(content["mimeType"], "application/json");
        assert_eq!(content["json"]["value"], 7);
        let text: Value = serde_json::from_str(content["text"].as_str().expect("text form"))
            .expect("text is serialized json");
        assert_eq!(text, content["json"]);
    }

    #[tokio::test]
    async fn call_tool_without_name_is_invalid_argument() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":6,"method":"call_tool","params":{"arguments":{}}}"#,
        )
        .await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 400);
        assert_eq!(envelope_json(&reply)["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn denied_tool_maps_to_permission_denied_status() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":7,"method":"call_tool","params":{"name":"locked"}}"#,
        )
        .await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 403);
        let encoded = envelope_json(&reply);
        assert_eq!(encoded["error"]["code"], -32003);
        assert_eq!(encoded["error"]["data"]["kind"], "permission_denied");
    }

    #[tokio::test]
    async fn read_resource_returns_contents() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":8,"method":"resources/read","params":{"uri":"resource://scenes"}}"#,
        )
        .await;

        let encoded = envelope_json(&reply(outcome));
        let contents = &encoded["result"]["contents"][0];
        assert_eq!(contents["uri"], "resource://scenes");
        assert_eq!(contents["mimeType"], "application/json");
        let text: Value = serde_json::from_str(contents["text"].as_str().expect("text form"))
            .expect("valid resource json");
        assert!(text["scenes"].is_array());
    }

    #[tokio::test]
    async fn unknown_resource_maps_to_not_found_status() {
        let handle = test_handle(4);
        let outcome = dispatch(
            &handle,
            r#"{"jsonrpc":"2.0","id":9,"method":"resources/read","params":{"uri":"resource://missing"}}"#,
        )
        .await;

        let reply = reply(outcome);
        assert_eq!(reply.status, 404);
        assert_eq!(envelope_json(&reply)["error"]["code"], -32004);
    }

    #[tokio::test]
    async fn stream_events_upgrades_without_taking_a_slot() {
        let handle = test_handle(1);
        let _held = handle.limiter().try_acquire().expect("exhaust the gate");

        let outcome =
            dispatch(&handle, r#"{"jsonrpc":"2.0","id":1,"method":"stream_events"}"#).await;
        assert!(matches!(outcome, RouterOutcome::StreamUpgrade));
    }

    #[tokio::test]
    async fn exhausted_gate_rejects_with_rate_limited() {
        let handle = test_handle(1);
        let _held = handle.limiter().try_acquire().expect("exhaust the gate");

        let outcome = dispatch(&handle, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
        let reply = reply(outcome);
        assert_eq!(reply.status, 429);
        assert_eq!(envelope_json(&reply)["error"]["code"], -32005);
    }

    #[tokio::test]
    async fn slot_is_released_after_each_request() {
        let handle = test_handle(1);

        for id in 0..3 {
            let body = format!(r#"{{"jsonrpc":"2.0","id":{id},"method":"ping"}}"#);
            let reply = reply(dispatch(&handle, &body).await);
            assert_eq!(reply.status, 200);
        }
        assert_eq!(handle.limiter().available(), 1);
    }

    #[tokio::test]
    async fn result_and_error_are_mutually_exclusive() {
        let handle = test_handle(4);
        let ok = reply(dispatch(&handle, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await);
        assert!(matches!(
            ok.envelope.as_ref().map(|e| &e.body),
            Some(ResponseBody::Result(_))
        ));

        let err = reply(dispatch(&handle, r#"{"jsonrpc":"2.0","id":1,"method":"nope"}"#).await);
        assert!(matches!(
            err.envelope.as_ref().map(|e| &e.body),
            Some(ResponseBody::Error(_))
        ));
    }
}
