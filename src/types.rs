use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Value};

/// JSON-RPC 2.0 error codes.
pub const ERR_CODE_PARSE: i32 = -32700;
pub const ERR_CODE_INVALID_REQ: i32 = -32600;
pub const ERR_CODE_NO_METHOD: i32 = -32601;
pub const ERR_CODE_BAD_PARAMS: i32 = -32602;
pub const ERR_CODE_INTERNAL: i32 = -32603;
/// MCP-specific code for an unknown resource or tool.
pub const ERR_CODE_NOT_FOUND: i32 = -32002;

/// MCP Protocol version this server implements.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Default MIME type of resource reads.
pub const MIME_TEXT_PLAIN: &str = "text/plain";

// ── Request ──

/// Inbound JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// A request the dispatch core understands, already lifted out of JSON-RPC.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingRequest {
    ResourceRead { uri: String },
    ToolCall { name: String, arguments: Value },
}

impl IncomingRequest {
    pub fn resource_read(uri: impl Into<String>) -> Self {
        IncomingRequest::ResourceRead { uri: uri.into() }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        IncomingRequest::ToolCall {
            name: name.into(),
            arguments,
        }
    }
}

// ── Response ──

/// Response from [`Server::handle()`](crate::Server::handle).
///
/// Listing endpoints (`initialize`, `tools/list`, `resources/list`,
/// `resources/templates/list`) are pre-serialized once the registry is
/// frozen and shared via `Arc`.
///
/// Implements [`Serialize`]; the pre-serialized payload is embedded
/// verbatim. For structured inspection (e.g. in tests), call
/// [`into_json_rpc()`](McpResponse::into_json_rpc).
#[derive(Debug)]
pub struct McpResponse {
    id: Option<Value>,
    kind: ResponseKind,
}

#[derive(Debug)]
enum ResponseKind {
    /// Pre-serialized result.
    Cached(Arc<RawValue>),
    /// Dynamically constructed result.
    Result(Value),
    /// Error.
    Error(RpcError),
    /// Notification sentinel with no response body.
    Notification,
}

impl McpResponse {
    /// True when the request was a notification (no response body needed).
    pub fn is_notification(&self) -> bool {
        matches!(self.kind, ResponseKind::Notification)
    }

    /// True when this response carries a JSON-RPC error.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ResponseKind::Error(_))
    }

    /// Convert to a [`JsonRpcResponse`] for structured inspection.
    pub fn into_json_rpc(self) -> JsonRpcResponse {
        match self.kind {
            ResponseKind::Cached(raw) => JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: self.id,
                result: Some(serde_json::from_str(raw.get()).unwrap_or(Value::Null)),
                error: None,
            },
            ResponseKind::Result(value) => new_ok_response(self.id, value),
            ResponseKind::Error(error) => JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: self.id,
                result: None,
                error: Some(error),
            },
            ResponseKind::Notification => JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: None,
                result: None,
                error: None,
            },
        }
    }

    // ── Internal constructors ──

    pub(crate) fn cached(id: Option<Value>, raw: &Arc<RawValue>) -> Self {
        McpResponse {
            id,
            kind: ResponseKind::Cached(Arc::clone(raw)),
        }
    }

    pub(crate) fn ok(id: Option<Value>, result: Value) -> Self {
        McpResponse {
            id,
            kind: ResponseKind::Result(result),
        }
    }

    pub(crate) fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub(crate) fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        McpResponse {
            id,
            kind: ResponseKind::Error(RpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    pub(crate) fn notification() -> Self {
        McpResponse {
            id: None,
            kind: ResponseKind::Notification,
        }
    }
}

impl Serialize for McpResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_id = self.id.is_some();
        let has_payload = !matches!(self.kind, ResponseKind::Notification);
        let len = 1 + has_id as usize + has_payload as usize;

        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("jsonrpc", "2.0")?;

        if let Some(ref id) = self.id {
            map.serialize_entry("id", id)?;
        }

        match &self.kind {
            ResponseKind::Cached(raw) => map.serialize_entry("result", raw.as_ref())?,
            ResponseKind::Result(value) => map.serialize_entry("result", value)?,
            ResponseKind::Error(err) => map.serialize_entry("error", err)?,
            ResponseKind::Notification => {}
        }

        map.end()
    }
}

/// Structured JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Build a JSON-RPC error response.
pub fn new_error_response(id: Option<Value>, code: i32, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: message.into(),
            data: None,
        }),
    }
}

/// Build a JSON-RPC success response.
pub fn new_ok_response(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(result),
        error: None,
    }
}

// ── MCP content types ──

/// Single content block in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock {
            block_type: "text".into(),
            text: text.into(),
        }
    }
}

/// Resource content part of a `resources/read` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// `resources/read` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

/// `tools/call` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    pub structured_content: Value,
}

/// Successful outcome of a dispatch, ready to be placed in a JSON-RPC result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Resource(ReadResourceResult),
    Tool(ToolResult),
}

/// Entry of `resources/list`: a template without slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub mime_type: String,
}

/// Entry of `resources/templates/list`: a template with at least one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDescriptor {
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    pub mime_type: String,
}

// ── Typed parameters ──

/// Semantic type a parameter is coerced or validated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Float,
    FloatList,
}

impl ParamType {
    /// JSON Schema fragment describing this type.
    pub fn json_schema(self) -> Value {
        match self {
            ParamType::Float => json!({"type": "number"}),
            ParamType::FloatList => json!({"type": "array", "items": {"type": "number"}}),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Float => f.write_str("float"),
            ParamType::FloatList => f.write_str("list<float>"),
        }
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolParam {
    pub name: String,
    pub ty: ParamType,
}

/// Typed tool definition. Every declared parameter is required.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>) -> Self {
        ToolSchema {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ToolParam {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn input_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.ty.json_schema()))
            .collect();
        let required: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"result": {"type": "number"}},
            "required": ["result"],
        })
    }

    /// `tools/list` entry.
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
            "outputSchema": self.output_schema(),
        })
    }
}

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    List(Vec<f64>),
}

/// Parameters bound for one request, in slot/declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters {
    entries: Vec<(String, ParamValue)>,
}

impl BoundParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Number(n) => Some(*n),
            ParamValue::List(_) => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[f64]> {
        match self.get(name)? {
            ParamValue::List(values) => Some(values),
            ParamValue::Number(_) => None,
        }
    }

    /// Every bound number, lists flattened, in order.
    pub fn operands(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().flat_map(|(_, value)| match value {
            ParamValue::Number(n) => std::slice::from_ref(n).iter().copied(),
            ParamValue::List(values) => values.iter().copied(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw value returned by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeValue {
    Text(String),
    Number(f64),
}

// ── Errors ──

/// Per-request failure. Never fatal to the server.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    NotFound(String),
    #[error("invalid argument \"{param}\": {reason}")]
    InvalidArgument {
        param: String,
        token: Option<String>,
        position: Option<usize>,
        reason: String,
    },
    #[error("handler \"{handler}\" failed: {detail}")]
    HandlerFailure { handler: String, detail: String },
}

impl DispatchError {
    pub fn not_found(message: impl Into<String>) -> Self {
        DispatchError::NotFound(message.into())
    }

    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::InvalidArgument {
            param: param.into(),
            token: None,
            position: None,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound(_) => "NotFound",
            DispatchError::InvalidArgument { .. } => "InvalidArgument",
            DispatchError::HandlerFailure { .. } => "HandlerFailure",
        }
    }

    /// JSON-RPC error code this error is surfaced with.
    pub fn code(&self) -> i32 {
        match self {
            DispatchError::NotFound(_) => ERR_CODE_NOT_FOUND,
            DispatchError::InvalidArgument { .. } => ERR_CODE_BAD_PARAMS,
            DispatchError::HandlerFailure { .. } => ERR_CODE_INTERNAL,
        }
    }

    /// JSON-RPC error `data` payload.
    pub fn data(&self) -> Value {
        match self {
            DispatchError::NotFound(_) => json!({"kind": self.kind()}),
            DispatchError::InvalidArgument {
                param,
                token,
                position,
                ..
            } => {
                let mut data = json!({"kind": self.kind(), "param": param});
                if let Some(token) = token {
                    data["token"] = json!(token);
                }
                if let Some(position) = position {
                    data["position"] = json!(position);
                }
                data
            }
            DispatchError::HandlerFailure { handler, .. } => {
                json!({"kind": self.kind(), "handler": handler})
            }
        }
    }
}

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

/// Startup-time registration error. The server must not serve in this state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid template \"{template}\": {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("ambiguous resource templates \"{first}\" and \"{second}\"")]
    AmbiguousTemplates { first: String, second: String },
    #[error("duplicate tool \"{0}\"")]
    DuplicateTool(String),
    #[error("duplicate resource \"{0}\"")]
    DuplicateResource(String),
    #[error("invalid schema for tool \"{tool}\": {reason}")]
    InvalidSchema { tool: String, reason: String },
    #[error("no handler registered for {kind} \"{name}\"")]
    MissingHandler { kind: &'static str, name: String },
    #[error("handler registered for unknown {kind} \"{name}\"")]
    UnknownHandler { kind: &'static str, name: String },
}

/// Crate-level error type.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

// Internal params structs for deserialization.

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceReadParams {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operands_flatten_in_order() {
        let mut params = BoundParameters::new();
        params.insert("a", ParamValue::Number(1.5));
        params.insert("rest", ParamValue::List(vec![2.0, 3.0]));
        params.insert("b", ParamValue::Number(-4.0));
        let ops: Vec<f64> = params.operands().collect();
        assert_eq!(ops, vec![1.5, 2.0, 3.0, -4.0]);
        assert_eq!(params.number("a"), Some(1.5));
        assert_eq!(params.list("rest"), Some(&[2.0, 3.0][..]));
        assert_eq!(params.number("rest"), None);
        assert_eq!(params.len(), 3);
        let names: Vec<&str> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "rest", "b"]);
    }

    #[test]
    fn test_tool_schema_descriptor() {
        let schema = ToolSchema::new("add")
            .description("sum")
            .param("numbers", ParamType::FloatList);
        let desc = schema.descriptor();
        assert_eq!(desc["name"], "add");
        assert_eq!(desc["inputSchema"]["required"], json!(["numbers"]));
        assert_eq!(desc["inputSchema"]["properties"]["numbers"]["items"]["type"], "number");
        assert_eq!(desc["outputSchema"]["required"], json!(["result"]));
    }

    #[test]
    fn test_dispatch_error_data() {
        let err = DispatchError::InvalidArgument {
            param: "numbers".into(),
            token: Some("abc".into()),
            position: Some(1),
            reason: "\"abc\" is not a number".into(),
        };
        assert_eq!(err.code(), ERR_CODE_BAD_PARAMS);
        let data = err.data();
        assert_eq!(data["kind"], "InvalidArgument");
        assert_eq!(data["token"], "abc");
        assert_eq!(data["position"], 1);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_notification_serializes_without_payload() {
        let resp = McpResponse::notification();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0"}));
    }

    #[test]
    fn test_cached_response_serializes_verbatim() {
        let raw: Arc<RawValue> = Arc::from(RawValue::from_string(r#"{"tools":[]}"#.into()).unwrap());
        let resp = McpResponse::cached(Some(json!(7)), &raw);
        let text = serde_json::to_string(&resp).unwrap();
        assert_eq!(text, r#"{"jsonrpc":"2.0","id":7,"result":{"tools":[]}}"#);
    }
}
