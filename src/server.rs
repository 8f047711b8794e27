use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use crate::invoker::{self, Handler};
use crate::loader;
use crate::matcher;
use crate::registry::{Registry, ResourceDef};
use crate::response;
use crate::types::*;

/// The MCP server: a frozen [`Registry`] plus JSON-RPC method routing.
/// Create with [`ServerBuilder`].
pub struct Server {
    server_name: String,
    server_version: String,
    registry: Registry,
    initialize_result: Arc<RawValue>,
    tools_list: Arc<RawValue>,
    resources_list: Arc<RawValue>,
    templates_list: Arc<RawValue>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    pub fn version(&self) -> &str {
        &self.server_version
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve, validate, invoke and package one request.
    pub fn dispatch(&self, request: &IncomingRequest) -> Result<ResponseEnvelope, DispatchError> {
        match request {
            IncomingRequest::ResourceRead { uri } => {
                let (entry, params) = matcher::resolve(&self.registry, uri)?;
                let outcome = invoker::invoke(&entry.def.name, entry.handler.as_ref(), &params)?;
                Ok(ResponseEnvelope::Resource(response::resource_envelope(
                    uri, &entry.def, &params, &outcome,
                )))
            }
            IncomingRequest::ToolCall { name, arguments } => {
                let entry = self
                    .registry
                    .lookup_tool(name)
                    .ok_or_else(|| DispatchError::not_found(format!("Unknown tool: {name}")))?;
                let params = entry.schema.validate_arguments(arguments)?;
                let outcome = invoker::invoke(name, entry.handler.as_ref(), &params)?;
                Ok(ResponseEnvelope::Tool(response::tool_envelope(&outcome)))
            }
        }
    }

    /// Route a JSON-RPC request to the appropriate MCP handler.
    pub fn handle(&self, req: JsonRpcRequest) -> McpResponse {
        if req.jsonrpc != "2.0" {
            return McpResponse::error(req.id, ERR_CODE_INVALID_REQ, "jsonrpc must be '2.0'");
        }

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => McpResponse::ok(req.id, json!({})),
            m if m.starts_with("notifications/") && req.id.is_none() => {
                McpResponse::notification()
            }
            "tools/list" => McpResponse::cached(req.id, &self.tools_list),
            "tools/call" => self.handle_tools_call(req),
            "resources/list" => McpResponse::cached(req.id, &self.resources_list),
            "resources/templates/list" => McpResponse::cached(req.id, &self.templates_list),
            "resources/read" => self.handle_resources_read(req),
            _ => McpResponse::error(
                req.id,
                ERR_CODE_NO_METHOD,
                format!("Method not found: {}", req.method),
            ),
        }
    }

    fn handle_initialize(&self, req: JsonRpcRequest) -> McpResponse {
        if let Some(params) = &req.params {
            if let Ok(p) = serde_json::from_value::<InitializeParams>(params.clone()) {
                let client_name = p.client_info.as_ref().map_or("", |c| c.name.as_str());
                let client_version = p.client_info.as_ref().map_or("", |c| c.version.as_str());
                tracing::info!(
                    client_name,
                    client_version,
                    protocol_version = ?p.protocol_version,
                    "initialize"
                );
            }
        }

        McpResponse::cached(req.id, &self.initialize_result)
    }

    fn handle_tools_call(&self, req: JsonRpcRequest) -> McpResponse {
        let params: ToolCallParams = match parse_params(&req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        let request = IncomingRequest::tool_call(params.name, params.arguments);
        self.respond(req.id, &request)
    }

    fn handle_resources_read(&self, req: JsonRpcRequest) -> McpResponse {
        let params: ResourceReadParams = match parse_params(&req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };
        let request = IncomingRequest::resource_read(params.uri);
        self.respond(req.id, &request)
    }

    fn respond(&self, id: Option<Value>, request: &IncomingRequest) -> McpResponse {
        match self.dispatch(request) {
            Ok(envelope) => match serde_json::to_value(&envelope) {
                Ok(value) => McpResponse::ok(id, value),
                Err(e) => McpResponse::error(id, ERR_CODE_INTERNAL, format!("encode result: {e}")),
            },
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "dispatch failed");
                response::error_response(id, &e)
            }
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(req: &JsonRpcRequest) -> Result<T, McpResponse> {
    let Some(params) = req.params.as_ref() else {
        return Err(McpResponse::error(req.id.clone(), ERR_CODE_BAD_PARAMS, "params required"));
    };
    serde_json::from_value(params.clone()).map_err(|e| {
        McpResponse::error(
            req.id.clone(),
            ERR_CODE_BAD_PARAMS,
            format!("invalid params: {e}"),
        )
    })
}

fn to_raw(value: &impl Serialize) -> Result<Arc<RawValue>, McpError> {
    Ok(Arc::from(serde_json::value::to_raw_value(value)?))
}

/// Builder for constructing an MCP Server.
///
/// Definitions come either typed ([`tool`](Self::tool),
/// [`resource`](Self::resource)) or from JSON plus a handler bound by name.
/// Every problem is reported by [`build`](Self::build), which refuses to
/// produce a server from an inconsistent configuration.
#[derive(Default)]
pub struct ServerBuilder {
    tools: Vec<(ToolSchema, Option<Arc<dyn Handler>>)>,
    resources: Vec<(ResourceDef, Option<Arc<dyn Handler>>)>,
    tool_handlers: HashMap<String, Arc<dyn Handler>>,
    resource_handlers: HashMap<String, Arc<dyn Handler>>,
    errors: Vec<McpError>,
    server_name: Option<String>,
    server_version: Option<String>,
}

impl ServerBuilder {
    /// Add a typed tool with its handler.
    pub fn tool(mut self, schema: ToolSchema, handler: Arc<dyn Handler>) -> Self {
        self.tools.push((schema, Some(handler)));
        self
    }

    /// Add a typed resource with its handler.
    pub fn resource(mut self, def: ResourceDef, handler: Arc<dyn Handler>) -> Self {
        self.resources.push((def, Some(handler)));
        self
    }

    /// Load tool definitions from a JSON file.
    pub fn tools_file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        match loader::load_tools(path) {
            Ok(tools) => self.tools.extend(tools.into_iter().map(|t| (t, None))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Parse tool definitions from raw JSON bytes.
    pub fn tools_json(mut self, data: &[u8]) -> Self {
        match loader::parse_tools(data) {
            Ok(tools) => self.tools.extend(tools.into_iter().map(|t| (t, None))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Load resource definitions from a JSON file.
    pub fn resources_file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        match loader::load_resources(path) {
            Ok(resources) => self.resources.extend(resources.into_iter().map(|r| (r, None))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Parse resource definitions from raw JSON bytes.
    pub fn resources_json(mut self, data: &[u8]) -> Self {
        match loader::parse_resources(data) {
            Ok(resources) => self.resources.extend(resources.into_iter().map(|r| (r, None))),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Bind a handler to a tool loaded from JSON.
    pub fn handle_tool(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let name = name.into();
        if self.tool_handlers.insert(name.clone(), handler).is_some() {
            self.errors.push(ConfigError::DuplicateTool(name).into());
        }
        self
    }

    /// Bind a handler to a resource loaded from JSON.
    pub fn handle_resource(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let name = name.into();
        if self.resource_handlers.insert(name.clone(), handler).is_some() {
            self.errors.push(ConfigError::DuplicateResource(name).into());
        }
        self
    }

    /// Set server name and version.
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self.server_version = Some(version.into());
        self
    }

    /// Bind handlers, freeze the registry and pre-serialize listings.
    pub fn build(mut self) -> Result<Server, McpError> {
        if !self.errors.is_empty() {
            let first = self.errors.swap_remove(0);
            for e in &self.errors {
                tracing::error!(error = %e, "configuration error");
            }
            return Err(first);
        }

        let mut seen = HashSet::new();
        if let Some((schema, _)) = self.tools.iter().find(|(t, _)| !seen.insert(t.name.as_str())) {
            return Err(ConfigError::DuplicateTool(schema.name.clone()).into());
        }
        let mut seen = HashSet::new();
        if let Some((def, _)) = self.resources.iter().find(|(r, _)| !seen.insert(r.name.as_str())) {
            return Err(ConfigError::DuplicateResource(def.name.clone()).into());
        }

        let mut registry = Registry::builder();
        for (schema, handler) in self.tools {
            let handler = match handler {
                Some(h) => h,
                None => self.tool_handlers.remove(&schema.name).ok_or_else(|| {
                    ConfigError::MissingHandler {
                        kind: "tool",
                        name: schema.name.clone(),
                    }
                })?,
            };
            registry.register_tool(schema, handler);
        }
        for (def, handler) in self.resources {
            let handler = match handler {
                Some(h) => h,
                None => self.resource_handlers.remove(&def.name).ok_or_else(|| {
                    ConfigError::MissingHandler {
                        kind: "resource",
                        name: def.name.clone(),
                    }
                })?,
            };
            registry.register_resource(def, handler);
        }
        if let Some(name) = self.tool_handlers.into_keys().next() {
            return Err(ConfigError::UnknownHandler { kind: "tool", name }.into());
        }
        if let Some(name) = self.resource_handlers.into_keys().next() {
            return Err(ConfigError::UnknownHandler {
                kind: "resource",
                name,
            }
            .into());
        }

        let registry = registry.freeze()?;
        let server_name = self.server_name.unwrap_or_else(|| "mcprouter".into());
        let server_version = self
            .server_version
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").into());

        let mut capabilities = serde_json::Map::new();
        if !registry.tools().is_empty() {
            capabilities.insert("tools".into(), json!({"listChanged": false}));
        }
        if !registry.resources().is_empty() {
            capabilities.insert(
                "resources".into(),
                json!({"subscribe": false, "listChanged": false}),
            );
        }
        let initialize_result = to_raw(&json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": {
                "name": server_name,
                "version": server_version,
            },
        }))?;
        let tools: Vec<Value> = registry.tools().iter().map(|t| t.schema.descriptor()).collect();
        let tools_list = to_raw(&json!({ "tools": tools }))?;
        let resources_list = to_raw(&json!({ "resources": registry.resource_descriptors() }))?;
        let templates_list =
            to_raw(&json!({ "resourceTemplates": registry.template_descriptors() }))?;

        Ok(Server {
            server_name,
            server_version,
            registry,
            initialize_result,
            tools_list,
            resources_list,
            templates_list,
        })
    }
}
