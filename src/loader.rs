use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::registry::ResourceDef;
use crate::template::UriTemplate;
use crate::types::{ConfigError, McpError, ParamType, ToolSchema, MIME_TEXT_PLAIN};

/// Load tool definitions from a JSON file on disk.
pub fn load_tools(path: impl AsRef<Path>) -> Result<Vec<ToolSchema>, McpError> {
    let data = std::fs::read(path)?;
    parse_tools(&data)
}

/// Parse tool definitions from raw JSON bytes.
///
/// Each entry carries a JSON Schema `inputSchema`; every property must be
/// listed in `required` and be either a `number` or an `array` of numbers.
/// Parameters keep the order of `required`.
pub fn parse_tools(data: &[u8]) -> Result<Vec<ToolSchema>, McpError> {
    let raw: Vec<Value> = serde_json::from_slice(data)?;
    let mut tools = Vec::with_capacity(raw.len());

    for val in raw {
        let Some(name) = val["name"].as_str() else {
            return Err(ConfigError::InvalidSchema {
                tool: "<unnamed>".into(),
                reason: "missing \"name\"".into(),
            }
            .into());
        };
        let description = val["description"].as_str().unwrap_or_default();

        let mut schema = ToolSchema::new(name).description(description);
        for (param, ty) in parse_params(name, &val["inputSchema"])? {
            schema = schema.param(param, ty);
        }
        tools.push(schema);
    }

    Ok(tools)
}

/// Load resource definitions from a JSON file on disk.
pub fn load_resources(path: impl AsRef<Path>) -> Result<Vec<ResourceDef>, McpError> {
    let data = std::fs::read(path)?;
    parse_resources(&data)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResource {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "uri")]
    uri_template: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    expression: Option<RawExpression>,
}

#[derive(Debug, Deserialize)]
struct RawExpression {
    label: String,
    operator: String,
}

/// Parse resource definitions from raw JSON bytes.
pub fn parse_resources(data: &[u8]) -> Result<Vec<ResourceDef>, McpError> {
    let raw: Vec<RawResource> = serde_json::from_slice(data)?;
    let mut resources = Vec::with_capacity(raw.len());

    for r in raw {
        let template = UriTemplate::parse(&r.uri_template)?;
        let mut def = ResourceDef::new(r.name, template)
            .description(r.description)
            .mime_type(r.mime_type.unwrap_or_else(|| MIME_TEXT_PLAIN.into()));
        if let Some(expr) = r.expression {
            def = def.expression(expr.label, expr.operator);
        }
        resources.push(def);
    }

    Ok(resources)
}

/// Extract typed parameters from a JSON Schema object.
fn parse_params(tool: &str, schema: &Value) -> Result<Vec<(String, ParamType)>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSchema {
        tool: tool.to_string(),
        reason,
    };

    let empty = serde_json::Map::new();
    let properties = match schema.get("properties") {
        None => &empty,
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(invalid("\"properties\" must be an object".into())),
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    if let Some(optional) = properties.keys().find(|k| !required.contains(&k.as_str())) {
        return Err(invalid(format!(
            "optional parameter \"{optional}\" is not supported"
        )));
    }

    let mut params = Vec::with_capacity(required.len());
    for name in required {
        let prop = properties
            .get(name)
            .ok_or_else(|| invalid(format!("required parameter \"{name}\" has no schema")))?;
        let ty = match (prop["type"].as_str(), prop["items"]["type"].as_str()) {
            (Some("number"), _) => ParamType::Float,
            (Some("array"), Some("number")) => ParamType::FloatList,
            _ => {
                return Err(invalid(format!(
                    "parameter \"{name}\" must be a number or an array of numbers"
                )))
            }
        };
        params.push((name.to_string(), ty));
    }

    Ok(params)
}
