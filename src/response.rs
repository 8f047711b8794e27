//! Turns handler outcomes and dispatch errors into protocol messages.

use serde_json::{json, Value};

use crate::registry::ResourceDef;
use crate::types::{
    BoundParameters, ContentBlock, DispatchError, McpResponse, OutcomeValue, ReadResourceResult,
    ResourceContent, ToolResult,
};

/// How a resource presents a numeric outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Render {
    /// The outcome as-is.
    #[default]
    Plain,
    /// `label: x op y op z = result`, operands in bound order.
    Expression { label: String, operator: String },
}

/// Render a float the same way everywhere: shortest round-trip form, with a
/// decimal point for integral values (`52.0`, `0.25`, `-5.0`).
pub fn format_number(n: f64) -> String {
    format!("{n:?}")
}

/// Text of a resource read.
pub fn render_text(render: &Render, params: &BoundParameters, outcome: &OutcomeValue) -> String {
    match (render, outcome) {
        (_, OutcomeValue::Text(text)) => text.clone(),
        (Render::Plain, OutcomeValue::Number(n)) => format_number(*n),
        (Render::Expression { label, operator }, OutcomeValue::Number(n)) => {
            let separator = format!(" {operator} ");
            let expression = params
                .operands()
                .map(format_number)
                .collect::<Vec<_>>()
                .join(separator.as_str());
            format!("{label}: {expression} = {}", format_number(*n))
        }
    }
}

/// `resources/read` result: exactly one content part.
pub fn resource_envelope(
    uri: &str,
    def: &ResourceDef,
    params: &BoundParameters,
    outcome: &OutcomeValue,
) -> ReadResourceResult {
    ReadResourceResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: def.mime_type.clone(),
            text: render_text(&def.render, params, outcome),
        }],
    }
}

/// `tools/call` result: a text part plus `structuredContent.result` holding
/// the raw value.
pub fn tool_envelope(outcome: &OutcomeValue) -> ToolResult {
    let (text, result) = match outcome {
        OutcomeValue::Number(n) => (format_number(*n), json!(n)),
        OutcomeValue::Text(text) => (text.clone(), Value::String(text.clone())),
    };
    ToolResult {
        content: vec![ContentBlock::text(text)],
        structured_content: json!({ "result": result }),
    }
}

/// Protocol-level error for a failed dispatch. Never a success envelope.
pub fn error_response(id: Option<Value>, err: &DispatchError) -> McpResponse {
    McpResponse::error_with_data(id, err.code(), err.to_string(), Some(err.data()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::UriTemplate;
    use crate::types::{ParamValue, ERR_CODE_NOT_FOUND};

    fn list_params(values: &[f64]) -> BoundParameters {
        let mut p = BoundParameters::new();
        p.insert("numbers", ParamValue::List(values.to_vec()));
        p
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(52.0), "52.0");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(-5.0), "-5.0");
        assert_eq!(format_number(3.333), "3.333");
    }

    #[test]
    fn test_expression_text_includes_operands_and_result() {
        let render = Render::Expression {
            label: "Toplama Sonucu".into(),
            operator: "+".into(),
        };
        let text = render_text(
            &render,
            &list_params(&[15.0, 27.0, 10.0]),
            &OutcomeValue::Number(52.0),
        );
        assert_eq!(text, "Toplama Sonucu: 15.0 + 27.0 + 10.0 = 52.0");
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = render_text(
            &Render::Plain,
            &BoundParameters::new(),
            &OutcomeValue::Text("Hello".into()),
        );
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_resource_envelope_shape() {
        let def = ResourceDef::new(
            "add",
            UriTemplate::parse("resource://addition/{numbers*}").unwrap(),
        )
        .expression("Sum", "+");
        let env = resource_envelope(
            "resource://addition/1,2",
            &def,
            &list_params(&[1.0, 2.0]),
            &OutcomeValue::Number(3.0),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["mimeType"], "text/plain");
        assert_eq!(json["contents"][0]["uri"], "resource://addition/1,2");
        assert_eq!(json["contents"][0]["text"], "Sum: 1.0 + 2.0 = 3.0");
    }

    #[test]
    fn test_tool_envelope_keeps_raw_number() {
        let env = tool_envelope(&OutcomeValue::Number(160.0));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["structuredContent"]["result"].as_f64(), Some(160.0));
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "160.0");
    }

    #[test]
    fn test_error_response_is_protocol_error() {
        let resp = error_response(
            Some(json!(3)),
            &DispatchError::not_found("Unknown resource: resource://invalid"),
        )
        .into_json_rpc();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, ERR_CODE_NOT_FOUND);
        assert_eq!(err.data.unwrap()["kind"], "NotFound");
    }
}
