use serde_json::Value;

use crate::types::{BoundParameters, DispatchError, ParamType, ParamValue, ToolSchema};

impl ToolSchema {
    /// Validate structured arguments against the declared parameters.
    ///
    /// Values must already be JSON numbers; no string coercion happens on
    /// this path.
    pub fn validate_arguments(&self, args: &Value) -> Result<BoundParameters, DispatchError> {
        let empty = serde_json::Map::new();
        let obj = match args {
            Value::Null => &empty,
            Value::Object(obj) => obj,
            other => {
                return Err(DispatchError::invalid(
                    "arguments",
                    format!("expected an object, got {}", json_type(other)),
                ))
            }
        };

        // Reject unexpected fields.
        if let Some(extra) = obj
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(DispatchError::invalid(
                extra.as_str(),
                format!("unexpected argument for tool \"{}\"", self.name),
            ));
        }

        let mut bound = BoundParameters::new();
        for param in &self.params {
            let value = obj.get(&param.name).ok_or_else(|| {
                DispatchError::invalid(&param.name, "missing required argument")
            })?;
            let typed = match param.ty {
                ParamType::Float => ParamValue::Number(expect_number(&param.name, value, None)?),
                ParamType::FloatList => {
                    let items = value.as_array().ok_or_else(|| {
                        DispatchError::invalid(
                            &param.name,
                            format!("expected {}, got {}", param.ty, json_type(value)),
                        )
                    })?;
                    let numbers = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| expect_number(&param.name, item, Some(i)))
                        .collect::<Result<Vec<_>, _>>()?;
                    ParamValue::List(numbers)
                }
            };
            bound.insert(param.name.clone(), typed);
        }

        Ok(bound)
    }
}

fn expect_number(param: &str, value: &Value, position: Option<usize>) -> Result<f64, DispatchError> {
    value.as_f64().ok_or_else(|| {
        let at = position.map(|p| format!(" at position {p}")).unwrap_or_default();
        DispatchError::InvalidArgument {
            param: param.to_string(),
            token: Some(value.to_string()),
            position,
            reason: format!("expected a number{at}, got {}", json_type(value)),
        }
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_tools;
    use serde_json::json;

    fn make_tool(schema_json: &str) -> ToolSchema {
        let json = format!(
            r#"[{{"name":"test","description":"test","inputSchema":{}}}]"#,
            schema_json
        );
        let tools = parse_tools(json.as_bytes()).unwrap();
        tools.into_iter().next().unwrap()
    }

    fn numbers_tool() -> ToolSchema {
        make_tool(
            r#"{"type":"object","properties":{"numbers":{"type":"array","items":{"type":"number"}}},"required":["numbers"]}"#,
        )
    }

    #[test]
    fn test_validate_list_present() {
        let bound = numbers_tool()
            .validate_arguments(&json!({"numbers": [10, 20.5, -3]}))
            .unwrap();
        assert_eq!(bound.list("numbers"), Some(&[10.0, 20.5, -3.0][..]));
    }

    #[test]
    fn test_validate_empty_list_allowed() {
        let bound = numbers_tool()
            .validate_arguments(&json!({"numbers": []}))
            .unwrap();
        assert_eq!(bound.list("numbers"), Some(&[][..]));
    }

    #[test]
    fn test_validate_missing() {
        let err = numbers_tool().validate_arguments(&json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required argument"));
        assert!(err.to_string().contains("numbers"));

        let err = numbers_tool().validate_arguments(&Value::Null).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
    }

    #[test]
    fn test_validate_extra_field() {
        let err = numbers_tool()
            .validate_arguments(&json!({"numbers": [1], "scale": 2}))
            .unwrap_err();
        assert!(err.to_string().contains("\"scale\""));
    }

    #[test]
    fn test_validate_string_elements_not_coerced() {
        let err = numbers_tool()
            .validate_arguments(&json!({"numbers": [1, "2", 3]}))
            .unwrap_err();
        match err {
            DispatchError::InvalidArgument {
                param,
                token,
                position,
                ..
            } => {
                assert_eq!(param, "numbers");
                assert_eq!(token.as_deref(), Some("\"2\""));
                assert_eq!(position, Some(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_list_type_mismatch() {
        let err = numbers_tool()
            .validate_arguments(&json!({"numbers": 5}))
            .unwrap_err();
        assert!(err.to_string().contains("expected list<float>, got number"));
    }

    #[test]
    fn test_validate_scalar_params() {
        let tool = make_tool(
            r#"{"type":"object","properties":{"a":{"type":"number"},"b":{"type":"number"}},"required":["a","b"]}"#,
        );
        let bound = tool.validate_arguments(&json!({"a": 1.5, "b": 2})).unwrap();
        assert_eq!(bound.operands().collect::<Vec<_>>(), vec![1.5, 2.0]);

        assert!(tool.validate_arguments(&json!({"a": true, "b": 2})).is_err());
    }

    #[test]
    fn test_validate_non_object_arguments() {
        let err = numbers_tool().validate_arguments(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }
}
