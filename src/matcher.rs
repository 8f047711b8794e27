//! Resolves a concrete resource URI against the frozen registry and binds
//! its parameters.
//!
//! Slot text is coerced to `f64`: single-value slots parse the whole
//! segment, variadic slots split on `,` and parse each trimmed piece. Any
//! failure is an [`InvalidArgument`](DispatchError::InvalidArgument) naming
//! the offending token, and the handler is never reached.

use crate::registry::{Registry, ResourceEntry};
use crate::template::RawBinding;
use crate::types::{BoundParameters, DispatchError, ParamType, ParamValue};

/// Find the most specific template matching `uri` and coerce its bindings.
pub fn resolve<'r>(
    registry: &'r Registry,
    uri: &'r str,
) -> Result<(&'r ResourceEntry, BoundParameters), DispatchError> {
    let Some((entry, bindings)) = registry.lookup_resource(uri).next() else {
        return Err(DispatchError::not_found(format!("Unknown resource: {uri}")));
    };
    tracing::debug!(uri, template = %entry.def.template, "resource matched");
    let params = bind(&bindings)?;
    Ok((entry, params))
}

/// Coerce raw slot bindings into typed parameters, preserving slot order.
pub fn bind(bindings: &[RawBinding<'_>]) -> Result<BoundParameters, DispatchError> {
    let mut params = BoundParameters::new();
    for binding in bindings {
        let value = match binding.ty {
            ParamType::Float => ParamValue::Number(coerce_number(binding.name, binding.raw, None)?),
            ParamType::FloatList => ParamValue::List(coerce_list(binding.name, binding.raw)?),
        };
        params.insert(binding.name, value);
    }
    Ok(params)
}

/// Split a comma-separated token list and parse every piece.
pub fn coerce_list(param: &str, raw: &str) -> Result<Vec<f64>, DispatchError> {
    if raw.trim().is_empty() {
        return Err(DispatchError::InvalidArgument {
            param: param.to_string(),
            token: Some(raw.to_string()),
            position: None,
            reason: "empty operand list".into(),
        });
    }
    raw.split(',')
        .enumerate()
        .map(|(i, token)| coerce_number(param, token, Some(i)))
        .collect()
}

/// Parse one decimal token. Non-finite values are rejected.
pub fn coerce_number(param: &str, raw: &str, position: Option<usize>) -> Result<f64, DispatchError> {
    let token = raw.trim();
    let invalid = |reason: String| DispatchError::InvalidArgument {
        param: param.to_string(),
        token: Some(token.to_string()),
        position,
        reason,
    };
    let at = position.map(|p| format!(" at position {p}")).unwrap_or_default();

    if token.is_empty() {
        return Err(invalid(format!("empty operand{at}")));
    }
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        Ok(_) => Err(invalid(format!("\"{token}\"{at} is not a finite number"))),
        Err(_) => Err(invalid(format!("\"{token}\"{at} is not a number"))),
    }
}
