use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::types::{BoundParameters, DispatchError, HandlerError, OutcomeValue};

/// A pure value-in/value-out handler bound to a resource template or tool.
pub trait Handler: Send + Sync {
    fn call(&self, params: &BoundParameters) -> Result<OutcomeValue, HandlerError>;
}

/// Wraps a closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&BoundParameters) -> Result<OutcomeValue, HandlerError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Arc<dyn Handler> {
        Arc::new(Self { f })
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&BoundParameters) -> Result<OutcomeValue, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, params: &BoundParameters) -> Result<OutcomeValue, HandlerError> {
        (self.f)(params)
    }
}

/// Run `handler` synchronously. Errors and panics both become
/// [`DispatchError::HandlerFailure`]; a non-finite numeric result is also a
/// failure since it cannot be carried in JSON.
pub fn invoke(
    name: &str,
    handler: &dyn Handler,
    params: &BoundParameters,
) -> Result<OutcomeValue, DispatchError> {
    let failure = |detail: String| DispatchError::HandlerFailure {
        handler: name.to_string(),
        detail,
    };

    match panic::catch_unwind(AssertUnwindSafe(|| handler.call(params))) {
        Ok(Ok(OutcomeValue::Number(n))) if !n.is_finite() => {
            Err(failure(format!("result overflowed ({n})")))
        }
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(failure(e.to_string())),
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::error!(handler = name, %detail, "handler panicked");
            Err(failure(detail))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamValue;

    fn params(values: &[f64]) -> BoundParameters {
        let mut p = BoundParameters::new();
        p.insert("numbers", ParamValue::List(values.to_vec()));
        p
    }

    #[test]
    fn test_invoke_returns_outcome() {
        let h = FnHandler::new(|p: &BoundParameters| Ok(OutcomeValue::Number(p.operands().sum())));
        let out = invoke("add", h.as_ref(), &params(&[1.0, 2.0])).unwrap();
        assert_eq!(out, OutcomeValue::Number(3.0));
    }

    #[test]
    fn test_invoke_wraps_handler_error() {
        let h = FnHandler::new(|_: &BoundParameters| Err(HandlerError::new("division by zero")));
        let err = invoke("divide", h.as_ref(), &params(&[1.0])).unwrap_err();
        assert_eq!(
            err,
            DispatchError::HandlerFailure {
                handler: "divide".into(),
                detail: "division by zero".into()
            }
        );
    }

    #[test]
    fn test_invoke_catches_panic() {
        let h = FnHandler::new(|p: &BoundParameters| {
            let first = p.list("missing").expect("contract violated");
            Ok(OutcomeValue::Number(first[0]))
        });
        let err = invoke("broken", h.as_ref(), &params(&[1.0])).unwrap_err();
        match err {
            DispatchError::HandlerFailure { handler, detail } => {
                assert_eq!(handler, "broken");
                assert!(detail.contains("contract violated"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_invoke_rejects_overflow() {
        let h = FnHandler::new(|p: &BoundParameters| Ok(OutcomeValue::Number(p.operands().product())));
        let err = invoke("multiply", h.as_ref(), &params(&[1e308, 10.0])).unwrap_err();
        assert_eq!(err.kind(), "HandlerFailure");
        assert!(err.to_string().contains("overflowed"));
    }
}
