//! Error boundary: retry a protected expression, optionally fall back.
//!
//! Props:
//! - one child: the protected expression
//! - `retries`: extra attempts after the first; `-1` retries forever (default 0)
//! - `isRetryable`: function of the error returning a (possibly pending)
//!   boolean; absent means every error is retryable
//! - `handleCatch`: value, or function of the error, used once retries are
//!   exhausted on a retryable error
//! - `retryDelay`: milliseconds to wait between attempts (default 0)
//!
//! Every attempt is recorded as a `try` call node valued with its attempt
//! number; the fallback is recorded as a `catch` node.

use crate::call_tree::{record_call, CallKind};
use crate::context::options::{EXPECT_RESOURCE, FUNCTION_PARAMETERS};
use crate::context::{Context, Options};
use crate::error::{EvalError, EvalResult};
use crate::value::{Component, PropKind, PropSpec, Props, Value};
use std::time::Duration;
use tracing::{debug, info};

const NAME: &str = "ErrorBoundary";

pub fn error_boundary() -> Component {
    Component::from_async(NAME, |props, context| run(props, context))
        .prop(PropSpec::optional("retries", PropKind::Number))
        .prop(PropSpec::optional("isRetryable", PropKind::Function))
        .prop(PropSpec::optional("handleCatch", PropKind::Any))
        .prop(PropSpec::optional("retryDelay", PropKind::Number))
}

/// Where the boundary stands after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
enum AfterFailure {
    Retry,
    Catch,
    Propagate,
}

fn error_parameters(error: &EvalError) -> Options {
    Options::new().with(FUNCTION_PARAMETERS, Value::Array(vec![Value::Error(error.clone())]))
}

async fn is_retryable(context: &Context, predicate: Option<&Value>, error: &EvalError) -> EvalResult<bool> {
    let Some(predicate) = predicate else {
        return Ok(true);
    };
    let scope = context.extend(error_parameters(error).with(EXPECT_RESOURCE, false));
    Ok(scope.evaluate(predicate.clone()).await?.is_truthy())
}

async fn run(props: Props, context: Context) -> EvalResult<Value> {
    let child = props.single_child(NAME)?.clone();
    let retries = props.i64("retries").unwrap_or(0).max(-1);
    let predicate = props.attribute("isRetryable").cloned();
    let handle_catch = props.attribute("handleCatch").cloned();
    let retry_delay = props.i64("retryDelay").filter(|ms| *ms > 0).map(|ms| ms as u64);

    let mut attempt: i64 = 1;
    loop {
        let expression = child.clone();
        let outcome = record_call(&context, CallKind::Try, Value::from(attempt), |scope| async move {
            scope.evaluate(expression).await
        })
        .await;
        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        // a non-retryable error skips both the remaining attempts and the catch
        let exhausted = retries != -1 && attempt > retries;
        let next = if !is_retryable(&context, predicate.as_ref(), &error).await? {
            AfterFailure::Propagate
        } else if !exhausted {
            AfterFailure::Retry
        } else if handle_catch.is_some() {
            AfterFailure::Catch
        } else {
            AfterFailure::Propagate
        };
        debug!(attempt, retries, next = ?next, "attempt failed: {}", error);

        match next {
            AfterFailure::Propagate => return Err(error),
            AfterFailure::Catch => {
                let fallback = handle_catch.unwrap_or(Value::Null);
                let recorded = Value::Error(error.clone());
                return record_call(&context, CallKind::Catch, recorded, |scope| async move {
                    scope.extend(error_parameters(&error)).evaluate(fallback).await
                })
                .await;
            }
            AfterFailure::Retry => {
                info!("{}: retrying after attempt {} failed: {}", NAME, attempt, error);
                if let Some(ms) = retry_delay {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::create_context;
    use crate::service::RootSource;
    use crate::value::Virtual;
    use std::cell::Cell;
    use std::rc::Rc;

    fn flaky(failures: usize, calls: Rc<Cell<usize>>) -> Value {
        Value::function("flaky", move |_| {
            calls.set(calls.get() + 1);
            if calls.get() <= failures {
                Err(EvalError::service(format!("failure {}", calls.get())))
            } else {
                Ok(Value::from("ok"))
            }
        })
    }

    #[tokio::test]
    async fn test_succeeds_within_retry_budget() {
        let ctx = create_context(RootSource::default(), Options::new());
        let calls = Rc::new(Cell::new(0));
        let tree = Virtual::of(error_boundary())
            .attr("retries", 3)
            .child(flaky(2, calls.clone()));
        assert_eq!(ctx.evaluate(tree).await, Ok(Value::from("ok")));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_propagate_last_error() {
        let ctx = create_context(RootSource::default(), Options::new());
        let calls = Rc::new(Cell::new(0));
        let tree = Virtual::of(error_boundary())
            .attr("retries", 1)
            .child(flaky(10, calls.clone()));
        assert_eq!(ctx.evaluate(tree).await, Err(EvalError::service("failure 2")));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_handle_catch_receives_error() {
        let ctx = create_context(RootSource::default(), Options::new());
        let calls = Rc::new(Cell::new(0));
        let fallback = Value::function("fallback", |args| match args.first() {
            Some(Value::Error(e)) => Ok(Value::from(format!("caught: {}", e))),
            _ => Ok(Value::Null),
        });
        let tree = Virtual::of(error_boundary())
            .attr("handleCatch", fallback)
            .child(flaky(10, calls.clone()));
        assert_eq!(ctx.evaluate(tree).await, Ok(Value::from("caught: failure 1")));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_skips_catch() {
        let ctx = create_context(RootSource::default(), Options::new());
        let calls = Rc::new(Cell::new(0));
        let tree = Virtual::of(error_boundary())
            .attr("isRetryable", Value::function("never", |_| Ok(Value::Bool(false))))
            .attr("handleCatch", "fallback")
            .child(flaky(10, calls.clone()));
        assert_eq!(ctx.evaluate(tree).await, Err(EvalError::service("failure 1")));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_missing_child_is_a_shape_error() {
        let props = Props::default();
        assert!(matches!(
            props.single_child(NAME),
            Err(EvalError::ChildCount { found: 0, .. })
        ));
    }
}
