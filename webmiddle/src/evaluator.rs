//! The evaluator: normalizes any value until nothing is left to unwrap.
//!
//! Steps, retried from the top after every transformation:
//! 1. functions are called with the context's `functionParameters`
//! 2. pending values are awaited
//! 3. virtual nodes are called (through the call-tree recorder) and their
//!    output is evaluated in the call's context; a resource coming back
//!    picks up the node's own `name` / `contentType` attributes
//! 4. anything else is final; with `expectResource` it must be a resource
//!
//! A component returning another virtual opens a nested call without
//! recursing: open calls are kept on a frame stack and closed innermost
//! first once the chain settles. Every step of the chain, across all of its
//! calls, counts against one `maxSteps` budget.

use crate::call_tree::{begin_call, CallKind, CallRecording};
use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::value::{Props, Value, Virtual, VirtualType};
use std::rc::Rc;
use tracing::{debug, warn};

/// Fallback when neither options nor settings provide a step limit.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

pub async fn evaluate(context: &Context, value: Value) -> EvalResult<Value> {
    let mut frames = Vec::new();
    let mut outcome = reduce(context, value, &mut frames).await;
    while let Some(frame) = frames.pop() {
        outcome = frame.close(outcome);
    }
    outcome
}

/// Reduce `value` until it settles, pushing a frame for every call opened
/// on the way. The outcome belongs to the innermost frame, or to `context`
/// when no call was opened.
async fn reduce(context: &Context, value: Value, frames: &mut Vec<Frame>) -> EvalResult<Value> {
    let max_steps = context
        .options()
        .max_steps()
        .unwrap_or(context.settings().evaluation.max_steps);
    let mut scope = context.clone();
    let mut input = value.clone();
    let mut current = value;
    let mut steps = 0usize;

    loop {
        steps += 1;
        if steps > max_steps {
            return Err(EvalError::StepLimitExceeded(max_steps));
        }
        current = match current {
            Value::Function(function) => {
                let params = scope.options().function_parameters();
                debug!(function = function.name(), args = params.len(), "calling function");
                function.call(&params)?
            }
            Value::Pending(pending) => pending.resolve().await?,
            Value::Virtual(node) => {
                let frame = Frame::open(&scope, &input, node.clone());
                let call_context = frame.call_context.clone();
                frames.push(frame);
                match call_component(&call_context, &node)? {
                    Some(output) => {
                        scope = call_context;
                        input = output.clone();
                        output
                    }
                    None => return Ok(Value::Virtual(node)),
                }
            }
            other => return finish(&scope, &input, other),
        };
    }
}

/// Call the node's component. `None` means the node is terminal: a plain
/// name, or a component that handed back its own node.
fn call_component(call_context: &Context, node: &Rc<Virtual>) -> EvalResult<Option<Value>> {
    let VirtualType::Component(component) = &node.node_type else {
        return Ok(None);
    };

    let props = Props::from_virtual(node);
    for violation in component.validate(&props) {
        warn!("{}", violation);
    }
    debug!(component = component.name(), "calling component");
    let output = component.call(props, call_context.clone())?;

    if let Value::Virtual(produced) = &output {
        if Rc::ptr_eq(produced, node) {
            return Ok(None);
        }
    }
    Ok(Some(output))
}

/// One virtual call whose output is still being reduced.
struct Frame {
    node: Rc<Virtual>,
    call_context: Context,
    recording: Option<CallRecording>,
    /// Scope the call was opened in, and the value that scope started from.
    outer: Context,
    outer_input: Value,
}

impl Frame {
    fn open(scope: &Context, input: &Value, node: Rc<Virtual>) -> Self {
        let (call_context, recording) =
            begin_call(scope, CallKind::Virtual, Value::Virtual(node.clone()));
        Self {
            node,
            call_context,
            recording,
            outer: scope.clone(),
            outer_input: input.clone(),
        }
    }

    /// Settle the call with the outcome of its work and hand the result
    /// back to the scope that opened it.
    fn close(self, outcome: EvalResult<Value>) -> EvalResult<Value> {
        let overrides = ResourceOverride::from_virtual(&self.node);
        let outcome = outcome.map(|value| overrides.apply(&self.call_context, value));
        if let Some(recording) = self.recording {
            recording.finish(&outcome);
        }
        finish(&self.outer, &self.outer_input, outcome?)
    }
}

/// Name/content-type attributes a virtual node imposes on the resource it
/// resolves to.
#[derive(Debug, Default)]
struct ResourceOverride {
    name: Option<String>,
    content_type: Option<String>,
}

impl ResourceOverride {
    fn from_virtual(node: &Virtual) -> Self {
        let text = |key: &str| node.attribute(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: text("name"),
            content_type: text("contentType"),
        }
    }

    fn apply(&self, context: &Context, value: Value) -> Value {
        match value {
            Value::Resource(resource) if self.name.is_some() || self.content_type.is_some() => {
                Value::Resource(context.override_resource(
                    &resource,
                    self.name.as_deref(),
                    self.content_type.as_deref(),
                ))
            }
            other => other,
        }
    }
}

fn finish(context: &Context, input: &Value, value: Value) -> EvalResult<Value> {
    if context.options().expect_resource() && !value.is_resource() {
        return Err(EvalError::UnexpectedShape {
            input: input.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_context, options, Options};
    use crate::service::RootSource;
    use crate::value::{Component, PropKind, PropSpec};

    fn root(options: Options) -> Context {
        create_context(RootSource::default(), options)
    }

    #[tokio::test]
    async fn test_plain_values_are_fixed_points() {
        let ctx = root(Options::new());
        for value in [
            Value::Null,
            Value::from(3),
            Value::from("text"),
            Value::Array(vec![Value::from(1)]),
            Value::object([("k", Value::Bool(true))]),
        ] {
            assert_eq!(ctx.evaluate(value.clone()).await, Ok(value));
        }
    }

    #[tokio::test]
    async fn test_functions_receive_function_parameters() {
        let ctx = root(Options::new().with(
            options::FUNCTION_PARAMETERS,
            Value::Array(vec![Value::from(2), Value::from(5)]),
        ));
        let add = Value::function("add", |args| {
            let sum: f64 = args.iter().filter_map(Value::as_f64).sum();
            Ok(Value::Number(sum))
        });
        assert_eq!(ctx.evaluate(add).await, Ok(Value::from(7)));
    }

    #[tokio::test]
    async fn test_nested_functions_and_pendings_unwrap() {
        let ctx = root(Options::new());
        let value = Value::function("outer", |_| {
            Ok(Value::pending(async {
                Ok(Value::function("inner", |_| Ok(Value::from("done"))))
            }))
        });
        assert_eq!(ctx.evaluate(value).await, Ok(Value::from("done")));
    }

    #[tokio::test]
    async fn test_terminal_virtual_evaluates_to_itself() {
        let ctx = root(Options::new());
        let node = Value::from(Virtual::named("div").attr("id", "main"));
        assert_eq!(ctx.evaluate(node.clone()).await, Ok(node));
    }

    #[tokio::test]
    async fn test_expect_resource_rejects_other_values() {
        let ctx = root(Options::new().with(options::EXPECT_RESOURCE, true));
        let err = ctx.evaluate(Value::from(1)).await.unwrap_err();
        assert!(matches!(err, EvalError::UnexpectedShape { .. }));

        let terminal = ctx.evaluate(Virtual::named("div")).await.unwrap_err();
        assert!(matches!(terminal, EvalError::UnexpectedShape { .. }));
    }

    #[tokio::test]
    async fn test_step_limit_stops_runaway_functions() {
        fn forever() -> Value {
            Value::function("forever", |_| Ok(forever()))
        }
        let ctx = root(Options::new().with(options::MAX_STEPS, 50));
        assert_eq!(ctx.evaluate(forever()).await, Err(EvalError::StepLimitExceeded(50)));
    }

    /// Component that hands back a fresh node of itself, forever.
    fn runaway(calls: Rc<std::cell::Cell<usize>>) -> Component {
        Component::new("Runaway", move |_, _| {
            calls.set(calls.get() + 1);
            Ok(Value::from(Virtual::of(runaway(calls.clone()))))
        })
    }

    #[tokio::test]
    async fn test_step_limit_counts_every_call_in_a_chain() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let ctx = root(Options::new().with(options::MAX_STEPS, 5));
        let out = ctx.evaluate(Virtual::of(runaway(calls.clone()))).await;
        assert_eq!(out, Err(EvalError::StepLimitExceeded(5)));
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test]
    async fn test_step_limit_error_settles_every_open_call() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let ctx = root(Options::new().with(options::MAX_STEPS, 3).with(options::DEBUG, true));
        let out = ctx.evaluate(Virtual::of(runaway(calls))).await;
        assert_eq!(out, Err(EvalError::StepLimitExceeded(3)));

        let mut node = ctx.call_state()[0].clone();
        for path in ["0", "0.0", "0.0.0"] {
            assert_eq!(node.path(), path);
            assert_eq!(node.error(), Some(EvalError::StepLimitExceeded(3)));
            match node.children().first() {
                Some(child) => node = child.clone(),
                None => break,
            }
        }
    }

    #[tokio::test]
    async fn test_long_virtual_chain_runs_in_constant_stack() {
        fn countdown() -> Component {
            Component::new("Countdown", |props, context| {
                match props.i64("n").unwrap_or(0) {
                    0 => Ok(Value::Resource(context.create_resource("done", "text/plain", "0"))),
                    n => Ok(Value::from(Virtual::of(countdown()).attr("n", n - 1))),
                }
            })
        }
        let ctx = root(Options::new().with(options::MAX_STEPS, 100_000));
        let out = ctx
            .evaluate(Virtual::of(countdown()).attr("n", 20_000).attr("name", "top"))
            .await
            .unwrap();
        let resource = out.as_resource().unwrap();
        assert_eq!(resource.name, "top");
        assert_eq!(resource.content, Value::from("0"));
    }

    #[tokio::test]
    async fn test_component_returning_its_own_node_stops() {
        let ctx = root(Options::new());
        let node: Rc<std::cell::RefCell<Option<Value>>> = Rc::default();
        let slot = node.clone();
        let echo = Component::new("Echo", move |_, _| {
            Ok(slot.borrow().clone().unwrap_or(Value::Null))
        });
        let value = Value::from(echo);
        *node.borrow_mut() = Some(value.clone());
        assert_eq!(ctx.evaluate(value.clone()).await, Ok(value));
    }

    #[tokio::test]
    async fn test_prop_violations_are_not_fatal() {
        let ctx = root(Options::new());
        let greet = Component::new("Greet", |props, _| {
            Ok(Value::from(format!("hi {}", props.get("who").unwrap_or(Value::Null))))
        })
        .prop(PropSpec::required("who", PropKind::String));
        let out = ctx.evaluate(Virtual::of(greet).attr("who", 3)).await;
        assert_eq!(out, Ok(Value::from("hi 3")));
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let ctx = root(Options::new());
        let failing = Component::new("Failing", |_, _| Err(EvalError::service("nope")));
        assert_eq!(ctx.evaluate(failing).await, Err(EvalError::service("nope")));
    }
}
