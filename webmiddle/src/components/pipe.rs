//! Pipe: evaluate children strictly one after another.
//!
//! Each child after the first sees the previous result as its only
//! function parameter. The last result is returned.

use crate::context::options::FUNCTION_PARAMETERS;
use crate::context::{Context, Options};
use crate::error::{EvalError, EvalResult};
use crate::value::{Component, Props, Value};

const NAME: &str = "Pipe";

pub fn pipe() -> Component {
    Component::from_async(NAME, |props, context| run(props, context))
}

async fn run(props: Props, context: Context) -> EvalResult<Value> {
    if props.children().is_empty() {
        return Err(EvalError::ChildCount {
            component: NAME.to_string(),
            expected: "at least one".to_string(),
            found: 0,
        });
    }

    let mut previous: Option<Value> = None;
    for child in props.children() {
        let parameters = match previous.take() {
            Some(result) => Value::Array(vec![result]),
            None => Value::Array(Vec::new()),
        };
        let step = context.extend(Options::new().with(FUNCTION_PARAMETERS, parameters));
        previous = Some(step.evaluate(child.clone()).await?);
    }
    Ok(previous.unwrap_or(Value::Null))
}
