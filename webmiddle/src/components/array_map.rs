//! ArrayMap: derive one expression per array element and fan them out.
//!
//! `callback(element, index)` builds each expression up front; evaluation
//! then follows the same `limit` rules as `Parallel`. The content of the
//! returned `x-webmiddle-type` resource is ordered by input index.

use super::{concurrency_limit, evaluate_all};
use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::value::{Component, PropKind, PropSpec, Props, Value, CONTENT_TYPE_WEBMIDDLE};

const NAME: &str = "ArrayMap";

pub fn array_map() -> Component {
    Component::from_async(NAME, |props, context| run(props, context))
        .prop(PropSpec::required("name", PropKind::String))
        .prop(PropSpec::required("array", PropKind::Array))
        .prop(PropSpec::required("callback", PropKind::Function))
        .prop(PropSpec::optional("limit", PropKind::Number))
}

fn missing(prop: &str) -> EvalError {
    EvalError::MissingProp {
        component: NAME.to_string(),
        prop: prop.to_string(),
    }
}

async fn run(props: Props, context: Context) -> EvalResult<Value> {
    let name = props.required_str(NAME, "name")?.to_string();
    let array = props
        .attribute("array")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("array"))?;
    let callback = props
        .attribute("callback")
        .and_then(Value::as_function)
        .ok_or_else(|| missing("callback"))?;

    let expressions = array
        .iter()
        .enumerate()
        .map(|(index, element)| callback.call(&[element.clone(), Value::from(index)]))
        .collect::<EvalResult<Vec<Value>>>()?;

    let results = evaluate_all(&context, expressions, concurrency_limit(&props)).await?;
    Ok(Value::Resource(context.create_resource(
        name,
        CONTENT_TYPE_WEBMIDDLE,
        Value::Array(results),
    )))
}
