//! Parallel: evaluate several expressions concurrently.
//!
//! The expressions are either the children, or the entries of a single
//! array/object child. The result is an `x-webmiddle-type` resource named
//! by the `name` prop whose content mirrors the input shape.

use super::{concurrency_limit, evaluate_all};
use crate::context::Context;
use crate::error::EvalResult;
use crate::value::{Component, PropKind, PropSpec, Props, Value, CONTENT_TYPE_WEBMIDDLE};
use indexmap::IndexMap;

const NAME: &str = "Parallel";

pub fn parallel() -> Component {
    Component::from_async(NAME, |props, context| run(props, context))
        .prop(PropSpec::required("name", PropKind::String))
        .prop(PropSpec::optional("limit", PropKind::Number))
}

enum Tasks {
    List(Vec<Value>),
    Keyed(Vec<String>, Vec<Value>),
}

fn collect_tasks(props: &Props) -> Tasks {
    match props.children() {
        [Value::Array(items)] => Tasks::List(items.clone()),
        [Value::Object(entries)] => {
            let (keys, values) = entries.iter().map(|(k, v)| (k.clone(), v.clone())).unzip();
            Tasks::Keyed(keys, values)
        }
        children => Tasks::List(children.to_vec()),
    }
}

async fn run(props: Props, context: Context) -> EvalResult<Value> {
    let name = props.required_str(NAME, "name")?.to_string();
    let limit = concurrency_limit(&props);

    let content = match collect_tasks(&props) {
        Tasks::List(expressions) => Value::Array(evaluate_all(&context, expressions, limit).await?),
        Tasks::Keyed(keys, expressions) => {
            let results = evaluate_all(&context, expressions, limit).await?;
            let entries: IndexMap<String, Value> = keys.into_iter().zip(results).collect();
            Value::Object(entries)
        }
    };
    Ok(Value::Resource(context.create_resource(name, CONTENT_TYPE_WEBMIDDLE, content)))
}
