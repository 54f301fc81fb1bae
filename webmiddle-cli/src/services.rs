//! Services available from the command line.

use webmiddle::value::{CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
use webmiddle::{Component, EvalError, PropKind, PropSpec, ServiceRegistry, Value};

/// `resource`: a resource built from the `name`, `contentType` and `content` props.
pub fn resource() -> Component {
    Component::new("Resource", |props, context| {
        let name = props.required_str("Resource", "name")?.to_string();
        let content_type = props.str("contentType").unwrap_or(CONTENT_TYPE_TEXT).to_string();
        let content = props.attribute("content").cloned().unwrap_or(Value::Null);
        Ok(Value::Resource(context.create_resource(name, content_type, content)))
    })
    .prop(PropSpec::required("name", PropKind::String))
    .prop(PropSpec::optional("contentType", PropKind::String))
    .prop(PropSpec::optional("content", PropKind::Any))
}

/// `json`: the `content` prop as an `application/json` resource.
pub fn json() -> Component {
    Component::new("Json", |props, context| {
        let content = props.attribute("content").cloned().ok_or_else(|| EvalError::MissingProp {
            component: "Json".to_string(),
            prop: "content".to_string(),
        })?;
        let name = props.str("name").unwrap_or("json").to_string();
        Ok(Value::Resource(context.create_resource(name, CONTENT_TYPE_JSON, content)))
    })
    .prop(PropSpec::optional("name", PropKind::String))
    .prop(PropSpec::required("content", PropKind::Any))
}

pub fn builtin() -> ServiceRegistry {
    ServiceRegistry::new()
        .with("resource", resource())
        .with("json", json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use webmiddle::{create_context, Options, RootSource};

    #[tokio::test]
    async fn test_json_service_wraps_content() {
        let ctx = create_context(RootSource::new(builtin()), Options::new());
        let mut attributes = IndexMap::new();
        attributes.insert("content".to_string(), Value::Array(vec![Value::from(1)]));

        let out = ctx.evaluate_service("json", attributes).await.unwrap();
        let resource = out.as_resource().unwrap();
        assert_eq!(resource.name, "json");
        assert_eq!(resource.content_type, CONTENT_TYPE_JSON);
        assert_eq!(
            ctx.stringify_resource(resource).unwrap(),
            r#"{"id":0,"name":"json","contentType":"application/json","content":"[1]"}"#
        );
    }

    #[tokio::test]
    async fn test_resource_service_requires_name() {
        let ctx = create_context(RootSource::new(builtin()), Options::new());
        let out = ctx.evaluate_service("resource", IndexMap::new()).await;
        assert!(matches!(out, Err(EvalError::MissingProp { .. })));
    }
}
