//! Resource serialization.
//!
//! Content is stringified according to its content-type family:
//!
//! | content type        | content                 | string form                    |
//! |---------------------|-------------------------|--------------------------------|
//! | `application/json`  | JSON-compatible value   | `serde_json`                   |
//! | `x-webmiddle-type`  | any serializable value  | tagged scheme (`webmiddle_type`) |
//! | anything else       | string                  | passed through                 |
//!
//! A resource travels as `{id, name, contentType, content}` with `content`
//! in its string form. `lazy` renders values and call trees for inspection,
//! with placeholders where the depth budget runs out.

pub mod lazy;
pub mod webmiddle_type;

pub use lazy::{Inspect, LazySerializer};

use crate::error::{EvalError, EvalResult};
use crate::value::{Resource, Value, CONTENT_TYPE_JSON, CONTENT_TYPE_WEBMIDDLE};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Wire shape of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResource {
    pub id: u64,
    pub name: String,
    pub content_type: String,
    pub content: String,
}

pub fn stringify_content(content_type: &str, content: &Value) -> EvalResult<String> {
    match content_type {
        CONTENT_TYPE_JSON => Ok(serde_json::to_string(&value_to_json(content)?)?),
        CONTENT_TYPE_WEBMIDDLE => webmiddle_type::stringify(content),
        other => match content {
            Value::String(text) => Ok(text.clone()),
            unexpected => Err(EvalError::Serialization(format!(
                "content of type {} must be a string, got {}",
                other,
                unexpected.type_name()
            ))),
        },
    }
}

pub fn parse_content(content_type: &str, raw: &str) -> EvalResult<Value> {
    match content_type {
        CONTENT_TYPE_JSON => Ok(json_to_value(serde_json::from_str(raw)?)),
        CONTENT_TYPE_WEBMIDDLE => webmiddle_type::parse(raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

pub fn to_wire(resource: &Resource) -> EvalResult<WireResource> {
    Ok(WireResource {
        id: resource.id,
        name: resource.name.clone(),
        content_type: resource.content_type.clone(),
        content: stringify_content(&resource.content_type, &resource.content)?,
    })
}

pub fn from_wire(wire: WireResource) -> EvalResult<Resource> {
    let content = parse_content(&wire.content_type, &wire.content)?;
    Ok(Resource::new(wire.id, wire.name, wire.content_type, content))
}

pub fn stringify_resource(resource: &Resource) -> EvalResult<String> {
    Ok(serde_json::to_string(&to_wire(resource)?)?)
}

pub fn parse_resource(raw: &str) -> EvalResult<Resource> {
    from_wire(serde_json::from_str(raw)?)
}

/// Plain JSON view of a JSON-compatible value.
pub fn value_to_json(value: &Value) -> EvalResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_to_json(*n).ok_or_else(|| {
            EvalError::Serialization(format!("{} is not representable in JSON", n))
        })?,
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect::<EvalResult<_>>()?),
        Value::Object(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_to_json(v)?)))
                .collect::<EvalResult<_>>()?,
        ),
        other => {
            return Err(EvalError::Serialization(format!(
                "a {} is not JSON content",
                other.type_name()
            )))
        }
    })
}

pub fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

/// Integral values are written without a fractional part. Non-finite
/// numbers have no JSON form.
pub(crate) fn number_to_json(n: f64) -> Option<Json> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Json::from(n as i64));
    }
    serde_json::Number::from_f64(n).map(Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CONTENT_TYPE_TEXT;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_resource_wire_form() {
        let resource = Resource::new(
            7,
            "result",
            CONTENT_TYPE_JSON,
            Value::object([("count", Value::from(2)), ("ok", Value::Bool(true))]),
        );
        let raw = stringify_resource(&resource).unwrap();
        let wire: Json = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "id": 7,
                "name": "result",
                "contentType": "application/json",
                "content": "{\"count\":2,\"ok\":true}"
            })
        );
        assert_eq!(parse_resource(&raw).unwrap(), resource);
    }

    #[test]
    fn test_object_keys_keep_insertion_order() {
        let content = Value::object([
            ("zeta", Value::from(1)),
            ("alpha", Value::from(2)),
            ("mid", Value::object([("y", Value::Null), ("b", Value::Null)])),
        ]);
        let resource = Resource::new(0, "ordered", CONTENT_TYPE_JSON, content);

        let wire = to_wire(&resource).unwrap();
        assert_eq!(wire.content, r#"{"zeta":1,"alpha":2,"mid":{"y":null,"b":null}}"#);

        let parsed = parse_resource(&stringify_resource(&resource).unwrap()).unwrap();
        let entries = parsed.content.as_object().unwrap();
        let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        let nested: Vec<&str> = entries["mid"].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(nested, vec!["y", "b"]);
    }

    #[test]
    fn test_text_content_passes_through() {
        let resource = Resource::new(0, "page", "text/html", Value::from("<p>hi</p>"));
        let raw = stringify_resource(&resource).unwrap();
        assert!(raw.contains("\"content\":\"<p>hi</p>\""));
        assert_eq!(parse_resource(&raw).unwrap(), resource);
    }

    #[test]
    fn test_text_content_must_be_a_string() {
        let out = stringify_content(CONTENT_TYPE_TEXT, &Value::from(1));
        assert!(matches!(out, Err(EvalError::Serialization(_))));
    }

    #[test]
    fn test_json_content_rejects_engine_values() {
        let content = Value::Array(vec![Value::function("f", |_| Ok(Value::Null))]);
        assert!(matches!(
            stringify_content(CONTENT_TYPE_JSON, &content),
            Err(EvalError::Serialization(_))
        ));
        assert!(matches!(
            stringify_content(CONTENT_TYPE_JSON, &Value::Number(f64::NAN)),
            Err(EvalError::Serialization(_))
        ));
    }

    #[test]
    fn test_malformed_wire_is_a_parse_error() {
        assert!(matches!(parse_resource("{\"id\":1}"), Err(EvalError::Parse(_))));
    }
}
