//! Self-describing encoding for `x-webmiddle-type` content.
//!
//! JSON primitives and arrays are written as-is. Everything else is an
//! object tagged with its kind:
//!
//! ```text
//! {"type": "object",   "value": {key: <encoded>, ..}}
//! {"type": "number",   "value": "NaN" | "Infinity" | "-Infinity"}
//! {"type": "resource", "value": {"id", "name", "contentType", "content": <string form>}}
//! {"type": "virtual",  "value": {"type": <name>, "attributes": {..}, "children": [..]}}
//! {"type": "error",    "value": <message>}
//! ```
//!
//! Virtual nodes come back with a `Name` type, so a parsed tree is inert.
//! Functions and pending values have no encoding.

use super::{from_wire, number_to_json, to_wire, WireResource};
use crate::error::{EvalError, EvalResult};
use crate::value::{Value, Virtual, VirtualType};
use serde_json::{json, Map, Value as Json};
use std::rc::Rc;

const TYPE: &str = "type";
const VALUE: &str = "value";

pub fn stringify(value: &Value) -> EvalResult<String> {
    Ok(serde_json::to_string(&encode(value)?)?)
}

pub fn parse(raw: &str) -> EvalResult<Value> {
    decode(serde_json::from_str(raw)?)
}

fn tagged(kind: &str, value: Json) -> Json {
    json!({ "type": kind, "value": value })
}

fn encode_map<'a, I>(entries: I) -> EvalResult<Json>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.clone(), encode(value)?);
    }
    Ok(Json::Object(map))
}

pub fn encode(value: &Value) -> EvalResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => match number_to_json(*n) {
            Some(number) => number,
            None => tagged("number", Json::String(non_finite_name(*n).to_string())),
        },
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(encode).collect::<EvalResult<_>>()?),
        Value::Object(entries) => tagged("object", encode_map(entries)?),
        Value::Resource(resource) => tagged("resource", serde_json::to_value(to_wire(resource)?)?),
        Value::Virtual(node) => tagged(
            "virtual",
            json!({
                "type": node.node_type.name(),
                "attributes": encode_map(&node.attributes)?,
                "children": node.children.iter().map(encode).collect::<EvalResult<Vec<_>>>()?,
            }),
        ),
        Value::Error(error) => tagged("error", Json::String(error.to_string())),
        Value::Function(_) | Value::Pending(_) => {
            return Err(EvalError::Serialization(format!(
                "a {} cannot be serialized",
                value.type_name()
            )))
        }
    })
}

fn non_finite_name(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn malformed(what: impl std::fmt::Display) -> EvalError {
    EvalError::Parse(format!("malformed webmiddle value: {}", what))
}

pub fn decode(json: Json) -> EvalResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
        Json::String(s) => Ok(Value::String(s)),
        Json::Array(items) => Ok(Value::Array(
            items.into_iter().map(decode).collect::<EvalResult<_>>()?,
        )),
        Json::Object(mut map) => {
            let kind = match map.remove(TYPE) {
                Some(Json::String(kind)) => kind,
                _ => return Err(malformed("object without a type tag")),
            };
            let inner = map.remove(VALUE).unwrap_or(Json::Null);
            decode_tagged(&kind, inner)
        }
    }
}

fn decode_map(json: Json) -> EvalResult<indexmap::IndexMap<String, Value>> {
    match json {
        Json::Object(map) => map
            .into_iter()
            .map(|(k, v)| Ok((k, decode(v)?)))
            .collect(),
        other => Err(malformed(format!("expected a map, got {}", other))),
    }
}

fn decode_tagged(kind: &str, inner: Json) -> EvalResult<Value> {
    match kind {
        "object" => Ok(Value::Object(decode_map(inner)?)),
        "number" => match inner.as_str() {
            Some("NaN") => Ok(Value::Number(f64::NAN)),
            Some("Infinity") => Ok(Value::Number(f64::INFINITY)),
            Some("-Infinity") => Ok(Value::Number(f64::NEG_INFINITY)),
            _ => Err(malformed(format!("number {}", inner))),
        },
        "resource" => {
            let wire: WireResource = serde_json::from_value(inner)?;
            Ok(Value::Resource(Rc::new(from_wire(wire)?)))
        }
        "virtual" => {
            let Json::Object(mut fields) = inner else {
                return Err(malformed("virtual without a body"));
            };
            let name = match fields.remove(TYPE) {
                Some(Json::String(name)) => name,
                _ => return Err(malformed("virtual without a type name")),
            };
            let attributes = decode_map(fields.remove("attributes").unwrap_or_else(|| json!({})))?;
            let children = match fields.remove("children") {
                Some(Json::Array(items)) => items.into_iter().map(decode).collect::<EvalResult<_>>()?,
                None => Vec::new(),
                Some(other) => return Err(malformed(format!("children {}", other))),
            };
            Ok(Value::Virtual(Rc::new(Virtual::new(
                VirtualType::Name(name),
                attributes,
                children,
            ))))
        }
        "error" => match inner {
            Json::String(message) => Ok(Value::Error(EvalError::Service(message))),
            other => Err(malformed(format!("error {}", other))),
        },
        unknown => Err(malformed(format!("unknown type tag '{}'", unknown))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Component, Resource, CONTENT_TYPE_JSON, CONTENT_TYPE_WEBMIDDLE};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_resources_and_virtuals_survive() {
        let inner = Resource::new(1, "inner", CONTENT_TYPE_JSON, Value::Array(vec![Value::from(1.5)]));
        let node = Virtual::named("link")
            .attr("href", "https://example.com")
            .child(Value::from("text"));
        let content = Value::object([
            ("inner", Value::from(inner)),
            ("node", Value::from(node)),
            ("missing", Value::Null),
        ]);
        let outer = Resource::new(2, "outer", CONTENT_TYPE_WEBMIDDLE, content);

        let raw = stringify(&Value::from(outer.clone())).unwrap();
        assert_eq!(parse(&raw).unwrap(), Value::from(outer));
    }

    #[test]
    fn test_component_virtual_parses_back_as_terminal() {
        let component = Component::new("Fetch", |_, _| Ok(Value::Null));
        let node = Virtual::of(component).attr("url", "https://example.com");
        let parsed = parse(&stringify(&Value::from(node)).unwrap()).unwrap();

        let parsed = parsed.as_virtual().unwrap();
        assert_eq!(parsed.node_type, VirtualType::Name("Fetch".to_string()));
        assert!(!parsed.node_type.is_callable());
        assert_eq!(parsed.attribute("url"), Some(&Value::from("https://example.com")));
    }

    #[test]
    fn test_non_finite_numbers_are_tagged() {
        let encoded = encode(&Value::Number(f64::NEG_INFINITY)).unwrap();
        assert_eq!(encoded, json!({"type": "number", "value": "-Infinity"}));
        assert_eq!(decode(encoded).unwrap(), Value::Number(f64::NEG_INFINITY));
        assert_eq!(encode(&Value::from(3)).unwrap(), json!(3));
    }

    #[test]
    fn test_errors_travel_as_messages() {
        let raw = stringify(&Value::Error(EvalError::service("boom"))).unwrap();
        assert_eq!(parse(&raw).unwrap(), Value::Error(EvalError::service("boom")));
    }

    #[test]
    fn test_functions_cannot_be_encoded() {
        let out = encode(&Value::function("f", |_| Ok(Value::Null)));
        assert!(matches!(out, Err(EvalError::Serialization(_))));
    }

    #[test]
    fn test_untagged_object_is_rejected() {
        assert!(matches!(parse("{\"a\":1}"), Err(EvalError::Parse(_))));
    }
}
