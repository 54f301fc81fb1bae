//! Depth-limited rendering of values and call trees for remote inspection.
//!
//! Anything nested deeper than `max_depth`, and any string longer than
//! `max_string_length`, is replaced by a placeholder:
//!
//! ```text
//! {"type": "more", "path": "children.0.result", "serializedPath": "value.children.0.value.result"}
//! ```
//!
//! `path` addresses the live structure (see [`LazySerializer::load_more`]);
//! `serializedPath` addresses the placeholder inside the rendered JSON so a
//! client can splice the loaded subtree back in. Both are dot-separated;
//! object keys containing dots can't be addressed.

use super::number_to_json;
use crate::call_tree::CallNodeRef;
use crate::config::SerializationSettings;
use crate::error::{EvalError, EvalResult};
use crate::value::Value;
use serde_json::{json, Map, Value as Json};

/// Something that can be inspected.
#[derive(Debug, Clone)]
pub enum Inspect {
    Value(Value),
    CallNode(CallNodeRef),
    CallNodes(Vec<CallNodeRef>),
}

impl From<Value> for Inspect {
    fn from(value: Value) -> Self {
        Inspect::Value(value)
    }
}

impl From<CallNodeRef> for Inspect {
    fn from(node: CallNodeRef) -> Self {
        Inspect::CallNode(node)
    }
}

impl From<Vec<CallNodeRef>> for Inspect {
    fn from(nodes: Vec<CallNodeRef>) -> Self {
        Inspect::CallNodes(nodes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazySerializer {
    pub max_depth: usize,
    pub max_string_length: usize,
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

/// Where a rendered subtree lives, both live and in the output.
#[derive(Debug, Clone)]
struct Location {
    path: String,
    serialized_path: String,
}

impl Location {
    fn new(path: &str, serialized_path: &str) -> Self {
        Self {
            path: path.to_string(),
            serialized_path: serialized_path.to_string(),
        }
    }

    /// `live` is appended to `path`, `rendered` to `serializedPath`.
    fn descend(&self, live: &str, rendered: &str) -> Self {
        Self {
            path: join(&self.path, live),
            serialized_path: join(&self.serialized_path, rendered),
        }
    }

    fn placeholder(&self) -> Json {
        json!({
            "type": "more",
            "path": self.path,
            "serializedPath": self.serialized_path,
        })
    }
}

impl LazySerializer {
    pub fn new(max_depth: usize, max_string_length: usize) -> Self {
        Self {
            max_depth,
            max_string_length,
        }
    }

    pub fn from_settings(settings: &SerializationSettings) -> Self {
        Self::new(settings.max_depth, settings.max_string_length)
    }

    /// Render `target` from its root.
    pub fn serialize(&self, target: &Inspect) -> Json {
        self.render_subtree(target, self.max_depth, &Location::new("", ""))
    }

    /// Render the subtree at `path` with a fresh depth budget. Placeholders
    /// inside it continue `path` and `serialized_path`. A string at `path`
    /// is returned whole, whatever its length.
    pub fn load_more(&self, target: &Inspect, path: &str, serialized_path: &str) -> EvalResult<Json> {
        let subtree = resolve(target, path)?;
        if let Inspect::Value(Value::String(s)) = &subtree {
            return Ok(Json::String(s.clone()));
        }
        Ok(self.render_subtree(&subtree, self.max_depth, &Location::new(path, serialized_path)))
    }

    fn render_subtree(&self, target: &Inspect, depth: usize, at: &Location) -> Json {
        match target {
            Inspect::Value(value) => self.render_value(value, depth, at),
            Inspect::CallNode(node) => self.render_call_node(node, depth, at),
            Inspect::CallNodes(nodes) => self.render_call_nodes(nodes, depth, at),
        }
    }

    fn render_call_nodes(&self, nodes: &[CallNodeRef], depth: usize, at: &Location) -> Json {
        if nodes.is_empty() {
            return json!([]);
        }
        if depth == 0 {
            return at.placeholder();
        }
        Json::Array(
            nodes
                .iter()
                .enumerate()
                .map(|(i, node)| {
                    let index = i.to_string();
                    self.render_call_node(node, depth - 1, &at.descend(&index, &index))
                })
                .collect(),
        )
    }

    fn render_call_node(&self, node: &CallNodeRef, depth: usize, at: &Location) -> Json {
        if depth == 0 {
            return at.placeholder();
        }
        let inner = depth - 1;
        let field = |name: &str| at.descend(name, &format!("value.{}", name));

        let snapshot = node.borrow();
        let result = match &snapshot.result {
            Some(result) => self.render_value(result, inner, &field("result")),
            None => Json::Null,
        };
        let error = match &snapshot.error {
            Some(error) => Json::String(error.to_string()),
            None => Json::Null,
        };
        json!({
            "type": "callNode",
            "value": {
                "kind": snapshot.kind,
                "path": snapshot.path,
                "callRootContextPath": snapshot.call_root_context_path,
                "value": self.render_value(&snapshot.value, inner, &field("value")),
                "options": self.render_value(&snapshot.options.to_value(), inner, &field("options")),
                "children": self.render_call_nodes(&snapshot.children, inner, &field("children")),
                "result": result,
                "error": error,
                "startedAt": snapshot.started_at,
                "finishedAt": snapshot.finished_at,
            }
        })
    }

    fn render_value(&self, value: &Value, depth: usize, at: &Location) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n).unwrap_or_else(|| Json::String(n.to_string())),
            Value::String(s) if s.chars().count() > self.max_string_length => at.placeholder(),
            Value::String(s) => Json::String(s.clone()),
            Value::Function(function) => json!({ "type": "function", "value": function.name() }),
            Value::Pending(_) => json!({ "type": "pending" }),
            Value::Error(error) => json!({ "type": "error", "value": error.to_string() }),
            Value::Array(items) if items.is_empty() => json!([]),
            Value::Object(entries) if entries.is_empty() => json!({ "type": "object", "value": {} }),
            _ if depth == 0 => at.placeholder(),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let index = i.to_string();
                        self.render_value(item, depth - 1, &at.descend(&index, &index))
                    })
                    .collect(),
            ),
            Value::Object(entries) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    let location = at.descend(key, &format!("value.{}", key));
                    map.insert(key.clone(), self.render_value(item, depth - 1, &location));
                }
                json!({ "type": "object", "value": map })
            }
            Value::Virtual(node) => {
                let mut attributes = Map::new();
                for (key, item) in &node.attributes {
                    let location = at.descend(
                        &format!("attributes.{}", key),
                        &format!("value.attributes.{}", key),
                    );
                    attributes.insert(key.clone(), self.render_value(item, depth - 1, &location));
                }
                let children: Vec<Json> = node
                    .children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        let location = at.descend(
                            &format!("children.{}", i),
                            &format!("value.children.{}", i),
                        );
                        self.render_value(child, depth - 1, &location)
                    })
                    .collect();
                json!({
                    "type": "virtual",
                    "value": {
                        "type": node.node_type.name(),
                        "attributes": attributes,
                        "children": children,
                    }
                })
            }
            Value::Resource(resource) => json!({
                "type": "resource",
                "value": {
                    "id": resource.id,
                    "name": resource.name,
                    "contentType": resource.content_type,
                    "content": self.render_value(
                        &resource.content,
                        depth - 1,
                        &at.descend("content", "value.content"),
                    ),
                }
            }),
        }
    }
}

fn unresolved(path: &str) -> EvalError {
    EvalError::Serialization(format!("nothing to load at '{}'", path))
}

/// Follow a live `path` from `target`.
pub fn resolve(target: &Inspect, path: &str) -> EvalResult<Inspect> {
    let mut current = target.clone();
    let mut segments = path.split('.').filter(|s| !s.is_empty());

    while let Some(segment) = segments.next() {
        current = match current {
            Inspect::CallNodes(nodes) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| nodes.get(i).cloned())
                .map(Inspect::CallNode),
            Inspect::CallNode(node) => {
                let node = node.borrow();
                let next = match segment {
                    "value" => Some(Inspect::Value(node.value.clone())),
                    "options" => Some(Inspect::Value(node.options.to_value())),
                    "children" => Some(Inspect::CallNodes(node.children.clone())),
                    "result" => node.result.clone().map(Inspect::Value),
                    "error" => node.error.clone().map(|e| Inspect::Value(Value::Error(e))),
                    _ => None,
                };
                next
            }
            Inspect::Value(value) => step_value(&value, segment, &mut segments).map(Inspect::Value),
        }
        .ok_or_else(|| unresolved(path))?;
    }
    Ok(current)
}

fn step_value<'a, I>(value: &Value, segment: &str, rest: &mut I) -> Option<Value>
where
    I: Iterator<Item = &'a str>,
{
    match value {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        Value::Object(entries) => entries.get(segment).cloned(),
        Value::Resource(resource) if segment == "content" => Some(resource.content.clone()),
        Value::Virtual(node) => match segment {
            "attributes" => rest.next().and_then(|key| node.attributes.get(key).cloned()),
            "children" => rest
                .next()
                .and_then(|i| i.parse::<usize>().ok())
                .and_then(|i| node.children.get(i).cloned()),
            _ => None,
        },
        _ => None,
    }
}
