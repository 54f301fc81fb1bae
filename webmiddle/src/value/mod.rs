// Runtime value system for webmiddle
// Everything the evaluator can see: plain data, deferred computations and the
// two tagged entities (Virtual descriptors and Resources).

pub mod component;
pub mod function;
pub mod resource;
pub mod virtual_node;

pub use component::{Component, PropKind, PropSpec, Props};
pub use function::{Function, Pending};
pub use resource::{Resource, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, CONTENT_TYPE_WEBMIDDLE};
pub use virtual_node::{Virtual, VirtualType};

use crate::error::{EvalError, EvalResult};
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Longest string rendered verbatim by `Display` before it gets elided.
const DISPLAY_STRING_LIMIT: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Function(Function),
    Pending(Pending),
    Virtual(Rc<Virtual>),
    Resource(Rc<Resource>),
    Error(EvalError),
}

impl Value {
    /// Wrap a future so it can be returned wherever a value is expected.
    pub fn pending<F>(future: F) -> Value
    where
        F: Future<Output = EvalResult<Value>> + 'static,
    {
        Value::Pending(Pending::new(future))
    }

    /// Wrap a closure called with the context's `functionParameters`.
    pub fn function<F>(name: impl Into<String>, body: F) -> Value
    where
        F: Fn(&[Value]) -> EvalResult<Value> + 'static,
    {
        Value::Function(Function::new(name, body))
    }

    pub fn object<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Value::Virtual(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Value::Resource(_))
    }

    pub fn as_virtual(&self) -> Option<&Rc<Virtual>> {
        match self {
            Value::Virtual(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Rc<Resource>> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral numbers only; `2.5` is not an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Pending(_) => "pending",
            Value::Virtual(_) => "virtual",
            Value::Resource(_) => "resource",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) if s.chars().count() > DISPLAY_STRING_LIMIT => {
                let head: String = s.chars().take(DISPLAY_STRING_LIMIT).collect();
                write!(f, "\"{}…\"", head)
            }
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => write!(f, "[array of {}]", items.len()),
            Value::Object(map) => write!(f, "{{object with {} keys}}", map.len()),
            Value::Function(func) => write!(f, "#<function {}>", func.name()),
            Value::Pending(_) => write!(f, "#<pending>"),
            Value::Virtual(v) => write!(f, "<{} />", v.node_type.name()),
            Value::Resource(r) => {
                write!(f, "#<resource {} \"{}\" ({})>", r.id, r.name, r.content_type)
            }
            Value::Error(e) => write!(f, "#<error: {}>", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Virtual> for Value {
    fn from(v: Virtual) -> Self {
        Value::Virtual(Rc::new(v))
    }
}

impl From<Rc<Resource>> for Value {
    fn from(r: Rc<Resource>) -> Self {
        Value::Resource(r)
    }
}

impl From<Resource> for Value {
    fn from(r: Resource) -> Self {
        Value::Resource(Rc::new(r))
    }
}

impl From<Component> for Value {
    fn from(c: Component) -> Self {
        Value::Virtual(Rc::new(Virtual::of(c)))
    }
}

impl From<EvalError> for Value {
    fn from(e: EvalError) -> Self {
        Value::Error(e)
    }
}
