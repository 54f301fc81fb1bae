//! Components (services): the callable type of a virtual node.

use super::{Value, Virtual};
use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

type ComponentBody = dyn Fn(Props, Context) -> EvalResult<Value>;

/// Shape a prop is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Any,
    Bool,
    Number,
    String,
    Array,
    Object,
    Function,
    Virtual,
    Resource,
}

impl PropKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            PropKind::Any => true,
            PropKind::Bool => matches!(value, Value::Bool(_)),
            PropKind::Number => matches!(value, Value::Number(_)),
            PropKind::String => matches!(value, Value::String(_)),
            PropKind::Array => matches!(value, Value::Array(_)),
            PropKind::Object => matches!(value, Value::Object(_)),
            PropKind::Function => matches!(value, Value::Function(_)),
            PropKind::Virtual => matches!(value, Value::Virtual(_)),
            PropKind::Resource => matches!(value, Value::Resource(_)),
        }
    }
}

/// A declared prop constraint. Violations are reported, never enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSpec {
    pub name: String,
    pub kind: PropKind,
    pub required: bool,
}

impl PropSpec {
    pub fn required(name: impl Into<String>, kind: PropKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: PropKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// `attributes ∪ {children}` as handed to a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    pub attributes: IndexMap<String, Value>,
    pub children: Vec<Value>,
}

impl Props {
    pub fn from_virtual(node: &Virtual) -> Self {
        Self {
            attributes: node.attributes.clone(),
            children: node.children.clone(),
        }
    }

    /// Attribute lookup; `"children"` resolves to the children sequence.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == "children" {
            return Some(Value::Array(self.children.clone()));
        }
        self.attributes.get(key).cloned()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(Value::as_i64)
    }

    pub fn children(&self) -> &[Value] {
        &self.children
    }

    /// The only child, or a shape error naming `component`.
    pub fn single_child(&self, component: &str) -> EvalResult<&Value> {
        match self.children.as_slice() {
            [child] => Ok(child),
            other => Err(EvalError::ChildCount {
                component: component.to_string(),
                expected: "exactly one".to_string(),
                found: other.len(),
            }),
        }
    }

    pub fn required_str(&self, component: &str, key: &str) -> EvalResult<&str> {
        self.str(key).ok_or_else(|| EvalError::MissingProp {
            component: component.to_string(),
            prop: key.to_string(),
        })
    }
}

struct ComponentInner {
    name: String,
    prop_specs: Vec<PropSpec>,
    body: Rc<ComponentBody>,
}

/// A service function `(props, context) -> value`.
///
/// Identity is by reference: two components are equal only if they are
/// clones of the same definition.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Component {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Props, Context) -> EvalResult<Value> + 'static,
    {
        Self::with_specs(name, Vec::new(), body)
    }

    /// Component whose body is an `async` block; the future becomes a
    /// pending value the evaluator awaits.
    pub fn from_async<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Props, Context) -> Fut + 'static,
        Fut: Future<Output = EvalResult<Value>> + 'static,
    {
        Self::new(name, move |props, context| {
            Ok(Value::pending(body(props, context)))
        })
    }

    fn with_specs<F>(name: impl Into<String>, prop_specs: Vec<PropSpec>, body: F) -> Self
    where
        F: Fn(Props, Context) -> EvalResult<Value> + 'static,
    {
        Self {
            inner: Rc::new(ComponentInner {
                name: name.into(),
                prop_specs,
                body: Rc::new(body),
            }),
        }
    }

    /// Declare a prop constraint. On a component that is already shared
    /// this yields a new definition with the same body; other clones keep
    /// their constraints.
    pub fn prop(self, spec: PropSpec) -> Self {
        let inner = match Rc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.prop_specs.push(spec);
                inner
            }
            Err(shared) => {
                let mut prop_specs = shared.prop_specs.clone();
                prop_specs.push(spec);
                ComponentInner {
                    name: shared.name.clone(),
                    prop_specs,
                    body: shared.body.clone(),
                }
            }
        };
        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn prop_specs(&self) -> &[PropSpec] {
        &self.inner.prop_specs
    }

    pub fn call(&self, props: Props, context: Context) -> EvalResult<Value> {
        (self.inner.body)(props, context)
    }

    /// Describe every declared constraint `props` violates.
    pub fn validate(&self, props: &Props) -> Vec<String> {
        let mut violations = Vec::new();
        for spec in &self.inner.prop_specs {
            match props.get(&spec.name) {
                None | Some(Value::Null) if spec.required => violations.push(format!(
                    "{}: required prop '{}' is missing",
                    self.name(),
                    spec.name
                )),
                Some(value) if !matches!(value, Value::Null) && !spec.kind.accepts(&value) => {
                    violations.push(format!(
                        "{}: prop '{}' expected {:?}, got {}",
                        self.name(),
                        spec.name,
                        spec.kind,
                        value.type_name()
                    ))
                }
                _ => {}
            }
        }
        violations
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.inner.name)
            .field("prop_specs", &self.inner.prop_specs)
            .finish()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
