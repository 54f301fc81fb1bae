//! Virtual nodes: declarative call descriptors.

use super::{Component, Value};
use indexmap::IndexMap;

/// What a virtual node points at.
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualType {
    /// Opaque identifier; the node is terminal and evaluates to itself.
    Name(String),
    /// A component invoked as `(props, context)`.
    Component(Component),
}

impl VirtualType {
    pub fn name(&self) -> &str {
        match self {
            VirtualType::Name(name) => name,
            VirtualType::Component(component) => component.name(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, VirtualType::Component(_))
    }
}

/// `{ type, attributes, children }`, immutable once built.
///
/// The builder methods consume `self`, so a node handed to the evaluator is
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Virtual {
    pub node_type: VirtualType,
    pub attributes: IndexMap<String, Value>,
    pub children: Vec<Value>,
}

impl Virtual {
    pub fn new(
        node_type: VirtualType,
        attributes: IndexMap<String, Value>,
        children: Vec<Value>,
    ) -> Self {
        Self {
            node_type,
            attributes,
            children,
        }
    }

    /// Node calling `component`.
    pub fn of(component: Component) -> Self {
        Self::new(VirtualType::Component(component), IndexMap::new(), Vec::new())
    }

    /// Terminal node with an opaque type name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(VirtualType::Name(name.into()), IndexMap::new(), Vec::new())
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Value>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.children.extend(children);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_attribute_and_child_order() {
        let node = Virtual::named("div")
            .attr("b", 2)
            .attr("a", 1)
            .child("first")
            .child("second");

        let keys: Vec<&str> = node.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(node.children, vec![Value::from("first"), Value::from("second")]);
        assert!(!node.node_type.is_callable());
        assert_eq!(node.node_type.name(), "div");
    }
}
