use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use tokio::task::LocalSet;
use webmiddle::call_tree::{CALL_NODE_ADD, CALL_NODE_UPDATE};
use webmiddle::components::{error_boundary, parallel};
use webmiddle::context::options::DEBUG;
use webmiddle::value::CONTENT_TYPE_TEXT;
use webmiddle::{
    create_context, CallKind, CallNodeRef, Channel, Component, Context, EvalError, Inspect,
    LazySerializer, Options, RootSource, Value, Virtual,
};

fn debug_root() -> Context {
    create_context(RootSource::default().with_path("test"), Options::new().with(DEBUG, true))
}

fn leaf() -> Component {
    Component::from_async("Leaf", |props, context| async move {
        let label = props.str("label").unwrap_or("leaf").to_string();
        tokio::task::yield_now().await;
        Ok(Value::Resource(context.create_resource(label.clone(), CONTENT_TYPE_TEXT, label)))
    })
}

/// Wraps its only child, so the child runs inside this component's call.
fn wrapper() -> Component {
    Component::new("Wrapper", |props, _| props.single_child("Wrapper").cloned())
}

fn labels(nodes: &[CallNodeRef]) -> Vec<String> {
    let mut labels: Vec<String> = nodes
        .iter()
        .filter_map(|node| {
            let node = node.borrow();
            node.value
                .as_virtual()
                .and_then(|v| v.attribute("label"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect();
    labels.sort();
    labels
}

#[tokio::test]
async fn test_parallel_children_hang_under_parallel_node() {
    let ctx = debug_root();
    let tree = Virtual::of(parallel())
        .attr("name", "both")
        .child(Virtual::of(leaf()).attr("label", "a"))
        .child(Virtual::of(leaf()).attr("label", "b"));
    LocalSet::new().run_until(ctx.evaluate(tree)).await.unwrap();

    let top = ctx.call_state();
    assert_eq!(top.len(), 1);
    let root_node = &top[0];
    assert_eq!(root_node.path(), "0");
    assert_eq!(root_node.kind(), CallKind::Virtual);
    assert_eq!(root_node.borrow().call_root_context_path, "test");

    let children = root_node.children();
    assert_eq!(labels(&children), vec!["a", "b"]);
    let mut paths: Vec<String> = children.iter().map(CallNodeRef::path).collect();
    paths.sort();
    assert_eq!(paths, vec!["0.0", "0.1"]);
    for child in &children {
        assert!(child.is_settled());
        assert!(child.result().map(|r| r.is_resource()).unwrap_or(false));
        assert_eq!(child.borrow().call_root_context_path, "test");
    }

    let result = root_node.result().unwrap();
    assert_eq!(result.as_resource().unwrap().name, "both");
}

#[tokio::test]
async fn test_returned_virtual_nests_under_its_producer() {
    let ctx = debug_root();
    let tree = Virtual::of(wrapper()).child(Virtual::of(leaf()).attr("label", "inner"));
    ctx.evaluate(tree).await.unwrap();

    let top = ctx.call_state();
    assert_eq!(top.len(), 1);
    let children = top[0].children();
    assert_eq!(labels(&children), vec!["inner"]);
    assert_eq!(children[0].path(), "0.0");
}

#[tokio::test]
async fn test_error_boundary_records_attempts_and_catch() {
    let ctx = debug_root();
    let adds = Rc::new(Cell::new(0));
    let updates = Rc::new(Cell::new(0));
    let counter = adds.clone();
    ctx.on(Channel::Message, CALL_NODE_ADD, move |_| counter.set(counter.get() + 1));
    let counter = updates.clone();
    ctx.on(Channel::Message, CALL_NODE_UPDATE, move |_| counter.set(counter.get() + 1));

    let tree = Virtual::of(error_boundary())
        .attr("retries", 1)
        .attr("handleCatch", "fallback")
        .child(Value::function("failing", |_| Err(EvalError::service("down"))));
    assert_eq!(ctx.evaluate(tree).await, Ok(Value::from("fallback")));

    let boundary = &ctx.call_state()[0];
    let attempts = boundary.children();
    let kinds: Vec<CallKind> = attempts.iter().map(CallNodeRef::kind).collect();
    assert_eq!(kinds, vec![CallKind::Try, CallKind::Try, CallKind::Catch]);
    assert_eq!(attempts[0].borrow().value, Value::from(1));
    assert_eq!(attempts[1].borrow().value, Value::from(2));
    assert_eq!(attempts[0].error(), Some(EvalError::service("down")));
    assert_eq!(attempts[2].result(), Some(Value::from("fallback")));
    assert_eq!(attempts[2].path(), "0.2");

    // boundary + two tries + catch
    assert_eq!(adds.get(), 4);
    assert_eq!(updates.get(), 4);
}

#[tokio::test]
async fn test_failed_call_keeps_its_error() {
    let ctx = debug_root();
    let tree = Virtual::of(wrapper()).child(Virtual::of(Component::new("Broken", |_, _| {
        Err(EvalError::service("nope"))
    })));
    assert_eq!(ctx.evaluate(tree).await, Err(EvalError::service("nope")));

    let outer = &ctx.call_state()[0];
    assert_eq!(outer.error(), Some(EvalError::service("nope")));
    let inner = &outer.children()[0];
    assert_eq!(inner.error(), Some(EvalError::service("nope")));
    assert!(inner.result().is_none());
}

#[tokio::test]
async fn test_nothing_recorded_without_debug() {
    let ctx = create_context(RootSource::default(), Options::new());
    ctx.evaluate(Virtual::of(wrapper()).child(Virtual::of(leaf())))
        .await
        .unwrap();
    assert!(ctx.call_state().is_empty());
}

#[tokio::test]
async fn test_call_tree_pages_through_lazy_serializer() {
    let ctx = debug_root();
    let tree = Virtual::of(parallel())
        .attr("name", "both")
        .child(Virtual::of(leaf()).attr("label", "a"))
        .child(Virtual::of(leaf()).attr("label", "b"));
    LocalSet::new().run_until(ctx.evaluate(tree)).await.unwrap();

    let target = Inspect::CallNodes(ctx.call_state());
    let serializer = LazySerializer::new(2, 1000);
    let rendered = serializer.serialize(&target);
    assert_eq!(rendered[0]["value"]["path"], json!("0"));
    assert_eq!(
        rendered[0]["value"]["children"],
        json!({"type": "more", "path": "0.children", "serializedPath": "0.value.children"})
    );

    let children = serializer
        .load_more(&target, "0.children", "0.value.children")
        .unwrap();
    let children = children.as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["type"], json!("callNode"));
    assert_eq!(children[0]["value"]["kind"], json!("virtual"));
}
