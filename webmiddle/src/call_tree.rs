//! Debug-mode call recording.
//!
//! When `debug` is set, every virtual invocation (and every error-boundary
//! attempt) becomes a `CallNode`. Calls are opened wherever evaluation happens
//! to be, so nodes don't know their parent up front. Instead:
//!
//! 1. the node is pushed on the current context's call state,
//! 2. an `Internal` `callNode:add:before` event bubbles up the context chain,
//! 3. the nearest ancestor that is itself running a recorded call claims the
//!    node as its child and stops the event,
//! 4. the work runs in a fresh child context that carries the claiming
//!    listener for this node.
//!
//! Sibling evaluations started concurrently under one parent each get their
//! own context (and call state), yet all end up under the same parent node.

use crate::context::{Channel, Context, EventPayload, ListenerId, Options};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::debug;

pub const CALL_NODE_ADD_BEFORE: &str = "callNode:add:before";
pub const CALL_NODE_ADD: &str = "callNode:add";
pub const CALL_NODE_UPDATE: &str = "callNode:update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Virtual,
    Try,
    Catch,
}

#[derive(Debug, Clone)]
pub struct CallNode {
    pub kind: CallKind,
    pub value: Value,
    pub options: Options,
    pub children: Vec<CallNodeRef>,
    pub call_root_context_path: String,
    /// Dot-separated index path relative to `call_root_context_path`.
    pub path: String,
    pub result: Option<Value>,
    pub error: Option<EvalError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared handle to a node; parents link children after creation.
#[derive(Clone)]
pub struct CallNodeRef(Rc<RefCell<CallNode>>);

impl CallNodeRef {
    fn new(node: CallNode) -> Self {
        Self(Rc::new(RefCell::new(node)))
    }

    #[cfg(test)]
    pub(crate) fn detached(value: Value, options: Options) -> Self {
        Self::new(CallNode {
            kind: CallKind::Virtual,
            value,
            options,
            children: Vec::new(),
            call_root_context_path: String::new(),
            path: String::new(),
            result: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn borrow(&self) -> Ref<'_, CallNode> {
        self.0.borrow()
    }

    pub fn kind(&self) -> CallKind {
        self.0.borrow().kind
    }

    pub fn path(&self) -> String {
        self.0.borrow().path.clone()
    }

    pub fn children(&self) -> Vec<CallNodeRef> {
        self.0.borrow().children.clone()
    }

    pub fn result(&self) -> Option<Value> {
        self.0.borrow().result.clone()
    }

    pub fn error(&self) -> Option<EvalError> {
        self.0.borrow().error.clone()
    }

    pub fn is_settled(&self) -> bool {
        let node = self.0.borrow();
        node.result.is_some() || node.error.is_some()
    }

    pub fn ptr_eq(&self, other: &CallNodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Link `child` under this node and rebase its path onto ours.
    fn adopt(&self, child: &CallNodeRef) {
        let mut parent = self.0.borrow_mut();
        let mut node = child.0.borrow_mut();
        node.path = format!("{}.{}", parent.path, parent.children.len());
        node.call_root_context_path = parent.call_root_context_path.clone();
        parent.children.push(child.clone());
    }

    fn settle(&self, outcome: &EvalResult<Value>) {
        let mut node = self.0.borrow_mut();
        match outcome {
            Ok(value) => node.result = Some(value.clone()),
            Err(e) => node.error = Some(e.clone()),
        }
        node.finished_at = Some(Utc::now());
    }
}

impl fmt::Debug for CallNodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("CallNode")
            .field("kind", &node.kind)
            .field("path", &node.path)
            .field("value", &node.value)
            .field("children", &node.children)
            .field("settled", &(node.result.is_some() || node.error.is_some()))
            .finish()
    }
}

/// A call opened by [`begin_call`] and not yet settled.
pub(crate) struct CallRecording {
    context: Context,
    call_context: Context,
    node: CallNodeRef,
    listener: ListenerId,
}

/// Open a call of `kind` over `value` on `context`.
///
/// Returns the context the call's work runs in, and the recording to
/// [`finish`](CallRecording::finish) once that work settles. Without
/// `debug` the work runs on `context` itself and nothing is recorded.
pub(crate) fn begin_call(
    context: &Context,
    kind: CallKind,
    value: Value,
) -> (Context, Option<CallRecording>) {
    if !context.options().debug() {
        return (context.clone(), None);
    }

    let node = CallNodeRef::new(CallNode {
        kind,
        value,
        options: context.options().clone(),
        children: Vec::new(),
        call_root_context_path: context.path().to_string(),
        path: String::new(),
        result: None,
        error: None,
        started_at: Utc::now(),
        finished_at: None,
    });
    let index = context.push_call(node.clone());
    node.0.borrow_mut().path = index.to_string();

    context.emit(
        Channel::Internal,
        CALL_NODE_ADD_BEFORE,
        EventPayload::CallNode(node.clone()),
    );
    debug!(path = %node.path(), kind = ?kind, "call node added");
    context.emit(Channel::Message, CALL_NODE_ADD, EventPayload::CallNode(node.clone()));

    let call_context = context.extend(Options::new());
    let parent = node.clone();
    let listener = call_context.on(Channel::Internal, CALL_NODE_ADD_BEFORE, move |event| {
        if let EventPayload::CallNode(child) = &event.payload {
            parent.adopt(child);
            event.stop_propagation();
        }
    });

    let recording = CallRecording {
        context: context.clone(),
        call_context: call_context.clone(),
        node,
        listener,
    };
    (call_context, Some(recording))
}

impl CallRecording {
    /// Store the outcome on the node and announce it. Runs before the
    /// caller sees any error.
    pub(crate) fn finish(self, outcome: &EvalResult<Value>) {
        self.node.settle(outcome);
        self.call_context.off(self.listener);

        self.context.emit(
            Channel::Message,
            CALL_NODE_UPDATE,
            EventPayload::CallNode(self.node.clone()),
        );
        if let Err(e) = outcome {
            debug!(path = %self.node.path(), "call node failed: {}", e);
        }
    }
}

/// Run `work` as one recorded call of `kind` over `value`.
///
/// Without `debug` this just runs `work` on `context`. With it, the node
/// always ends with exactly one of `result` / `error` set, and the
/// `callNode:update` message fires before any error is returned.
pub async fn record_call<F, Fut>(
    context: &Context,
    kind: CallKind,
    value: Value,
    work: F,
) -> EvalResult<Value>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = EvalResult<Value>>,
{
    let (call_context, recording) = begin_call(context, kind, value);
    let outcome = work(call_context).await;
    if let Some(recording) = recording {
        recording.finish(&outcome);
    }
    outcome
}
