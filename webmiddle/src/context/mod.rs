//! Evaluation context.
//!
//! A `Context` is an immutable scope for one evaluation subtree. Extending a
//! context produces a child that:
//! - shares the root's resource registry, cookie manager, services and settings
//! - owns a shallow-merged copy of the options (child keys win)
//! - starts with an empty call state
//! - bubbles emitted events to its parent
//!
//! ```text
//! root ──extend──► ctx A ──extend──► ctx A.1
//!   │                │                 │
//!   └────────────────┴─────────────────┴──► shared: resources, cookies, services
//! ```

pub mod cookies;
pub mod emitter;
pub mod options;

pub use cookies::{CookieJar, CookieManager, StoredCookie};
pub use emitter::{Channel, Emitter, Event, EventPayload, ListenerId};
pub use options::Options;

use crate::call_tree::CallNodeRef;
use crate::config::Settings;
use crate::error::{EvalError, EvalResult};
use crate::evaluator;
use crate::serialization;
use crate::service::{RootSource, ServiceRegistry};
use crate::value::{Resource, Value, Virtual, VirtualType};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Every resource created under one root, indexed by id.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Rc<Resource>>,
}

impl ResourceRegistry {
    pub fn register(&mut self, name: String, content_type: String, content: Value) -> Rc<Resource> {
        let id = self.resources.len() as u64;
        let resource = Rc::new(Resource::new(id, name, content_type, content));
        self.resources.push(resource.clone());
        resource
    }

    pub fn get(&self, id: u64) -> Option<&Rc<Resource>> {
        self.resources.get(id as usize)
    }

    /// Swap the entry with the same id, if `previous` is what the registry holds.
    fn replace(&mut self, previous: &Rc<Resource>, next: Rc<Resource>) {
        if let Some(slot) = self.resources.get_mut(previous.id as usize) {
            if Rc::ptr_eq(slot, previous) {
                *slot = next;
            }
        }
    }

    pub fn all(&self) -> &[Rc<Resource>] {
        &self.resources
    }
}

/// State shared by all contexts descending from one root.
struct RootState {
    resources: RefCell<ResourceRegistry>,
    cookie_manager: CookieManager,
    services: ServiceRegistry,
    settings: Settings,
}

struct ContextInner {
    options: Options,
    root: Rc<RootState>,
    emitter: Emitter,
    parent: Option<Context>,
    call_state: RefCell<Vec<CallNodeRef>>,
    path: String,
}

#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

/// Build a root context from a service registry and settings source.
pub fn create_context(source: RootSource, options: Options) -> Context {
    Context::root(source, options)
}

impl Context {
    pub fn root(source: RootSource, options: Options) -> Self {
        let RootSource {
            services,
            settings,
            cookie_jar,
            path,
        } = source;
        let options = settings.root_options().merged(&options);
        let cookie_manager = cookie_jar.map(CookieManager::new).unwrap_or_default();
        Self {
            inner: Rc::new(ContextInner {
                options,
                root: Rc::new(RootState {
                    resources: RefCell::new(ResourceRegistry::default()),
                    cookie_manager,
                    services,
                    settings,
                }),
                emitter: Emitter::new(),
                parent: None,
                call_state: RefCell::new(Vec::new()),
                path,
            }),
        }
    }

    /// Child context with `options` layered over ours.
    pub fn extend(&self, options: Options) -> Context {
        Self {
            inner: Rc::new(ContextInner {
                options: self.inner.options.merged(&options),
                root: self.inner.root.clone(),
                emitter: Emitter::new(),
                parent: Some(self.clone()),
                call_state: RefCell::new(Vec::new()),
                path: self.inner.path.clone(),
            }),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.root.settings
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.root.services
    }

    pub fn cookie_manager(&self) -> &CookieManager {
        &self.inner.root.cookie_manager
    }

    pub fn same_root(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner.root, &other.inner.root)
    }

    /// Run `value` through the evaluator in this context.
    pub async fn evaluate(&self, value: impl Into<Value>) -> EvalResult<Value> {
        evaluator::evaluate(self, value.into()).await
    }

    /// Evaluate the service registered at `path` with the given attributes.
    pub async fn evaluate_service(
        &self,
        path: &str,
        attributes: IndexMap<String, Value>,
    ) -> EvalResult<Value> {
        let component = self
            .services()
            .get(path)
            .cloned()
            .ok_or_else(|| EvalError::UnknownService(path.to_string()))?;
        let node = Virtual::new(VirtualType::Component(component), attributes, Vec::new());
        self.evaluate(node).await
    }

    pub fn create_resource(
        &self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Value>,
    ) -> Rc<Resource> {
        self.inner
            .root
            .resources
            .borrow_mut()
            .register(name.into(), content_type.into(), content.into())
    }

    pub fn create_virtual(
        &self,
        node_type: VirtualType,
        attributes: IndexMap<String, Value>,
        children: Vec<Value>,
    ) -> Virtual {
        Virtual::new(node_type, attributes, children)
    }

    pub fn stringify_resource(&self, resource: &Resource) -> EvalResult<String> {
        serialization::stringify_resource(resource)
    }

    pub fn parse_resource(&self, raw: &str) -> EvalResult<Resource> {
        serialization::parse_resource(raw)
    }

    /// Snapshot of every resource created under this root.
    pub fn resources(&self) -> Vec<Rc<Resource>> {
        self.inner.root.resources.borrow().all().to_vec()
    }

    pub fn resource(&self, id: u64) -> Option<Rc<Resource>> {
        self.inner.root.resources.borrow().get(id).cloned()
    }

    /// Apply a name/content-type override, keeping the registry in sync.
    pub(crate) fn override_resource(
        &self,
        resource: &Rc<Resource>,
        name: Option<&str>,
        content_type: Option<&str>,
    ) -> Rc<Resource> {
        let next = Rc::new(resource.renamed(name, content_type));
        self.inner
            .root
            .resources
            .borrow_mut()
            .replace(resource, next.clone());
        next
    }

    pub fn on<F>(&self, channel: Channel, name: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        self.inner.emitter.on(channel, name, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.emitter.off(id)
    }

    /// Dispatch on this context, then on each ancestor until a handler
    /// stops propagation.
    pub fn emit(&self, channel: Channel, name: &str, payload: EventPayload) {
        let event = Event::new(channel, name, payload);
        let mut current = Some(self);
        while let Some(context) = current {
            context.inner.emitter.dispatch(&event);
            if event.is_propagation_stopped() {
                break;
            }
            current = context.parent();
        }
    }

    /// Call nodes recorded directly on this context.
    pub fn call_state(&self) -> Vec<CallNodeRef> {
        self.inner.call_state.borrow().clone()
    }

    pub(crate) fn push_call(&self, node: CallNodeRef) -> usize {
        let mut state = self.inner.call_state.borrow_mut();
        state.push(node);
        state.len() - 1
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.inner.path)
            .field("options", &self.inner.options)
            .field("is_root", &self.is_root())
            .field("calls", &self.inner.call_state.borrow().len())
            .finish()
    }
}
