// webmiddle
// Declarative evaluation of virtual service trees into typed resources

pub mod call_tree;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod serialization;
pub mod service;
pub mod value;

pub use call_tree::{CallKind, CallNode, CallNodeRef};
pub use config::Settings;
pub use context::{create_context, Channel, Context, Options};
pub use error::{EvalError, EvalResult};
pub use serialization::{Inspect, LazySerializer};
pub use service::{RootSource, ServiceRegistry};
pub use value::{Component, PropKind, PropSpec, Props, Resource, Value, Virtual, VirtualType};
