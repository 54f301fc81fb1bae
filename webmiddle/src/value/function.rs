//! Callable and deferred values.

use super::Value;
use crate::error::EvalResult;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// A plain function value, invoked by the evaluator with the context's
/// `functionParameters` as positional arguments.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    func: Rc<dyn Fn(&[Value]) -> EvalResult<Value>>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + 'static,
    {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> EvalResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

/// A computation that has not settled yet.
///
/// The underlying future is shared, so cloning a pending value and awaiting
/// both copies runs the computation once and hands both the same outcome.
#[derive(Clone)]
pub struct Pending {
    inner: Shared<LocalBoxFuture<'static, EvalResult<Value>>>,
}

impl Pending {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = EvalResult<Value>> + 'static,
    {
        Self {
            inner: future.boxed_local().shared(),
        }
    }

    /// A pending value that is already settled.
    pub fn ready(outcome: EvalResult<Value>) -> Self {
        Self::new(futures::future::ready(outcome))
    }

    pub async fn resolve(&self) -> EvalResult<Value> {
        self.inner.clone().await
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pending")
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}
