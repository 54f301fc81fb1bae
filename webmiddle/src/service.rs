//! Service registry and root construction inputs.

use crate::config::Settings;
use crate::context::CookieJar;
use crate::value::Component;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Components addressable by path, e.g. `"search/google"`.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: IndexMap<String, Component>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` at `path`, replacing any previous entry.
    pub fn register(&mut self, path: impl Into<String>, component: Component) -> &mut Self {
        let path = path.into();
        debug!(path = %path, component = component.name(), "registering service");
        self.services.insert(path, component);
        self
    }

    pub fn with(mut self, path: impl Into<String>, component: Component) -> Self {
        self.register(path, component);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Component> {
        self.services.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.services.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

/// Everything a root context is built from.
#[derive(Debug, Default)]
pub struct RootSource {
    pub services: ServiceRegistry,
    pub settings: Settings,
    /// Shared jar; a fresh one is created when absent.
    pub cookie_jar: Option<Arc<CookieJar>>,
    /// Identifies the root in call-node `call_root_context_path`.
    pub path: String,
}

impl RootSource {
    pub fn new(services: ServiceRegistry) -> Self {
        Self {
            services,
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}
