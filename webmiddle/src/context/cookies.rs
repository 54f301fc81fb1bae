//! Cookie jar shared by every context under one root.
//!
//! The jar is handed to the root context at construction time and implements
//! reqwest's `CookieStore`, so an HTTP adapter can plug it in as its cookie
//! provider and every evaluation sees the same cookies. Storage and matching
//! are delegated to `cookie_store`, the store reqwest itself uses.

use crate::error::{EvalError, EvalResult};
use cookie_store::CookieStore;
use reqwest::header::HeaderValue;
use serde::Serialize;
use std::io::BufReader;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

/// Snapshot of one stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// `Domain` attribute; absent for host-only cookies.
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl StoredCookie {
    fn from_store(cookie: &cookie_store::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
            secure: cookie.secure().unwrap_or(false),
            http_only: cookie.http_only().unwrap_or(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct CookieJar {
    store: Mutex<CookieStore>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, CookieStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a `Set-Cookie` header value received from `url`. An already
    /// expired cookie removes the matching stored one.
    pub fn set_cookie(&self, raw: &str, url: &Url) -> EvalResult<()> {
        self.store()
            .parse(raw, url)
            .map(|_| ())
            .map_err(|e| EvalError::Parse(format!("cookie from {}: {}", url, e)))
    }

    /// Cookies to send to `url`, longest path first.
    pub fn get_cookies(&self, url: &Url) -> Vec<StoredCookie> {
        let store = self.store();
        let mut matching: Vec<StoredCookie> = store
            .matches(url)
            .into_iter()
            .map(StoredCookie::from_store)
            .collect();
        matching.sort_by(|a, b| {
            let len = |c: &StoredCookie| c.path.as_deref().map(str::len).unwrap_or(0);
            len(b).cmp(&len(a)).then_with(|| a.name.cmp(&b.name))
        });
        matching
    }

    /// `Cookie` request header value for `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.get_cookies(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Persistent, unexpired cookies as JSON. Session cookies are not saved.
    pub fn to_json(&self) -> EvalResult<String> {
        let mut buffer = Vec::new();
        self.store()
            .save_json(&mut buffer)
            .map_err(|e| EvalError::Serialization(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| EvalError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> EvalResult<Self> {
        let store = CookieStore::load_json(BufReader::new(json.as_bytes()))
            .map_err(|e| EvalError::Parse(e.to_string()))?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    pub fn len(&self) -> usize {
        self.store().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Err(e) = self.set_cookie(raw, url) {
                debug!("Ignoring cookie: {}", e);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.cookie_header(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

/// Handle to the jar carried by every context of one root.
#[derive(Debug, Clone)]
pub struct CookieManager {
    jar: Arc<CookieJar>,
}

impl CookieManager {
    pub fn new(jar: Arc<CookieJar>) -> Self {
        Self { jar }
    }

    pub fn jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }
}

impl Default for CookieManager {
    fn default() -> Self {
        Self::new(Arc::new(CookieJar::new()))
    }
}
