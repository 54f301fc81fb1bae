//! Resources: the typed payloads an evaluation ends with.

use super::Value;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_WEBMIDDLE: &str = "x-webmiddle-type";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// A named, typed piece of content.
///
/// Resources are created through a context so the root registry can assign
/// the `id`. The only sanctioned change after creation is a name/content-type
/// override, which yields a copy sharing the same `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: u64,
    pub name: String,
    pub content_type: String,
    pub content: Value,
}

impl Resource {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        content_type: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// Copy of this resource with the given fields replaced.
    pub fn renamed(&self, name: Option<&str>, content_type: Option<&str>) -> Self {
        Self {
            id: self.id,
            name: name.map(str::to_string).unwrap_or_else(|| self.name.clone()),
            content_type: content_type
                .map(str::to_string)
                .unwrap_or_else(|| self.content_type.clone()),
            content: self.content.clone(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.content_type == CONTENT_TYPE_JSON
    }

    pub fn is_webmiddle_type(&self) -> bool {
        self.content_type == CONTENT_TYPE_WEBMIDDLE
    }
}
