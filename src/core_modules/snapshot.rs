// THEORY:
// The snapshot module is the only door between the color pipeline and the host. The
// host (a browser shell, a launcher, a test) implements `ContentSnapshot` for "the
// thing we're coloring" and `SnapshotSource` for "go and get me a fresh one". The
// pipeline never sees a concrete host type.
//
// Every method returns a boxed future because real hosts answer across a process or
// privilege boundary. The probe wraps each call in a timeout; implementations do not
// need to bound themselves.
//
// `StaticSnapshot` is a plain in-memory implementation for hosts that extract
// everything up front, and for tests.

use crate::error::{ProbeError, ProbeResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque identity of the content being colored, e.g. a normalized origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Normalizes an origin or URL down to its lowercase host part.
    ///
    /// `https://Example.org/path?q=1` and `example.org` produce the same key.
    pub fn from_origin(origin: &str) -> Self {
        let trimmed = origin.trim().to_ascii_lowercase();
        let without_scheme = trimmed
            .split_once("://")
            .map_or(trimmed.as_str(), |(_, rest)| rest);
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        Self(host.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layout box and resolved background of one element matched by a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementBox {
    pub width: f64,
    pub height: f64,
    /// Distance from the top of the viewport in CSS pixels.
    pub top: f64,
    /// Computed `background-color`, as the host reports it.
    pub background: Option<String>,
}

/// Page-level elements whose background can serve as a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageTarget {
    Body,
    Root,
    Container(&'static str),
}

impl fmt::Display for PageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageTarget::Body => f.write_str("body"),
            PageTarget::Root => f.write_str("html"),
            PageTarget::Container(selector) => f.write_str(selector),
        }
    }
}

/// Read-only view of one piece of content, supplied by the host.
pub trait ContentSnapshot: Send + Sync {
    /// Value of a declared theme directive such as `theme-color`.
    fn declared_theme_color<'a>(&'a self, name: &'a str)
    -> BoxFuture<'a, ProbeResult<Option<String>>>;

    /// All elements matching `selector`, in document order.
    fn query_elements<'a>(&'a self, selector: &'a str)
    -> BoxFuture<'a, ProbeResult<Vec<ElementBox>>>;

    /// Computed background of a page-level element, if the element exists.
    fn background_of(&self, target: PageTarget) -> BoxFuture<'_, ProbeResult<Option<String>>>;

    /// Encoded bytes of the content's icon, if it has a usable one.
    fn icon_bytes(&self) -> BoxFuture<'_, ProbeResult<Option<Vec<u8>>>>;
}

/// Produces fresh snapshots for debounced resolutions, where no caller handed one in.
pub trait SnapshotSource: Send + Sync {
    fn snapshot<'a>(
        &'a self,
        key: &'a ContentKey,
    ) -> BoxFuture<'a, ProbeResult<Arc<dyn ContentSnapshot>>>;
}

/// A snapshot whose answers were all extracted ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    theme_hints: HashMap<String, String>,
    elements: HashMap<String, Vec<ElementBox>>,
    backgrounds: HashMap<PageTarget, String>,
    icon: Option<Vec<u8>>,
}

impl StaticSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme_hint(mut self, name: &str, value: &str) -> Self {
        self.theme_hints.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_element(mut self, selector: &str, element: ElementBox) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push(element);
        self
    }

    pub fn with_background(mut self, target: PageTarget, value: &str) -> Self {
        self.backgrounds.insert(target, value.to_string());
        self
    }

    pub fn with_icon(mut self, bytes: Vec<u8>) -> Self {
        self.icon = Some(bytes);
        self
    }
}

impl ContentSnapshot for StaticSnapshot {
    fn declared_theme_color<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, ProbeResult<Option<String>>> {
        let hint = self.theme_hints.get(name).cloned();
        async move { Ok::<_, ProbeError>(hint) }.boxed()
    }

    fn query_elements<'a>(
        &'a self,
        selector: &'a str,
    ) -> BoxFuture<'a, ProbeResult<Vec<ElementBox>>> {
        let elements = self.elements.get(selector).cloned().unwrap_or_default();
        async move { Ok::<_, ProbeError>(elements) }.boxed()
    }

    fn background_of(&self, target: PageTarget) -> BoxFuture<'_, ProbeResult<Option<String>>> {
        let background = self.backgrounds.get(&target).cloned();
        async move { Ok::<_, ProbeError>(background) }.boxed()
    }

    fn icon_bytes(&self) -> BoxFuture<'_, ProbeResult<Option<Vec<u8>>>> {
        let icon = self.icon.clone();
        async move { Ok::<_, ProbeError>(icon) }.boxed()
    }
}
