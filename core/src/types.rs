//! Data model shared by the builder, resources and discovery.
//!
//! # Design
//! `ServiceDescriptor` is the wire shape the discovery endpoint returns and is
//! never mutated after deserialization. `Params` is the per-call parameter bag:
//! either an ordered JSON map, a bare identifier (the "sole path parameter"
//! shorthand), or both once an iterator adds `page` to an identifier call.
//! `PageMeta` is recomputed from headers on every response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::HttpResponse;

/// Server-declared definition of one HTTP operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub uri: String,
    pub method: String,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServiceDescriptor {
    pub fn accepts(&self, name: &str) -> bool {
        self.optional.iter().any(|p| p == name)
    }
}

/// One entry of the discovery document: a lone descriptor or every verb
/// variant of one logical resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DescriptorEntry {
    One(ServiceDescriptor),
    Many(Vec<ServiceDescriptor>),
}

impl DescriptorEntry {
    pub fn into_vec(self) -> Vec<ServiceDescriptor> {
        match self {
            DescriptorEntry::One(d) => vec![d],
            DescriptorEntry::Many(ds) => ds,
        }
    }
}

/// Per-call request parameters.
///
/// Path placeholders are consumed from the bag while the URL is templated, so
/// whatever is left afterwards becomes the query string or the JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    id: Option<String>,
    values: Map<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for "use this value for the path parameter, nothing else".
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            values: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    pub fn take_id(&mut self) -> Option<String> {
        self.id.take()
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.values.is_empty()
    }
}

impl From<&str> for Params {
    fn from(id: &str) -> Self {
        Params::id(id)
    }
}

impl From<String> for Params {
    fn from(id: String) -> Self {
        Params::id(id)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(values: Map<String, Value>) -> Self {
        Self { id: None, values }
    }
}

/// Objects become a bag, strings the identifier shorthand, anything else an
/// empty bag.
impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            Value::String(id) => Params::id(id),
            _ => Params::default(),
        }
    }
}

pub const PAGE_HEADER: &str = "x-page";
pub const PAGES_HEADER: &str = "x-pages";
pub const NEXT_PAGE_HEADER: &str = "x-next-page";

/// Pagination state reported by the server for one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u32,
    pub pages: u32,
    pub next: u32,
    /// Both `x-page` and `x-pages` were present and numeric.
    pub paged: bool,
}

impl PageMeta {
    /// Missing or non-numeric headers read as 0. `paged` is false unless the
    /// current page and the page count were both readable, and the iterator
    /// stops on an unpaged response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let read = |name: &str| {
            response
                .header(name)
                .and_then(|v| v.trim().parse::<u32>().ok())
        };
        let page = read(PAGE_HEADER);
        let pages = read(PAGES_HEADER);
        Self {
            paged: page.is_some() && pages.is_some(),
            page: page.unwrap_or(0),
            pages: pages.unwrap_or(0),
            next: read(NEXT_PAGE_HEADER).unwrap_or(0),
        }
    }
}

/// Summary of one bound descriptor, as listed by `Client::endpoints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub method: String,
    pub uri: String,
    pub params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&ServiceDescriptor> for EndpointInfo {
    fn from(d: &ServiceDescriptor) -> Self {
        Self {
            method: d.method.clone(),
            uri: d.uri.clone(),
            params: d.optional.clone(),
            description: d.description.clone(),
        }
    }
}
