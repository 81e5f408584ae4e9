//! Client-side binding of the descriptors that share one resource name.
//!
//! # Design
//! A `Resource` is built from `(name, token, descriptors, transport)` and keeps
//! one binding per verb that was actually declared: the descriptor plus the
//! pure builder for that verb. Calling a verb without a binding fails with
//! `MethodNotAllowed` before anything is sent. The token and transport are
//! shared with the client and every other resource; nothing else is.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::iterator::PageIterator;
use crate::request::{self, BuildFn};
use crate::transport::Transport;
use crate::types::{PageMeta, Params, ServiceDescriptor};

#[derive(Clone)]
struct Binding {
    descriptor: ServiceDescriptor,
    build: BuildFn,
}

pub struct Resource<T> {
    name: String,
    token: Arc<str>,
    base: Option<Url>,
    bindings: BTreeMap<HttpMethod, Binding>,
    transport: Arc<T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            token: Arc::clone(&self.token),
            base: self.base.clone(),
            bindings: self.bindings.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("methods", &self.bindings.keys().collect::<Vec<_>>())
            .field("base", &self.base.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Resource<T> {
    /// Descriptors with an unrecognized method are skipped; a repeated method
    /// keeps the last descriptor seen.
    pub fn new(
        name: impl Into<String>,
        token: Arc<str>,
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
        transport: Arc<T>,
    ) -> Self {
        let name = name.into();
        let mut bindings = BTreeMap::new();
        for descriptor in descriptors {
            let method = match descriptor.method.parse::<HttpMethod>() {
                Ok(m) => m,
                Err(e) => {
                    warn!(resource = %name, error = %e, "skipping descriptor");
                    continue;
                }
            };
            let build = request::builder_for(method);
            if bindings.insert(method, Binding { descriptor, build }).is_some() {
                warn!(resource = %name, %method, "duplicate descriptor, keeping the last one");
            }
        }
        Self {
            name,
            token,
            base: None,
            bindings,
            transport,
        }
    }

    /// Relative descriptor URIs are resolved against `base`.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        self.bindings.keys().copied()
    }

    pub fn descriptor(&self, method: HttpMethod) -> Option<&ServiceDescriptor> {
        self.bindings.get(&method).map(|b| &b.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> + '_ {
        self.bindings.values().map(|b| &b.descriptor)
    }

    /// True when the GET descriptor accepts a `page` parameter.
    pub fn is_iterable(&self) -> bool {
        self.descriptor(HttpMethod::Get).is_some_and(|d| d.accepts("page"))
    }

    /// Build the request for `method` without sending it.
    pub fn build(&self, method: HttpMethod, params: Params) -> Result<HttpRequest> {
        let binding = self.bindings.get(&method).ok_or_else(|| ApiError::MethodNotAllowed {
            resource: self.name.clone(),
            method,
        })?;
        let mut request = (binding.build)(&binding.descriptor, &self.token, params)?;
        if let Some(base) = &self.base {
            request.url = base
                .join(&request.url)
                .map_err(|e| {
                    ApiError::Config(format!("cannot resolve `{}` against `{base}`: {e}", request.url))
                })?
                .to_string();
        }
        Ok(request)
    }

    async fn send(&self, method: HttpMethod, params: Params) -> Result<(Value, PageMeta)> {
        let request = self.build(method, params)?;
        debug!(resource = %self.name, %method, url = %request.url, "sending request");
        let response = self.transport.execute(request).await?;
        request::parse_response(response)
    }

    /// Fetch with GET. A bare string is the identifier shorthand.
    pub async fn get(&self, params: impl Into<Params>) -> Result<(Value, PageMeta)> {
        self.send(HttpMethod::Get, params.into()).await
    }

    pub async fn post(&self, params: impl Into<Params>) -> Result<Value> {
        self.send(HttpMethod::Post, params.into()).await.map(|(body, _)| body)
    }

    pub async fn put(&self, params: impl Into<Params>) -> Result<Value> {
        self.send(HttpMethod::Put, params.into()).await.map(|(body, _)| body)
    }

    pub async fn delete(&self, params: impl Into<Params>) -> Result<Value> {
        self.send(HttpMethod::Delete, params.into()).await.map(|(body, _)| body)
    }

    /// Fetch every page in order and concatenate the items.
    ///
    /// Empty pages are skipped over; the first failed fetch aborts the whole
    /// call.
    pub async fn all(&self, params: impl Into<Params>) -> Result<Vec<Value>> {
        let mut iter = self.iter(params)?;
        let mut records = Vec::new();
        while iter.has_next() {
            records.extend(iter.next_page().await?);
        }
        debug!(resource = %self.name, count = records.len(), pages = iter.pages(), "fetched all pages");
        Ok(records)
    }

    /// A fresh iterator over this resource. Performs no I/O.
    pub fn iter(&self, params: impl Into<Params>) -> Result<PageIterator<'_, T>> {
        if !self.is_iterable() {
            return Err(ApiError::NotIterable(self.name.clone()));
        }
        Ok(PageIterator::new(self, params.into()))
    }
}
