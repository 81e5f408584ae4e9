//! Dynamic API client core: service discovery, resource binding, pagination.
//!
//! # Overview
//! A discovery call returns a map of service descriptors (method, URI
//! template, optional parameter names). Each entry becomes a `Resource` whose
//! verbs build requests from those descriptors; page-capable resources can be
//! walked page by page with a `PageIterator` or fetched whole with
//! `Resource::all`.
//!
//! # Design
//! - Request building (`request`, `template`) and response parsing are pure
//!   functions over plain-data `HttpRequest`/`HttpResponse` values, so they
//!   can be exercised without a network (host-does-IO pattern).
//! - A `Transport` executes those values; `ReqwestTransport` is the default.
//! - `Client` owns the discovered registry and publishes its lifecycle on a
//!   `tokio::sync::watch` channel.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod iterator;
pub mod request;
pub mod resource;
pub mod template;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use discovery::{Client, DiscoveryHandle, DiscoveryStatus};
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use iterator::PageIterator;
pub use request::{build_request, parse_response};
pub use resource::Resource;
pub use transport::{ReqwestTransport, Transport};
pub use types::{EndpointInfo, PageMeta, Params, ServiceDescriptor};
