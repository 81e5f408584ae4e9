//! Service discovery and resource registry.
//!
//! # Design
//! `Client::discover` performs the bootstrap GET, turns every entry of the
//! returned document into a `Resource` and swaps the whole registry in one
//! step. Progress is published on a `watch` channel as
//! `Idle → Discovering → Ready | Failed`; every periodic refresh walks the same
//! states again. `Client::start` owns the refresh loop through a
//! `DiscoveryHandle`, which cancels the task on `shutdown` or drop.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::AUTH_HEADER;
use crate::resource::Resource;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{DescriptorEntry, EndpointInfo, ServiceDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStatus {
    Idle,
    Discovering,
    Ready,
    Failed(ApiError),
}

struct Inner<T> {
    config: ClientConfig,
    transport: Arc<T>,
    resources: RwLock<BTreeMap<String, Resource<T>>>,
    status: watch::Sender<DiscoveryStatus>,
}

/// Discovers services and hands out the resources bound from them.
///
/// Cloning is cheap; clones share the registry and the status channel.
pub struct Client<T = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Client<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let (status, _) = watch::channel(DiscoveryStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                resources: RwLock::new(BTreeMap::new()),
                status,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn status(&self) -> DiscoveryStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DiscoveryStatus> {
        self.inner.status.subscribe()
    }

    pub fn resource(&self, name: &str) -> Option<Resource<T>> {
        self.registry().get(name).cloned()
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.registry().keys().cloned().collect()
    }

    /// Every bound descriptor, grouped by resource name.
    pub fn endpoints(&self) -> BTreeMap<String, Vec<EndpointInfo>> {
        self.registry()
            .iter()
            .map(|(name, resource)| (name.clone(), resource.descriptors().map(EndpointInfo::from).collect()))
            .collect()
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Resource<T>>> {
        self.inner.resources.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run discovery once. The outcome is returned and also published on the
    /// status channel.
    pub async fn discover(&self) -> Result<()> {
        self.inner.status.send_replace(DiscoveryStatus::Discovering);
        match self.bind_services().await {
            Ok(count) => {
                info!(url = %self.inner.config.url, resources = count, "discovery complete");
                self.inner.status.send_replace(DiscoveryStatus::Ready);
                Ok(())
            }
            Err(e) => {
                warn!(url = %self.inner.config.url, error = %e, "discovery failed");
                self.inner.status.send_replace(DiscoveryStatus::Failed(e.clone()));
                Err(e)
            }
        }
    }

    async fn bind_services(&self) -> Result<usize> {
        let config = &self.inner.config;
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingCredential)?;

        debug!(url = %config.url, "requesting discovery document");
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: config.url.clone(),
            headers: vec![(AUTH_HEADER.to_string(), token.to_string())],
            body: None,
        };
        let response = self.inner.transport.execute(request).await?;
        let services = parse_discovery(response)?;

        let base = Url::parse(&config.url).ok();
        let token: Arc<str> = Arc::from(token);
        let resources: BTreeMap<String, Resource<T>> = services
            .into_iter()
            .map(|(name, descriptors)| {
                debug!(resource = %name, "exposing resource");
                let resource = Resource::new(name.clone(), Arc::clone(&token), descriptors, Arc::clone(&self.inner.transport));
                let resource = match &base {
                    Some(base) => resource.with_base(base.clone()),
                    None => resource,
                };
                (name, resource)
            })
            .filter(|(_, resource)| resource.methods().next().is_some())
            .collect();

        let count = resources.len();
        *self.inner.resources.write().unwrap_or_else(PoisonError::into_inner) = resources;
        Ok(count)
    }

    /// Discover now and then on every configured interval, in the background.
    ///
    /// Without an interval discovery runs once. A missing token stops the loop
    /// since no later attempt could succeed. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self) -> DiscoveryHandle {
        let client = self.clone();
        let task = tokio::spawn(async move {
            let Some(period) = client.inner.config.interval else {
                let _ = client.discover().await;
                return;
            };
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(ApiError::MissingCredential) = client.discover().await {
                    return;
                }
            }
        });
        DiscoveryHandle { task: Some(task) }
    }
}

/// Owns the background discovery task.
#[derive(Debug)]
pub struct DiscoveryHandle {
    task: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    /// Cancel the task and wait until it has stopped.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Turn a discovery response into descriptors grouped by resource name.
///
/// 401/403, a body that is not a JSON object, or `success: false` mean the
/// token was rejected. Entries that are not descriptors are skipped.
pub fn parse_discovery(response: HttpResponse) -> Result<BTreeMap<String, Vec<ServiceDescriptor>>> {
    match response.status {
        401 | 403 => return Err(ApiError::AuthenticationFailure(format!("HTTP {}", response.status))),
        s if s >= 400 => {
            return Err(ApiError::UpstreamError {
                status: s,
                body: response.body,
            })
        }
        _ => {}
    }

    let document: Map<String, Value> = match serde_json::from_str(&response.body) {
        Ok(Value::Object(map)) => map,
        _ => {
            return Err(ApiError::AuthenticationFailure(
                "discovery response is not a JSON object".to_string(),
            ))
        }
    };

    if document.get("success") == Some(&Value::Bool(false)) {
        let message = document
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("invalid token");
        return Err(ApiError::AuthenticationFailure(message.to_string()));
    }

    let mut services = BTreeMap::new();
    for (name, entry) in document {
        if name == "success" {
            continue;
        }
        match serde_json::from_value::<DescriptorEntry>(entry) {
            Ok(entry) => {
                services.insert(name, entry.into_vec());
            }
            Err(e) => warn!(resource = %name, error = %e, "skipping malformed discovery entry"),
        }
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "widgets": [
                {"uri": "/widgets", "method": "GET", "optional": ["page", "color"], "description": "List widgets"},
                {"uri": "/widgets", "method": "POST", "optional": ["name", "color"]}
            ],
            "status": {"uri": "https://status.example.com/ping", "method": "GET"},
            "broken": {"nope": true}
        })
    }

    fn client(token: Option<&str>) -> Client<ScriptedTransport> {
        let mut config = ClientConfig::new("http://api.example.com/discover");
        config.token = token.map(str::to_string);
        Client::with_transport(config, ScriptedTransport::default())
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let client = client(None);
        let err = client.discover().await.unwrap_err();
        assert_eq!(err, ApiError::MissingCredential);
        assert_eq!(client.status(), DiscoveryStatus::Failed(ApiError::MissingCredential));
        assert!(client.inner.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn binds_one_resource_per_entry() {
        let client = client(Some("tok"));
        client.inner.transport.push_json(200, document());

        assert_eq!(client.status(), DiscoveryStatus::Idle);
        client.discover().await.unwrap();
        assert_eq!(client.status(), DiscoveryStatus::Ready);

        let sent = client.inner.transport.requests();
        assert_eq!(sent[0].url, "http://api.example.com/discover");
        assert_eq!(sent[0].header("x-auth-token"), Some("tok"));

        assert_eq!(client.resource_names(), ["status", "widgets"]);
        let widgets = client.resource("widgets").unwrap();
        assert_eq!(widgets.methods().collect::<Vec<_>>(), [HttpMethod::Get, HttpMethod::Post]);
        assert!(widgets.is_iterable());
        assert!(!client.resource("status").unwrap().is_iterable());
        assert!(client.resource("broken").is_none());
    }

    #[tokio::test]
    async fn bound_resources_resolve_against_discovery_url() {
        let client = client(Some("tok"));
        client.inner.transport.push_json(200, document());
        client.discover().await.unwrap();

        let widgets = client.resource("widgets").unwrap();
        let request = widgets.build(HttpMethod::Get, json!({"page": 2}).into()).unwrap();
        assert_eq!(request.url, "http://api.example.com/widgets?page=2");

        let status = client.resource("status").unwrap();
        let request = status.build(HttpMethod::Get, Default::default()).unwrap();
        assert_eq!(request.url, "https://status.example.com/ping");
    }

    #[tokio::test]
    async fn rejected_token_is_an_authentication_failure() {
        let client = client(Some("bad"));
        client
            .inner
            .transport
            .push_json(200, json!({"success": false, "message": "Invalid token"}));

        let err = client.discover().await.unwrap_err();
        assert_eq!(err, ApiError::AuthenticationFailure("Invalid token".to_string()));
        assert!(matches!(client.status(), DiscoveryStatus::Failed(ApiError::AuthenticationFailure(_))));
    }

    #[tokio::test]
    async fn non_object_body_is_an_authentication_failure() {
        let client = client(Some("tok"));
        client.inner.transport.push_json(200, json!(["not", "a", "map"]));
        assert!(matches!(client.discover().await, Err(ApiError::AuthenticationFailure(_))));
    }

    #[tokio::test]
    async fn transport_failure_is_published() {
        let client = client(Some("tok"));
        client
            .inner
            .transport
            .push(Err(ApiError::Transport("connection refused".to_string())));
        let mut status = client.subscribe();

        assert!(client.discover().await.is_err());
        assert!(status.has_changed().unwrap());
        assert!(matches!(*status.borrow_and_update(), DiscoveryStatus::Failed(ApiError::Transport(_))));
    }

    #[tokio::test]
    async fn rediscovery_replaces_registry() {
        let client = client(Some("tok"));
        client.inner.transport.push_json(200, document());
        client
            .inner
            .transport
            .push_json(200, json!({"gadgets": {"uri": "/gadgets", "method": "GET"}}));

        client.discover().await.unwrap();
        client.discover().await.unwrap();
        assert_eq!(client.resource_names(), ["gadgets"]);
    }

    #[tokio::test]
    async fn endpoints_list_bound_descriptors() {
        let client = client(Some("tok"));
        client.inner.transport.push_json(200, document());
        client.discover().await.unwrap();

        let endpoints = client.endpoints();
        let widgets = &endpoints["widgets"];
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].uri, "/widgets");
        assert_eq!(widgets[0].params, ["page", "color"]);
        assert_eq!(widgets[0].description.as_deref(), Some("List widgets"));
        assert!(endpoints["status"][0].params.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_discovery_reruns_until_shutdown() {
        let mut config = ClientConfig::new("http://api.example.com/discover").with_token("tok");
        config.interval = Some(Duration::from_secs(30));
        let client = Client::with_transport(config, ScriptedTransport::default());
        for _ in 0..3 {
            client.inner.transport.push_json(200, document());
        }

        let mut status = client.subscribe();
        let handle = client.start();

        status.wait_for(|s| *s == DiscoveryStatus::Ready).await.unwrap();
        assert_eq!(client.inner.transport.requests().len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(client.inner.transport.requests().len(), 2);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(client.inner.transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn one_shot_start_finishes_on_its_own() {
        let client = client(None);
        let mut status = client.subscribe();
        let handle = client.start();

        status
            .wait_for(|s| matches!(s, DiscoveryStatus::Failed(_)))
            .await
            .unwrap();
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(client.inner.transport.requests().is_empty());
    }
}
