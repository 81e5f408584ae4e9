//! Stateless request builder and response parser.
//!
//! # Design
//! Each verb has a `build_*` function that turns a descriptor, a token and a
//! parameter bag into an `HttpRequest`, and `parse_response` turns any
//! `HttpResponse` into a JSON body plus pagination metadata. Nothing here
//! performs I/O, so every rule about templating, query projection and body
//! attachment can be checked without a server.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::template;
use crate::types::{PageMeta, Params, ServiceDescriptor};

pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Signature shared by the per-verb builders.
pub type BuildFn = fn(&ServiceDescriptor, &str, Params) -> Result<HttpRequest>;

/// Verb dispatch table.
pub fn builder_for(method: HttpMethod) -> BuildFn {
    match method {
        HttpMethod::Get => build_get,
        HttpMethod::Post => build_post,
        HttpMethod::Put => build_put,
        HttpMethod::Delete => build_delete,
    }
}

pub fn build_request(
    method: HttpMethod,
    descriptor: &ServiceDescriptor,
    token: &str,
    params: Params,
) -> Result<HttpRequest> {
    builder_for(method)(descriptor, token, params)
}

/// Path params are templated; the rest is filtered down to the descriptor's
/// optional names and sent as a query string.
pub fn build_get(descriptor: &ServiceDescriptor, token: &str, mut params: Params) -> Result<HttpRequest> {
    let mut url = template::expand(&descriptor.uri, &mut params, HttpMethod::Get)?;
    let query = encode_query(params.values(), &descriptor.optional)?;
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }
    debug!(%url, "built GET request");
    Ok(HttpRequest {
        method: HttpMethod::Get,
        url,
        headers: auth_headers(token),
        body: None,
    })
}

pub fn build_post(descriptor: &ServiceDescriptor, token: &str, params: Params) -> Result<HttpRequest> {
    build_with_body(HttpMethod::Post, descriptor, token, params)
}

pub fn build_put(descriptor: &ServiceDescriptor, token: &str, params: Params) -> Result<HttpRequest> {
    build_with_body(HttpMethod::Put, descriptor, token, params)
}

/// Anything left in the bag after templating is dropped.
pub fn build_delete(descriptor: &ServiceDescriptor, token: &str, mut params: Params) -> Result<HttpRequest> {
    let url = template::expand(&descriptor.uri, &mut params, HttpMethod::Delete)?;
    debug!(%url, "built DELETE request");
    Ok(HttpRequest {
        method: HttpMethod::Delete,
        url,
        headers: auth_headers(token),
        body: None,
    })
}

fn build_with_body(
    method: HttpMethod,
    descriptor: &ServiceDescriptor,
    token: &str,
    mut params: Params,
) -> Result<HttpRequest> {
    let url = template::expand(&descriptor.uri, &mut params, method)?;
    let body = serde_json::to_string(&Value::Object(params.into_values()))
        .map_err(|e| ApiError::Serialization(e.to_string()))?;
    debug!(%method, %url, "built request with JSON body");

    let mut headers = auth_headers(token);
    headers.push(("content-type".to_string(), "application/json".to_string()));
    Ok(HttpRequest {
        method,
        url,
        headers,
        body: Some(body),
    })
}

fn auth_headers(token: &str) -> Vec<(String, String)> {
    vec![(AUTH_HEADER.to_string(), token.to_string())]
}

/// Form-encode the bag entries named in `allowed`, in bag order. Arrays
/// repeat the key once per element.
fn encode_query(values: &Map<String, Value>, allowed: &[String]) -> Result<String> {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    for (key, value) in values {
        if !allowed.iter().any(|a| a == key) {
            continue;
        }
        match value {
            Value::Array(items) => pairs.extend(items.iter().map(|v| (key.as_str(), query_value(v)))),
            other => pairs.push((key.as_str(), query_value(other))),
        }
    }
    serde_urlencoded::to_string(&pairs).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn query_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a response: statuses of 400 and above become `UpstreamError`
/// carrying the raw body; otherwise the body is decoded as JSON (an empty body
/// is `null`, non-JSON text is kept as a string) and paired with the paging
/// headers.
pub fn parse_response(response: HttpResponse) -> Result<(Value, PageMeta)> {
    if response.status >= 400 {
        return Err(ApiError::UpstreamError {
            status: response.status,
            body: response.body,
        });
    }
    let meta = PageMeta::from_response(&response);
    Ok((decode_body(response.body), meta))
}

fn decode_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
