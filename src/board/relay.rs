//! Same-origin relay to the agent directory service.
//!
//! Browser clients cannot call the directory service directly because it
//! does not send CORS headers. `/relay/{*path}` forwards the request
//! upstream and hands the response back with CORS headers attached.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::api::SharedState;

/// Request headers forwarded upstream. Everything else is dropped.
pub const FORWARDED_REQUEST_HEADERS: &[&str] = &[
    "authorization",
    "content-type",
    "accept",
    "user-agent",
    "x-request-id",
];

/// Response headers never copied back to the client.
pub const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if FORWARDED_REQUEST_HEADERS.contains(&name.as_str()) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut kept = HeaderMap::new();
    for (name, value) in headers {
        if !STRIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
            kept.append(name.clone(), value.clone());
        }
    }
    kept
}

/// Overwrite the CORS headers on `headers` with permissive values.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, content-type, accept, user-agent, x-request-id"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
}

fn relay_error(message: String) -> Response {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    (
        StatusCode::BAD_GATEWAY,
        headers,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

pub struct Relay {
    client: reqwest::Client,
    upstream: String,
}

impl Relay {
    pub fn new(upstream: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build relay HTTP client")?;
        Ok(Self {
            client,
            upstream: upstream.trim_end_matches('/').to_string(),
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.upstream, path.trim_start_matches('/'));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Forward one request and translate the upstream answer.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        if method == Method::OPTIONS {
            let mut headers = HeaderMap::new();
            apply_cors(&mut headers);
            return (StatusCode::NO_CONTENT, headers).into_response();
        }

        let url = self.target_url(path, query);
        tracing::debug!(%method, %url, "relaying request");

        let upstream = self
            .client
            .request(method, &url)
            .headers(filter_request_headers(headers))
            .body(body)
            .send()
            .await;
        let upstream = match upstream {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(%url, error = %e, "relay request failed");
                return relay_error(format!("Relay request failed: {}", e));
            }
        };

        let status = upstream.status();
        let mut headers = filter_response_headers(upstream.headers());
        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%url, error = %e, "failed to read relayed response");
                return relay_error(format!("Failed to read upstream response: {}", e));
            }
        };
        apply_cors(&mut headers);
        (status, headers, body).into_response()
    }
}

pub async fn relay_handler(
    State(state): State<SharedState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .relay
        .forward(method, &path, query.as_deref(), &headers, body)
        .await
}
