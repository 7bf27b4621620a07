use axum::{
    Json,
    extract::{Host, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use url::form_urlencoded;

use crate::aggregator::RequestContext;
use crate::config::Config;
use crate::data_models::QueryParams;
use crate::error::{ProxyError, Result};

use super::AppState;
use super::models::HealthResponse;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

pub async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    host: Option<Host>,
    RawQuery(query): RawQuery,
) -> Response {
    let host = host.map(|Host(h)| h);
    let upstream_base = match resolve_upstream_base(&state.config, &headers, host.as_deref()) {
        Ok(base) => base,
        Err(e) => return e.into_response(),
    };

    let ctx = RequestContext::new(upstream_base, parse_query(query.as_deref()));
    let reply = state.aggregator.handle_request(&ctx).await;
    (reply.status, reply.body).into_response()
}

pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed_handler() -> Response {
    ProxyError::MethodNotAllowed.into_response()
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Decodes the raw query string. Repeated keys keep the last value.
pub fn parse_query(raw: Option<&str>) -> QueryParams {
    raw.map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// The WordPress origin to proxy to: the configured one, or the inbound
/// request's scheme and host followed by the configured site path.
///
/// `host` is what [`Host`] resolved (`Forwarded`, `X-Forwarded-Host`, `Host`
/// or the URI authority, in that order).
pub fn resolve_upstream_base(
    config: &Config,
    headers: &HeaderMap,
    host: Option<&str>,
) -> Result<String> {
    if let Some(base) = &config.upstream_base {
        return Ok(base.trim_end_matches('/').to_string());
    }

    let scheme = first_header_value(headers, X_FORWARDED_PROTO)
        .unwrap_or_else(|| config.default_scheme.clone());
    // proxies append to X-Forwarded-Host; the client-facing host comes first
    let host = host
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingHost)?;

    let path = config.site_base_path.trim_matches('/');
    if path.is_empty() {
        Ok(format!("{scheme}://{host}"))
    } else {
        Ok(format!("{scheme}://{host}/{path}"))
    }
}

/// First comma-separated entry of a header, as proxies append to these.
fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
