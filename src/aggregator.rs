use axum::http::StatusCode;
use serde_json::Value;
use std::cmp::Reverse;
use std::sync::Arc;

use crate::data_models::{
    ContentType, EndpointKind, QueryParams, SearchRequest, UpstreamTarget, effective_timestamp,
};
use crate::error::{ProxyError, Result};
use crate::help::{help_document, to_pretty_json};
use crate::transport::Transport;

/// Everything one inbound request contributes: its query mapping and the
/// WordPress origin it should be proxied to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub upstream_base: String,
    pub params: QueryParams,
}

impl RequestContext {
    pub fn new(upstream_base: impl Into<String>, params: QueryParams) -> Self {
        Self {
            upstream_base: upstream_base.into(),
            params,
        }
    }

    pub fn wants_help(&self) -> bool {
        self.params.is_empty() || self.params.contains_key("help")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub body: String,
}

impl ProxyReply {
    fn ok(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(err: &ProxyError) -> Self {
        Self {
            status: err.status(),
            body: serde_json::to_string(&err.body()).unwrap_or_default(),
        }
    }
}

/// Tags every item with the content type of the endpoint it came from,
/// concatenates in input order and sorts newest first.
///
/// Bodies that are not JSON, or are neither an array nor an object,
/// contribute nothing. A single object (an id lookup) counts as one item.
pub fn merge_results(sources: Vec<(EndpointKind, String)>) -> Vec<Value> {
    let mut merged = Vec::new();
    for (kind, body) in sources {
        let items = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(items)) => items,
            Ok(item @ Value::Object(_)) => vec![item],
            Ok(_) => continue,
            Err(e) => {
                log::warn!("{kind} response is not valid JSON, skipping: {e}");
                continue;
            }
        };
        let tag = kind.content_type().map(|c| c.as_str());
        merged.extend(items.into_iter().map(|mut item| {
            if let (Some(tag), Some(obj)) = (tag, item.as_object_mut()) {
                obj.insert(ContentType::FIELD.to_string(), Value::from(tag));
            }
            item
        }));
    }
    // stable: equal timestamps keep posts before pages
    merged.sort_by_cached_key(|item| Reverse(effective_timestamp(item)));
    merged
}

pub struct SearchAggregator {
    transport: Arc<dyn Transport>,
}

impl SearchAggregator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Answers one inbound query. Never fails: errors become a JSON error body.
    pub async fn handle_request(&self, ctx: &RequestContext) -> ProxyReply {
        if ctx.wants_help() {
            return ProxyReply::ok(to_pretty_json(&help_document(&ctx.upstream_base)));
        }
        match self.search(ctx).await {
            Ok(body) => ProxyReply::ok(body),
            Err(e) => {
                log::warn!("search failed: {e}");
                ProxyReply::error(&e)
            }
        }
    }

    pub async fn search(&self, ctx: &RequestContext) -> Result<String> {
        let request = SearchRequest::from_params(&ctx.params)?;
        let targets = request.targets(&ctx.upstream_base);
        log::debug!("endpoint={} targets={}", request.endpoint, targets.len());

        match request.endpoint {
            EndpointKind::All => self
                .fetch_all(&targets)
                .await
                .map_err(|e| ProxyError::GlobalSearch(Box::new(e))),
            EndpointKind::Posts | EndpointKind::Pages => {
                let target = targets
                    .first()
                    .ok_or_else(|| ProxyError::InvalidEndpoint(request.endpoint.to_string()))?;
                self.transport.get(&target.full_url).await
            }
        }
    }

    /// Fetches every target concurrently. The first failure in target order
    /// aborts the whole search.
    async fn fetch_all(&self, targets: &[UpstreamTarget]) -> Result<String> {
        let fetches = targets.iter().map(|target| async move {
            let body = self.transport.get(&target.full_url).await;
            (target.kind, body)
        });
        let outcomes = futures::future::join_all(fetches).await;

        let mut sources = Vec::with_capacity(outcomes.len());
        for (kind, outcome) in outcomes {
            sources.push((kind, outcome?));
        }

        Ok(Value::Array(merge_results(sources)).to_string())
    }
}
