use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{ProxyError, Result};

/// Raw inbound query-string mapping.
pub type QueryParams = HashMap<String, String>;

pub const DEFAULT_PER_PAGE: i64 = 9;
pub const MAX_PER_PAGE: i64 = 100;
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_STATUS: &str = "publish";

/// Statuses forwarded upstream; anything else is dropped.
pub const ALLOWED_STATUSES: [&str; 4] = ["publish", "draft", "private", "any"];

/// Query keys copied verbatim to the upstream request, in this order.
pub const PASSTHROUGH_PARAMS: [&str; 7] = [
    "orderby",
    "order",
    "author",
    "categories",
    "tags",
    "meta_key",
    "meta_value",
];

/// Used when an item carries neither `modified` nor `date`.
pub const EPOCH_SENTINEL: &str = "1970-01-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Posts,
    Pages,
    /// Both posts and pages, merged.
    All,
}

impl EndpointKind {
    pub const ALL_KINDS: [EndpointKind; 3] = [Self::Posts, Self::Pages, Self::All];

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "posts" => Ok(Self::Posts),
            "pages" => Ok(Self::Pages),
            "all" => Ok(Self::All),
            other => Err(ProxyError::InvalidEndpoint(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Pages => "pages",
            Self::All => "all",
        }
    }

    /// REST path under `/wp-json`. `All` has none of its own.
    pub fn base_path(&self) -> Option<&'static str> {
        match self {
            Self::Posts => Some("/wp/v2/posts"),
            Self::Pages => Some("/wp/v2/pages"),
            Self::All => None,
        }
    }

    /// Concrete kinds that must be fetched to answer this one.
    pub fn resolve(&self) -> &'static [EndpointKind] {
        match self {
            Self::Posts => &[Self::Posts],
            Self::Pages => &[Self::Pages],
            Self::All => &[Self::Posts, Self::Pages],
        }
    }

    /// Tag injected into merged results.
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Self::Posts => Some(ContentType::Post),
            Self::Pages => Some(ContentType::Page),
            Self::All => None,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Post,
    Page,
}

impl ContentType {
    pub const FIELD: &'static str = "content_type";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
        }
    }
}

/// One inbound search, after defaults and aliases have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub endpoint: EndpointKind,
    pub search: String,
    pub per_page: i64,
    pub page: i64,
    pub status: String,
    /// Accepted for compatibility; never forwarded.
    pub slug: String,
    pub id: String,
    pub extra: Vec<(String, String)>,
}

impl SearchRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        let endpoint = first_present(params, &["endpoint"]).unwrap_or(EndpointKind::Posts.name());
        let endpoint = EndpointKind::parse(endpoint)?;

        let per_page = first_present(params, &["per_page", "limit"])
            .map(parse_int)
            .unwrap_or(DEFAULT_PER_PAGE);
        let page = first_present(params, &["page", "paged"])
            .map(parse_int)
            .unwrap_or(DEFAULT_PAGE);

        let extra = PASSTHROUGH_PARAMS
            .iter()
            .filter_map(|key| {
                params
                    .get(*key)
                    .filter(|v| !is_blank(v))
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect();

        Ok(Self {
            endpoint,
            search: first_present(params, &["search", "s"])
                .unwrap_or_default()
                .to_string(),
            per_page,
            page,
            status: first_present(params, &["status"])
                .unwrap_or(DEFAULT_STATUS)
                .to_string(),
            slug: first_present(params, &["slug"]).unwrap_or_default().to_string(),
            id: first_present(params, &["id"]).unwrap_or_default().to_string(),
            extra,
        })
    }

    /// Upstream query string, without the leading `?`. Empty when nothing applies.
    pub fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if !is_blank(&self.search) {
            serializer.append_pair("search", &self.search);
        }
        if (1..=MAX_PER_PAGE).contains(&self.per_page) {
            serializer.append_pair("per_page", &self.per_page.to_string());
        }
        if self.page > 0 {
            serializer.append_pair("page", &self.page.to_string());
        }
        if ALLOWED_STATUSES.contains(&self.status.as_str()) {
            serializer.append_pair("status", &self.status);
        }
        for (key, value) in &self.extra {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Builds one target per concrete kind this request resolves to.
    pub fn targets(&self, upstream_base: &str) -> Vec<UpstreamTarget> {
        let query = self.query_string();
        self.endpoint
            .resolve()
            .iter()
            .filter_map(|kind| {
                let base_path = kind.base_path()?;
                let mut full_url = format!(
                    "{}/wp-json{}",
                    upstream_base.trim_end_matches('/'),
                    base_path
                );
                if !is_blank(&self.id) {
                    full_url.push('/');
                    full_url.push_str(&self.id);
                }
                if !query.is_empty() {
                    full_url.push('?');
                    full_url.push_str(&query);
                }
                Some(UpstreamTarget {
                    kind: *kind,
                    full_url,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub kind: EndpointKind,
    pub full_url: String,
}

/// Values the proxy treats as absent: the empty string and a lone `"0"`.
pub fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "0"
}

/// Returns the value of the first key present, even when that value is empty.
fn first_present<'a>(params: &'a QueryParams, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .map(String::as_str)
}

/// Lenient integer parsing: optional sign and leading digits, `0` otherwise.
pub fn parse_int(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative { -value } else { value }
}

/// Parses the date formats WordPress emits. Zone-less values are read as UTC.
pub fn parse_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// `modified`, else `date`, else the epoch. Unparseable values count as the epoch.
pub fn effective_timestamp(item: &Value) -> i64 {
    let field = |name: &str| item.get(name).filter(|v| !v.is_null());
    let raw = match field("modified").or_else(|| field("date")) {
        Some(value) => value.as_str(),
        None => Some(EPOCH_SENTINEL),
    };
    raw.and_then(parse_date).unwrap_or(0)
}
