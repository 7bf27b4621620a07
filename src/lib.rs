//! CORS search proxy in front of a WordPress REST API.
//!
//! A GET query such as `?endpoint=all&search=wordpress` is turned into
//! upstream calls to `/wp-json/wp/v2/posts` and `/wp-json/wp/v2/pages`.
//! Single-kind searches pass the upstream body through untouched; `all`
//! searches fetch both kinds concurrently, tag each item with its
//! `content_type` and return them newest first.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod data_models;
pub mod error;
pub mod help;
pub mod transport;

pub use aggregator::{ProxyReply, RequestContext, SearchAggregator};
pub use config::Config;
pub use error::{ProxyError, Result};
pub use transport::{HttpTransport, Transport};
