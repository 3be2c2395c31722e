//! Upstream module
//!
//! Talks to the agent service that owns authentication and news data.

mod client;
mod error;

pub use client::{UpstreamClient, UpstreamResponse};
pub use error::RelayError;

/// Upstream endpoints, relative to the configured base URL
pub mod paths {
    pub const LOGIN: &str = "/api/login";
    pub const HEADLINE: &str = "/api/news/khaleej-times/headline";
    pub const HEADLINES: &str = "/api/news/khaleej-times/headlines";
    pub const ARTICLE: &str = "/api/news/khaleej-times/article";
}
