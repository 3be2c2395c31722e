//! Relay error type
//!
//! Every failure on the path client -> relay -> upstream -> relay ends up as one
//! of these variants. The handler boundary turns them into the
//! `{"error": "<message>"}` envelope with [`RelayError::status`].

use hyper::StatusCode;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Authenticated route called without an `Authorization` header
    #[error("No token provided")]
    MissingToken,

    /// Article route called without the `url` query parameter
    #[error("URL parameter is required")]
    MissingUrl,

    #[error("Invalid upstream base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] hyper::header::InvalidHeaderValue),

    /// Inbound body exceeded `http.max_body_size`
    #[error("Payload Too Large")]
    PayloadTooLarge,

    /// Inbound body could not be read
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    /// Inbound body is not JSON
    #[error("{0}")]
    RequestJson(serde_json::Error),

    #[error("{0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("{0}")]
    Request(#[from] hyper::http::Error),

    /// Connect or send failure talking to upstream
    #[error("{}", with_sources(.0))]
    Transport(#[from] hyper_util::client::legacy::Error),

    /// Upstream body could not be read
    #[error("{0}")]
    ResponseBody(#[from] hyper::Error),

    /// Upstream body is not JSON
    #[error("{0}")]
    Decode(serde_json::Error),
}

impl RelayError {
    /// Status code reported to the client
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::MissingUrl => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Render an error followed by its source chain, `outer: inner: root`
fn with_sources(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
