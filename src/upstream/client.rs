//! Upstream agent client
//!
//! One synchronous-looking call per relay request: build the outbound request,
//! await the response, read the whole body and parse it as JSON. No retries,
//! no relay-level timeout.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;

use super::error::RelayError;
use crate::config::UpstreamConfig;
use crate::logger;

/// Status and JSON payload returned by the upstream, relayed untouched
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub struct UpstreamClient {
    base_url: String,
    user_agent: HeaderValue,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, user_agent: &str) -> Result<Self, RelayError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let uri = base_url
            .parse::<Uri>()
            .map_err(|e| RelayError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        if uri.scheme_str() != Some("http") || uri.host().is_none() {
            return Err(RelayError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: "expected an absolute http:// URL".to_string(),
            });
        }

        Ok(Self {
            base_url,
            user_agent: HeaderValue::from_str(user_agent)?,
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with the caller's `Authorization` value and optional query pairs
    pub async fn get_json(
        &self,
        path: &str,
        authorization: &HeaderValue,
        query: &[(&str, &str)],
    ) -> Result<UpstreamResponse, RelayError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.build_uri(path, query)?)
            .header(AUTHORIZATION, authorization.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.clone())
            .body(Full::new(Bytes::new()))?;

        self.send(request).await
    }

    /// POST `path` with `body` serialized as JSON
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<UpstreamResponse, RelayError> {
        let payload = serde_json::to_vec(body).map_err(RelayError::RequestJson)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.build_uri(path, &[])?)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.clone())
            .body(Full::new(Bytes::from(payload)))?;

        self.send(request).await
    }

    fn build_uri(&self, path: &str, query: &[(&str, &str)]) -> Result<Uri, RelayError> {
        let mut target = format!("{}{path}", self.base_url);
        for (i, (key, value)) in query.iter().enumerate() {
            target.push(if i == 0 { '?' } else { '&' });
            target.push_str(&urlencoding::encode(key));
            target.push('=');
            target.push_str(&urlencoding::encode(value));
        }
        Ok(target.parse::<Uri>()?)
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<UpstreamResponse, RelayError> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = match self.client.request(request).await {
            Ok(r) => r,
            Err(e) => {
                let err = RelayError::from(e);
                logger::log_error(&format!("[Upstream] {method} {uri} failed: {err}"));
                return Err(err);
            }
        };

        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        logger::log_debug(&format!(
            "[Upstream] {method} {uri} -> {} ({} bytes)",
            status.as_u16(),
            bytes.len()
        ));

        let body = serde_json::from_slice(&bytes).map_err(RelayError::Decode)?;
        Ok(UpstreamResponse { status, body })
    }
}
