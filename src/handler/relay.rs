//! Relay operations
//!
//! Each operation makes at most one upstream call and hands back whatever the
//! upstream answered. Failures become `{"error": ...}` with the status from
//! [`RelayError::status`].

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::{HeaderMap, Response, StatusCode};
use serde_json::Value;
use std::error::Error as StdError;

use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::upstream::{paths, RelayError, UpstreamResponse};

/// `POST /api/login`: forward the JSON body, no credential needed
pub async fn login<B>(body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let result = async {
        let body = read_json_body(body, limit).await?;
        state.upstream.post_json(paths::LOGIN, &body).await
    }
    .await;

    into_response("login", result)
}

/// `GET /api/news/headline`
pub async fn headline(headers: &HeaderMap, state: &AppState) -> Response<Full<Bytes>> {
    let result = async {
        let token = authorization(headers)?;
        state.upstream.get_json(paths::HEADLINE, token, &[]).await
    }
    .await;

    into_response("headline", result)
}

/// `GET /api/news/headlines`
pub async fn headlines(headers: &HeaderMap, state: &AppState) -> Response<Full<Bytes>> {
    let result = async {
        let token = authorization(headers)?;
        state.upstream.get_json(paths::HEADLINES, token, &[]).await
    }
    .await;

    into_response("headlines", result)
}

/// `GET /api/news/article?url=...`
///
/// The credential is checked before the `url` parameter.
pub async fn article(
    headers: &HeaderMap,
    query: Option<&str>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let result = async {
        let token = authorization(headers)?;
        let url = query_param(query, "url")
            .filter(|u| !u.is_empty())
            .ok_or(RelayError::MissingUrl)?;
        state
            .upstream
            .get_json(paths::ARTICLE, token, &[("url", url.as_str())])
            .await
    }
    .await;

    into_response("article", result)
}

/// The caller's `Authorization` header, forwarded as-is; empty counts as absent
fn authorization(headers: &HeaderMap) -> Result<&HeaderValue, RelayError> {
    headers
        .get(AUTHORIZATION)
        .filter(|v| !v.is_empty())
        .ok_or(RelayError::MissingToken)
}

/// Read at most `limit` bytes of body and parse them as JSON
///
/// The limit holds whether or not the client sent `Content-Length`.
async fn read_json_body<B>(body: B, limit: usize) -> Result<Value, RelayError>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                RelayError::PayloadTooLarge
            } else {
                RelayError::RequestBody(e.to_string())
            }
        })?
        .to_bytes();
    serde_json::from_slice(&bytes).map_err(RelayError::RequestJson)
}

/// First value of `name` in a form-encoded query string
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| form_decode(key) == name)
        .map(|(_, value)| form_decode(value))
}

fn form_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

fn into_response(
    operation: &str,
    result: Result<UpstreamResponse, RelayError>,
) -> Response<Full<Bytes>> {
    match result {
        Ok(UpstreamResponse { status, body }) => http::build_json_response(status, &body),
        Err(err) => {
            let status = err.status();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                logger::log_error(&format!("Relay {operation} failed: {err}"));
            } else {
                logger::log_debug(&format!("Relay {operation} rejected: {err}"));
            }
            http::build_error_response(status, &err.to_string())
        }
    }
}
