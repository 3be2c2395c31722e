//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation,
//! route matching, and dispatching to the relay operations.

use crate::config::AppState;
use crate::handler::{landing, relay};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{HeaderMap, Method, Request, Response};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// The fixed set of relay endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Login,
    Headline,
    Headlines,
    Article,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Self::Index),
            "/api/login" => Some(Self::Login),
            "/api/news/headline" => Some(Self::Headline),
            "/api/news/headlines" => Some(Self::Headlines),
            "/api/news/article" => Some(Self::Article),
            _ => None,
        }
    }

    /// Methods answered on this route, in `Allow` header form
    pub const fn allow(self) -> &'static str {
        match self {
            Self::Index => "GET, HEAD, OPTIONS",
            Self::Login => "POST, OPTIONS",
            Self::Headline | Self::Headlines | Self::Article => "GET, OPTIONS",
        }
    }

    fn accepts(self, method: &Method) -> bool {
        match self {
            Self::Index => *method == Method::GET || *method == Method::HEAD,
            Self::Login => *method == Method::POST,
            Self::Headline | Self::Headlines | Self::Article => *method == Method::GET,
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Generic over the body so the same path serves hyper connections and tests.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let logging = &state.config.logging;

    let mut entry = logging.access_log.then(|| {
        AccessLogEntry::start(
            &peer_addr,
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        )
    });
    logger::log_headers(req.headers(), logging.show_headers);

    let mut response = route_request(req, &state).await;
    if state.config.http.enable_cors {
        response = http::with_cors(response);
    }

    if let Some(entry) = entry.as_mut() {
        let size = response.body().size_hint().exact().unwrap_or(0);
        entry.finish(
            response.status().as_u16(),
            usize::try_from(size).unwrap_or(usize::MAX),
            started.elapsed(),
        );
        logger::log_access(entry, &logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let method = &parts.method;
    let path = parts.uri.path();

    // 0. Health check endpoints, never touch upstream
    let health = &state.config.routes.health;
    if health.enabled
        && (path == health.liveness_path || path == health.readiness_path)
        && (*method == Method::GET || *method == Method::HEAD)
    {
        return http::build_health_response("ok");
    }

    // 1. Fixed relay routes
    let Some(route) = Route::from_path(path) else {
        logger::log_debug(&format!("No route for {method} {path}"));
        return http::build_404_response();
    };

    if *method == Method::OPTIONS {
        return http::build_options_response(route.allow(), state.config.http.enable_cors);
    }

    if !route.accepts(method) {
        logger::log_warning(&format!("Method not allowed: {method} {path}"));
        return http::build_405_response(route.allow());
    }

    // 2. Body size
    if let Some(resp) = check_body_size(&parts.headers, state.config.http.max_body_size) {
        return resp;
    }

    // 3. Dispatch
    match route {
        Route::Index => landing::serve(state, *method == Method::HEAD).await,
        Route::Login => relay::login(body, state).await,
        Route::Headline => relay::headline(&parts.headers, state).await,
        Route::Headlines => relay::headlines(&parts.headers, state).await,
        Route::Article => relay::article(&parts.headers, parts.uri.query(), state).await,
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get(hyper::header::CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::handler::testing::{unreachable_url, MockUpstream};
    use http_body_util::BodyExt;
    use hyper::header::{ALLOW, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
    use hyper::StatusCode;
    use serde_json::{json, Value};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn state_for(base_url: &str) -> Arc<AppState> {
        Arc::new(AppState::new(test_config(base_url)).unwrap())
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn send(req: Request<Full<Bytes>>, state: &Arc<AppState>) -> (StatusCode, Value) {
        let response = handle_request(req, Arc::clone(state), peer()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_token_never_reaches_upstream() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"headline":"x"}"#).await;
        let state = state_for(&upstream.base_url());

        for uri in [
            "/api/news/headline",
            "/api/news/headlines",
            "/api/news/article?url=http://x.com/a",
        ] {
            let (status, body) = send(get(uri, None), &state).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, json!({"error": "No token provided"}));
        }
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_article_requires_url() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"title":"A"}"#).await;
        let state = state_for(&upstream.base_url());

        for uri in ["/api/news/article", "/api/news/article?url=", "/api/news/article?page=2"] {
            let (status, body) = send(get(uri, Some("Bearer t1")), &state).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, json!({"error": "URL parameter is required"}));
        }
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_article_relayed() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"title":"A"}"#).await;
        let state = state_for(&upstream.base_url());

        let req = get("/api/news/article?url=http%3A%2F%2Fx.com%2Fa", Some("Bearer t1"));
        let (status, body) = send(req, &state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"title": "A"}));

        let seen = upstream.last_request().unwrap();
        assert_eq!(seen.method, Method::GET);
        assert_eq!(seen.path, "/api/news/khaleej-times/article");
        assert_eq!(seen.query_url.as_deref(), Some("http://x.com/a"));
        assert_eq!(seen.authorization.as_deref(), Some("Bearer t1"));
    }

    #[tokio::test]
    async fn test_headlines_status_and_body_passthrough() {
        let upstream =
            MockUpstream::start(StatusCode::FORBIDDEN, r#"{"error":"Invalid or expired token"}"#)
                .await;
        let state = state_for(&upstream.base_url());

        let (status, body) = send(get("/api/news/headlines", Some("Bearer old")), &state).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"error": "Invalid or expired token"}));

        let seen = upstream.last_request().unwrap();
        assert_eq!(seen.path, "/api/news/khaleej-times/headlines");
        assert_eq!(seen.authorization.as_deref(), Some("Bearer old"));
    }

    #[tokio::test]
    async fn test_headline_body_bytes_unchanged() {
        let raw = r#"{"headline":{"title":"T","url":"http://x.com/t","n":[1,2.5,null]}}"#;
        let upstream = MockUpstream::start(StatusCode::OK, raw).await;
        let state = state_for(&upstream.base_url());

        let response = handle_request(get("/api/news/headline", Some("Bearer t1")), state, peer())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], raw.as_bytes());
        assert_eq!(upstream.last_request().unwrap().path, "/api/news/khaleej-times/headline");
    }

    #[tokio::test]
    async fn test_login_forwards_body() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"token":"abc"}"#).await;
        let state = state_for(&upstream.base_url());

        let (status, body) = send(post("/api/login", r#"{"user":"u","pass":"p"}"#), &state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"token": "abc"}));

        let seen = upstream.last_request().unwrap();
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.path, "/api/login");
        assert_eq!(seen.content_type.as_deref(), Some("application/json"));
        assert_eq!(seen.authorization, None);
        let sent: Value = serde_json::from_slice(&seen.body).unwrap();
        assert_eq!(sent, json!({"user": "u", "pass": "p"}));
    }

    #[tokio::test]
    async fn test_login_invalid_json_is_500_without_upstream() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"token":"abc"}"#).await;
        let state = state_for(&upstream.base_url());

        let (status, body) = send(post("/api/login", "user=u&pass=p"), &state).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_upstream_down_is_500() {
        let state = state_for(&unreachable_url().await);

        let requests = vec![
            get("/api/news/headline", Some("Bearer t1")),
            get("/api/news/headlines", Some("Bearer t1")),
            get("/api/news/article?url=http://x.com/a", Some("Bearer t1")),
            post("/api/login", r#"{"user":"u","pass":"p"}"#),
        ];
        for req in requests {
            let (status, body) = send(req, &state).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            let error = body["error"].as_str().unwrap();
            assert!(!error.is_empty());
        }
    }

    #[tokio::test]
    async fn test_non_json_upstream_is_500() {
        let upstream = MockUpstream::start(StatusCode::BAD_GATEWAY, "<html>oops</html>").await;
        let state = state_for(&upstream.base_url());

        let (status, body) = send(get("/api/news/headline", Some("Bearer t1")), &state).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
        assert_eq!(upstream.hits(), 1);
    }

    #[tokio::test]
    async fn test_unknown_path_and_wrong_method() {
        let state = state_for(&unreachable_url().await);

        let (status, body) = send(get("/api/news/sports", Some("Bearer t1")), &state).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not Found"}));

        let response = handle_request(get("/api/login", None), Arc::clone(&state), peer())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST, OPTIONS");

        let (status, _) = send(post("/api/news/headline", "{}"), &state).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_options_and_health() {
        let state = state_for(&unreachable_url().await);

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/news/article")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle_request(req, Arc::clone(&state), peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ALLOW], "GET, OPTIONS");

        let (status, body) = send(get("/healthz", None), &state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        let (status, _) = send(get("/readyz", None), &state).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"token":"abc"}"#).await;
        let state = state_for(&upstream.base_url());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header(CONTENT_LENGTH, "4096")
            .body(Full::new(Bytes::from(vec![b' '; 4096])))
            .unwrap();
        let (status, body) = send(req, &state).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "Payload Too Large"}));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_without_content_length_rejected() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"token":"abc"}"#).await;
        let state = state_for(&upstream.base_url());

        let payload = format!(r#"{{"user":"{}","pass":"p"}}"#, "u".repeat(4096));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(payload)))
            .unwrap();
        assert!(req.headers().get(CONTENT_LENGTH).is_none());

        let (status, body) = send(req, &state).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "Payload Too Large"}));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn test_cors_applied_to_relayed_responses() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"headline":"x"}"#).await;
        let mut cfg = test_config(&upstream.base_url());
        cfg.http.enable_cors = true;
        let state = Arc::new(AppState::new(cfg).unwrap());

        let req = get("/api/news/headline", Some("Bearer t1"));
        let response = handle_request(req, Arc::clone(&state), peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

        let req = get("/api/news/headline", None);
        let response = handle_request(req, Arc::clone(&state), peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

        let plain = state_for(&upstream.base_url());
        let req = get("/api/news/headline", Some("Bearer t1"));
        let response = handle_request(req, plain, peer()).await.unwrap();
        assert!(response.headers().get("Access-Control-Allow-Origin").is_none());
    }

    #[tokio::test]
    async fn test_landing_page() {
        let state = state_for(&unreachable_url().await);

        let response = handle_request(get("/", None), Arc::clone(&state), peer())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle_request(head, state, peer()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_route_table() {
        assert_eq!(Route::from_path("/"), Some(Route::Index));
        assert_eq!(Route::from_path("/api/news/article"), Some(Route::Article));
        assert_eq!(Route::from_path("/api/news/article/"), None);
        assert!(Route::Login.accepts(&Method::POST));
        assert!(!Route::Headline.accepts(&Method::HEAD));
        assert!(Route::Index.accepts(&Method::HEAD));
    }
}
