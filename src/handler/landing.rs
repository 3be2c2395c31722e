//! Landing page served at `/`

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::config::AppState;
use crate::http;
use crate::logger;

/// Built-in page: login form plus headline, headlines and article viewers
const BUILTIN_PAGE: &str = include_str!("../../assets/index.html");

/// Render the landing page
///
/// A configured `routes.landing_page` file is re-read on every request so it
/// can be edited without a restart; if it cannot be read the built-in page is
/// served instead.
pub async fn serve(state: &AppState, is_head: bool) -> Response<Full<Bytes>> {
    let html = match &state.config.routes.landing_page {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to read landing page '{path}': {e}, serving built-in page"
                ));
                BUILTIN_PAGE.to_string()
            }
        },
        None => BUILTIN_PAGE.to_string(),
    };

    http::build_html_response(html, is_head)
}
