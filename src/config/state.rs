// Application state module
// Immutable per-process state shared by every connection

use super::types::Config;
use crate::upstream::{RelayError, UpstreamClient};

/// Application state
///
/// Built once at startup and shared behind an `Arc`; nothing in it changes
/// while the server runs, so request handling never takes a lock.
pub struct AppState {
    pub config: Config,
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, RelayError> {
        let upstream = UpstreamClient::new(&config.upstream, &config.http.user_agent)?;
        Ok(Self { config, upstream })
    }
}
