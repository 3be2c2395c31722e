// Connection handling module
// Accepts a TCP connection and serves it on its own task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config;
use crate::handler;
use crate::logger;

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `tasks` - Set the connection task is spawned into, drained on shutdown
/// * `drain` - Flips to `true` when the server stops accepting
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<config::AppState>,
    conn_counter: &Arc<AtomicUsize>,
    tasks: &mut JoinSet<()>,
    drain: &watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    tasks.spawn(handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        drain.clone(),
    ));
}

/// Serve a single connection until the client is done or the server drains.
///
/// Only the request head is bounded by `read_timeout`. A request that is
/// waiting on the upstream is never cut off here; on drain the connection
/// finishes its current request and then closes.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<config::AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut drain: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let performance = &state.config.performance;

    let mut builder = http1::Builder::new();
    builder
        .keep_alive(performance.keep_alive)
        .timer(TokioTimer::new())
        .header_read_timeout(Duration::from_secs(performance.read_timeout));

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
            handler::handle_request(req, Arc::clone(&service_state), peer_addr)
        }),
    );
    tokio::pin!(conn);

    let mut draining = *drain.borrow();
    if draining {
        conn.as_mut().graceful_shutdown();
    }

    let result = loop {
        tokio::select! {
            res = conn.as_mut() => break res,
            _ = drain.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };

    if let Err(err) = result {
        logger::log_connection_error(&err);
    }

    conn_counter.fetch_sub(1, Ordering::SeqCst);
}
