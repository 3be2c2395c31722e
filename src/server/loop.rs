// Server loop module
// Accepts connections until a shutdown signal arrives

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// Run the accept loop on `listener`
///
/// Once `shutdown` is notified the loop stops accepting, asks every open
/// connection to finish its current request, and waits up to
/// `performance.shutdown_timeout` seconds for them before aborting the rest.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    shutdown: Arc<Notify>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let mut connections = JoinSet::new();
    let (drain_tx, drain_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &mut connections,
                            &drain_rx,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            // Reap finished connection tasks
            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            () = shutdown.notified() => {
                logger::log_shutdown("Shutdown requested");
                break;
            }
        }
    }

    drop(listener);
    let _ = drain_tx.send(true);

    let in_flight = active_connections.load(Ordering::SeqCst);
    if in_flight == 0 {
        return;
    }
    logger::log_info(&format!("Waiting for {in_flight} connection(s) to finish"));

    let grace = Duration::from_secs(state.config.performance.shutdown_timeout);
    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        let left = active_connections.load(Ordering::SeqCst);
        logger::log_warning(&format!(
            "Shutdown grace period of {}s elapsed, aborting {left} connection(s)",
            grace.as_secs()
        ));
        connections.shutdown().await;
    } else {
        logger::log_info("All connections finished");
    }
}
