//! Read-only HTTP view of the live configuration
#[cfg(test)]
mod http_test;

use std::convert::Infallible;
use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::info;
use warp::Filter;
use warp::Reply;

use crate::Error;
use crate::LiveConfig;
use crate::Result;

/// `GET /` returns the current snapshot as one JSON object
pub fn routes(
    live: LiveConfig,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(move || live.clone())
        .and_then(config_handler)
}

/// Serves [`routes`] on `addr` until `shutdown_signal` changes.
pub async fn start_server(
    addr: SocketAddr,
    live: LiveConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let (bound, server) = warp::serve(routes(live))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown_signal.changed().await;
        })
        .map_err(|e| Error::Fatal(format!("could not bind {addr}: {e}")))?;

    info!(%bound, "Listening for requests");
    server.await;
    info!("HTTP server stopped");
    Ok(())
}

async fn config_handler(live: LiveConfig) -> std::result::Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&*live.load()))
}
