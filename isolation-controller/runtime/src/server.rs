use anyhow::Result;
use http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown, service::TowerToHyperService};
use std::net::SocketAddr;
use tokio::{net::TcpListener, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Serves HTTP/1 connections on `addr` until `drain` is signaled.
///
/// On shutdown no new connections are accepted and open connections get
/// `graceful_timeout` to finish their in-flight requests.
#[instrument(skip_all, fields(port = %addr.port()))]
pub async fn serve<S, B>(
    addr: SocketAddr,
    svc: S,
    graceful_timeout: Duration,
    drain: drain::Watch,
) -> Result<()>
where
    S: tower::Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let listener = TcpListener::bind(addr).await?;
    let http = hyper::server::conn::http1::Builder::new();
    let graceful = GracefulShutdown::new();
    info!(%addr, "HTTP API server listening");

    let signaled = drain.signaled();
    tokio::pin!(signaled);
    loop {
        tokio::select! {
            res = listener.accept() => {
                let (io, client) = match res {
                    Ok(conn) => conn,
                    Err(error) => {
                        warn!(%error, "Failed to accept connection");
                        continue;
                    }
                };
                debug!(%client, "Accepted connection");
                let service = TowerToHyperService::new(svc.clone());
                let conn = graceful.watch(http.serve_connection(TokioIo::new(io), service));
                tokio::spawn(async move {
                    if let Err(error) = conn.await {
                        debug!(%error, %client, "Connection failed");
                    }
                });
            }

            handle = &mut signaled => {
                info!("Draining HTTP API connections");
                let drained = tokio::time::timeout(graceful_timeout, graceful.shutdown());
                if handle.release_after(drained).await.is_err() {
                    warn!(timeout = ?graceful_timeout, "Connections did not drain in time");
                }
                return Ok(());
            }
        }
    }
}
