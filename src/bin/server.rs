//! Offline-resilience control server.
//!
//! Accepts one request line per connection and answers with one response.
//! Pending writes are replayed automatically when the server is told it is
//! back online.

use clap::Parser;
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use offline_resilience::cli::ServerArgs;
use offline_resilience::{ControlService, OfflineResult};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ServerArgs::parse();
    let service = ControlService::new(args.cache_config(), args.queue_config(), !args.offline);
    let auto_sync = service.spawn_auto_sync();
    let sweeper = service.cache().spawn_sweeper();

    let addr = args.endpoint.addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        max_capacity = ?service.cache().config().get_max_capacity(),
        online = service.monitor().get_is_online(),
        "control server listening"
    );

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let service = service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, service).await {
                            warn!(peer = %peer, error = %e, "connection error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            },
            _ = signal::ctrl_c() => {
                let stats = service.cache().stats();
                info!(
                    hits = stats.hits,
                    misses = stats.misses,
                    size = stats.size,
                    queued = service.queue().size(),
                    "shutting down"
                );
                break;
            }
        }
    }

    auto_sync.abort();
    sweeper.abort();
    Ok(())
}

/// Handle a single client connection.
async fn handle_connection(mut socket: TcpStream, service: ControlService) -> OfflineResult<()> {
    service.serve(&mut socket).await
}
