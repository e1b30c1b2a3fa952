//! TCP listener
//!
//! Accepts connections and runs one session task per client next to the
//! `ChatServer` actor. On shutdown the open sessions get a bounded window
//! to deliver their last messages and close.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::{ChatServer, ServerCommand};

/// How long shutdown waits for sessions to flush and close
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve clients from `listener` until `shutdown` resolves
///
/// Returns once the actor has stopped and every session task has ended (or
/// been aborted after `SESSION_DRAIN_TIMEOUT`). Errors only if the actor
/// stopped on a fatal condition.
pub async fn serve<F>(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let mut server = tokio::spawn(ChatServer::new((*config).clone(), cmd_rx).run());
    let mut sessions = JoinSet::new();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("New connection from {}", peer);
                    let cmd_tx = cmd_tx.clone();
                    let config = Arc::clone(&config);

                    sessions.spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, cmd_tx, config).await {
                                error!("Connection handler error: {}", e);
                            }
                        }
                        .instrument(info_span!("conn", %peer)),
                    );
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            // Reap finished sessions
            Some(_) = sessions.join_next() => {}
            result = &mut server => {
                // The actor only stops on its own for fatal errors
                break actor_result(result);
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                let _ = cmd_tx.send(ServerCommand::Shutdown).await;
                break actor_result((&mut server).await);
            }
        }
    };

    drop(listener);
    drain_sessions(&mut sessions).await;
    result
}

fn actor_result(joined: Result<Result<(), AppError>, JoinError>) -> Result<(), AppError> {
    joined?
}

/// Wait for the remaining sessions, aborting them past the deadline
async fn drain_sessions(sessions: &mut JoinSet<()>) {
    if sessions.is_empty() {
        return;
    }
    info!("Waiting for {} sessions to close", sessions.len());

    let drained = tokio::time::timeout(SESSION_DRAIN_TIMEOUT, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("{} sessions still open, aborting them", sessions.len());
        sessions.shutdown().await;
    }
}
