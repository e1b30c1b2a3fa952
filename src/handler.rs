//! Connection handler
//!
//! Drives one client connection through its session states:
//! `AwaitingHandle → Active → Closed`. Lines are read with a `FramedRead`;
//! outbound messages go through a per-client queue drained by a writer task.
//! Every way out of the session ends in the same teardown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::LineCodec;
use crate::config::ServerConfig;
use crate::dispatch::Flow;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::server::ServerCommand;
use crate::types::ClientId;

/// How long teardown waits for queued messages to reach the peer
const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    AwaitingHandle,
    Active,
    Closed,
}

/// Handle a new connection
///
/// Works on any duplex byte stream (TCP in production, in-memory pipes in
/// tests). Returns an error only if the server actor was unavailable.
pub async fn handle_connection<S>(
    stream: S,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let client_id = ClientId::new();
    debug!("Session {} opened", client_id);

    let (reader, writer) = tokio::io::split(stream);
    let lines = FramedRead::new(reader, LineCodec::new(config.max_line_length));
    let mut sink = FramedWrite::new(writer, LineCodec::new(config.max_line_length));

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.outbox_capacity);

    // Write task (ServerMessage -> socket)
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                debug!("Send failed, ending write task: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = Session {
        client_id,
        lines,
        cmd_tx,
        msg_tx,
        write_task,
        writer_done: false,
        result: Ok(()),
    };

    let mut state = SessionState::AwaitingHandle;
    while state != SessionState::Closed {
        state = match state {
            SessionState::AwaitingHandle => session.negotiate().await,
            SessionState::Active => session.run().await,
            SessionState::Closed => SessionState::Closed,
        };
    }

    session.teardown().await
}

struct Session<S> {
    client_id: ClientId,
    lines: FramedRead<ReadHalf<S>, LineCodec>,
    cmd_tx: mpsc::Sender<ServerCommand>,
    msg_tx: mpsc::Sender<ServerMessage>,
    write_task: JoinHandle<()>,
    /// Write task already completed (socket write failed)
    writer_done: bool,
    result: Result<(), AppError>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Next input line, or None when the session must close
    ///
    /// This is the only place a session waits on its peer; no shared state
    /// is held here. Also returns None if the server stops or the writer
    /// fails.
    async fn next_line(&mut self) -> Option<String> {
        tokio::select! {
            frame = self.lines.next() => match frame {
                Some(Ok(line)) => Some(line),
                Some(Err(e)) => {
                    warn!("Read error for {}: {}", self.client_id, e);
                    None
                }
                None => {
                    debug!("Client {} closed the connection", self.client_id);
                    None
                }
            },
            _ = self.cmd_tx.closed() => {
                debug!("Server closed, ending session {}", self.client_id);
                None
            }
            _ = &mut self.write_task, if !self.writer_done => {
                self.writer_done = true;
                debug!("Write task ended for {}", self.client_id);
                None
            }
        }
    }

    /// Queue a message on this session's own outbound channel
    async fn send(&mut self, msg: ServerMessage) {
        let _ = self.msg_tx.send(msg).await;
    }

    /// AwaitingHandle: prompt until a handle is accepted
    async fn negotiate(&mut self) -> SessionState {
        loop {
            self.send(ServerMessage::Prompt).await;
            let Some(candidate) = self.next_line().await else {
                return SessionState::Closed;
            };

            let (respond_to, response) = oneshot::channel();
            let cmd = ServerCommand::Register {
                client_id: self.client_id,
                handle: candidate.trim().to_string(),
                sender: self.msg_tx.clone(),
                respond_to,
            };
            if self.cmd_tx.send(cmd).await.is_err() {
                self.result = Err(AppError::ChannelSend);
                return SessionState::Closed;
            }

            match response.await {
                Ok(Ok(())) => {
                    info!("Client {} joined as '{}'", self.client_id, candidate.trim());
                    return SessionState::Active;
                }
                Ok(Err(e)) => {
                    debug!("Handle rejected for {}: {}", self.client_id, e);
                    self.send(e.into()).await;
                }
                Err(_) => {
                    self.result = Err(AppError::ChannelSend);
                    return SessionState::Closed;
                }
            }
        }
    }

    /// Active: forward lines to the dispatcher until exit, EOF or error
    async fn run(&mut self) -> SessionState {
        while let Some(line) = self.next_line().await {
            let (respond_to, response) = oneshot::channel();
            let cmd = ServerCommand::Input {
                client_id: self.client_id,
                line,
                respond_to,
            };
            if self.cmd_tx.send(cmd).await.is_err() {
                break;
            }
            match response.await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) | Err(_) => break,
            }
        }
        SessionState::Closed
    }

    /// Closed: release shared state, then let the writer flush
    async fn teardown(self) -> Result<(), AppError> {
        let Session {
            client_id,
            cmd_tx,
            msg_tx,
            write_task,
            writer_done,
            result,
            ..
        } = self;

        // Idempotent on the server side, so always sent
        let _ = cmd_tx
            .send(ServerCommand::Disconnect { client_id })
            .await;
        drop(msg_tx);

        if !writer_done
            && tokio::time::timeout(WRITE_DRAIN_TIMEOUT, write_task)
                .await
                .is_err()
        {
            warn!("Write task for {} did not finish in time", client_id);
        }

        info!("Session {} closed", client_id);
        result
    }
}
