//! Background tasks: the accept loop and the single exchange worker.
//!
//! The worker owns the live connection and performs one exchange at a time, so request and
//! response lines of different operations can never interleave on the wire.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::LinkConfig;
use super::pending::Resolver;
use super::protocol;
use super::session::Session;
use super::{LinkError, LinkResult, ProtocolState};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(250);

// ============================================================================
// Connection
// ============================================================================

/// One accepted console connection.
#[derive(Debug)]
pub(crate) struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer: write,
            peer,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn send(&mut self, payload: &str) -> LinkResult<()> {
        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive_line(&mut self) -> LinkResult<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(LinkError::ConnectionClosed);
        }
        Ok(protocol::trim_line_ending(&line).to_string())
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug)]
pub(crate) enum Job {
    Attach(Connection),
    Select {
        names: Vec<String>,
        reply: Resolver<Vec<bool>>,
    },
    Ask {
        question: String,
        true_label: String,
        false_label: String,
        reply: Resolver<bool>,
    },
    Publish {
        payload: String,
        reply: Resolver<()>,
    },
}

async fn select_groups(connection: &mut Connection, names: &[String]) -> LinkResult<Vec<bool>> {
    connection.send(&protocol::encode_selection_request(names)).await?;
    let line = connection.receive_line().await?;
    Ok(protocol::decode_selection_response(&line, names.len())?)
}

async fn ask(connection: &mut Connection, question: &str, true_label: &str, false_label: &str) -> LinkResult<bool> {
    connection
        .send(&protocol::encode_question(question, true_label, false_label))
        .await?;
    let line = connection.receive_line().await?;
    Ok(protocol::decode_answer(&line)?)
}

async fn timed<T>(limit: Option<Duration>, exchange: impl Future<Output = LinkResult<T>>) -> LinkResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or(Err(LinkError::Timeout(limit))),
        None => exchange.await,
    }
}

/// Apply the result of an exchange to the session before the caller can observe it.
fn settle<T>(
    session: &Session,
    epoch: u64,
    connection: &mut Option<Connection>,
    result: &LinkResult<T>,
    next: ProtocolState,
    exchange: &'static str,
) {
    match result {
        Ok(_) => {
            debug!(exchange, state = %next, "exchange complete");
            session.finish(epoch, Some(next));
        }
        Err(err) if err.loses_connection() => {
            if let Some(lost) = connection.take() {
                warn!(exchange, peer = %lost.peer(), error = %err, "operator console connection lost");
            }
            session.lose_connection(epoch);
        }
        Err(err) => {
            warn!(exchange, error = %err, "exchange failed");
            session.finish(epoch, None);
        }
    }
}

/// Process jobs until every sender is gone.
pub(crate) async fn run(session: Arc<Session>, epoch: u64, mut jobs: mpsc::UnboundedReceiver<Job>, config: LinkConfig) {
    let mut connection: Option<Connection> = None;

    while let Some(job) = jobs.recv().await {
        match job {
            Job::Attach(attached) => {
                debug!(peer = %attached.peer(), "worker attached to console");
                connection = Some(attached);
            }
            Job::Select { names, reply } => {
                let result = match connection.as_mut() {
                    Some(c) => timed(config.selection_timeout, select_groups(c, &names)).await,
                    None => Err(LinkError::NoConnection),
                };
                settle(&session, epoch, &mut connection, &result, ProtocolState::Running, "selection");
                reply.resolve(result);
            }
            Job::Ask {
                question,
                true_label,
                false_label,
                reply,
            } => {
                let result = match connection.as_mut() {
                    Some(c) => timed(config.exchange_timeout, ask(c, &question, &true_label, &false_label)).await,
                    None => Err(LinkError::NoConnection),
                };
                settle(&session, epoch, &mut connection, &result, ProtocolState::Running, "question");
                reply.resolve(result);
            }
            Job::Publish { payload, reply } => {
                let result = match connection.as_mut() {
                    Some(c) => timed(config.exchange_timeout, c.send(&payload)).await,
                    None => Err(LinkError::NoConnection),
                };
                settle(&session, epoch, &mut connection, &result, ProtocolState::Holding, "results");
                reply.resolve(result);
            }
        }
    }
}

/// Accept one console at a time; after it is lost, accept the next.
pub(crate) async fn accept_loop(listener: TcpListener, session: Arc<Session>) {
    loop {
        session.disconnected().await;

        match listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%peer, error = %err, "could not disable Nagle");
                }
                if session.attach(Connection::new(stream, peer)).is_err() {
                    warn!("link worker stopped; no longer accepting consoles");
                    return;
                }
                info!(%peer, "operator console connected");
            }
            Err(err) => {
                warn!(error = %err, "failed to accept console connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
