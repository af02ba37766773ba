//! Connection handles shared between the lobby and game sessions
//!
//! A `PlayerHandle` wraps one duplex byte stream. Incoming bytes are split into
//! lines by a background reader task and queued on a channel, so waiting for
//! the next line can be raced against other events without losing input.
//! Outgoing lines are written directly under a mutex and flushed immediately.
//! `shutdown` closes both directions: the writer is dropped and the reader
//! task is aborted, which releases the underlying stream.

use log::debug;
use std::fmt::Display;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

/// Lines buffered per connection before the reader task waits for the consumer
const LINE_BUFFER: usize = 64;

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Result of a bounded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Line(String),
    TimedOut,
    Closed,
}

struct Connection {
    id: u64,
    peer: String,
    /// `None` once the connection has been shut down
    writer: Mutex<Option<Writer>>,
    lines: Mutex<mpsc::Receiver<String>>,
    reader: JoinHandle<()>,
    session_start: Notify,
}

/// Cloneable handle to one player's connection
///
/// Clones refer to the same connection. Identity is the numeric id, never the
/// player's display name.
#[derive(Clone)]
pub struct PlayerHandle {
    conn: Arc<Connection>,
}

impl PlayerHandle {
    /// Wraps a reader/writer pair and starts the line reader task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(peer: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed);
        let peer = peer.into();
        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);

        let reader_peer = peer.clone();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim_end_matches('\r').to_string();
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Connection {} reached end of stream", reader_peer);
                        break;
                    }
                    Err(e) => {
                        debug!("Read error on {}: {}", reader_peer, e);
                        break;
                    }
                }
            }
        });

        Self {
            conn: Arc::new(Connection {
                id,
                peer,
                writer: Mutex::new(Some(Box::new(writer))),
                lines: Mutex::new(line_rx),
                reader: reader_task,
                session_start: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.conn.id
    }

    pub fn peer(&self) -> &str {
        &self.conn.peer
    }

    pub fn same_connection(&self, other: &PlayerHandle) -> bool {
        self.conn.id == other.conn.id
    }

    /// Writes one newline-terminated line and flushes it
    pub async fn send(&self, message: impl Display) -> io::Result<()> {
        let mut line = message.to_string();
        line.push('\n');

        let mut guard = self.conn.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already shut down",
            ));
        };
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }

    /// Sends a line, returning false if the player is unreachable
    pub async fn send_best_effort(&self, message: impl Display) -> bool {
        match self.send(message).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Send to {} failed: {}", self.conn.peer, e);
                false
            }
        }
    }

    /// Waits for the next line. `None` means the connection is gone.
    pub async fn recv_line(&self) -> Option<String> {
        self.conn.lines.lock().await.recv().await
    }

    pub async fn recv_line_timeout(&self, limit: Duration) -> Received {
        match tokio::time::timeout(limit, self.recv_line()).await {
            Ok(Some(line)) => Received::Line(line),
            Ok(None) => Received::Closed,
            Err(_) => Received::TimedOut,
        }
    }

    /// Tells whoever is reading lobby commands on this connection that a game
    /// session now owns it. The signal is stored if nobody is waiting yet.
    pub fn begin_session(&self) {
        self.conn.session_start.notify_one();
    }

    pub async fn session_started(&self) {
        self.conn.session_start.notified().await
    }

    /// Closes the connection in both directions. Later sends fail and
    /// pending reads see the connection as closed.
    pub async fn shutdown(&self) {
        self.conn.reader.abort();
        let writer = self.conn.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown of {} failed: {}", self.conn.peer, e);
            }
        }
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.conn.id)
            .field("peer", &self.conn.peer)
            .finish()
    }
}
