//! Per-client streaming loop.

use super::multipart::{MultipartWriter, PART_CONTENT_TYPE};
use crate::bus::{FrameReceiver, SelectionReceiver, Switchboard};
use crate::metrics::MetricsRegistry;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// A write failure that was not a client disconnect.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("error writing to stream: {0}")]
    Write(#[source] io::Error),
}

/// Why a session stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away.
    ClientDisconnected,
    /// The server is shutting down.
    Shutdown,
    /// The camera feeds were torn down.
    FeedClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_sent: u64,
    pub end: SessionEnd,
}

/// Whether a write error means the peer has gone.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// Streams the active camera to one client.
///
/// The session subscribes when it is created, so any frame published after
/// [`StreamSession::new`] returns is delivered. On every iteration it
/// follows the current selection: a switch wakes the session even while it
/// waits on the old camera, and the next frame written comes from the new
/// one.
pub struct StreamSession {
    switchboard: Arc<Switchboard>,
    selection: SelectionReceiver,
    active: usize,
    frames: FrameReceiver,
    shutdown: CancellationToken,
    metrics: Arc<MetricsRegistry>,
    peer: Option<SocketAddr>,
}

impl StreamSession {
    /// Creates a session on the currently selected camera and subscribes to it.
    pub fn new(
        switchboard: Arc<Switchboard>,
        shutdown: CancellationToken,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let mut selection = switchboard.selector().watch();
        let active = selection.current();
        let frames = switchboard.subscribe(active);
        Self {
            switchboard,
            selection,
            active,
            frames,
            shutdown,
            metrics,
            peer: None,
        }
    }

    /// Remote address, for logging.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Camera the session is currently reading from.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Writes frames to `writer` until the client disconnects, the server
    /// shuts down, or a write fails.
    pub async fn run<W>(mut self, writer: W) -> Result<SessionSummary, SessionError>
    where
        W: AsyncWrite + Unpin,
    {
        let _open = OpenSession::new(Arc::clone(&self.metrics));
        let peer = self.peer.map(|p| p.to_string()).unwrap_or_default();
        let mut out = MultipartWriter::new(writer);

        let end = loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break SessionEnd::Shutdown,
                changed = self.selection.changed() => match changed {
                    Some(index) => {
                        if index != self.active {
                            tracing::debug!(peer = %peer, camera = index, "stream switched camera");
                            self.active = index;
                            self.frames = self.switchboard.subscribe(index);
                        }
                        continue;
                    }
                    None => break SessionEnd::FeedClosed,
                },
                frame = self.frames.next() => match frame {
                    Some(frame) => frame,
                    None => break SessionEnd::FeedClosed,
                },
            };

            if let Err(e) = out.write_part(PART_CONTENT_TYPE, frame.data()).await {
                if is_disconnect(&e) {
                    tracing::debug!(peer = %peer, "client disconnected");
                    break SessionEnd::ClientDisconnected;
                }
                tracing::error!(peer = %peer, error = %e, "error writing to stream");
                return Err(SessionError::Write(e));
            }
            tracing::trace!(
                peer = %peer,
                camera = frame.camera(),
                sequence = frame.sequence(),
                age_ms = frame.timestamp().elapsed().as_millis() as u64,
                "sent frame"
            );
        };

        if end != SessionEnd::ClientDisconnected {
            // Best effort; the client may already be gone.
            let _ = out.finish().await;
        }

        tracing::info!(peer = %peer, frames = out.parts_written(), "closing stream");
        Ok(SessionSummary {
            frames_sent: out.parts_written(),
            end,
        })
    }
}

/// Keeps the active-session gauge in step with the session's lifetime.
struct OpenSession(Arc<MetricsRegistry>);

impl OpenSession {
    fn new(metrics: Arc<MetricsRegistry>) -> Self {
        metrics.session_opened();
        Self(metrics)
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.0.session_closed();
    }
}
