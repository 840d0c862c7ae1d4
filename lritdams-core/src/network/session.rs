//! One subscriber connection.
//!
//! A session never pulls work. The distributor pushes frames into it
//! with [`ClientSession::send`]; the session's own task only watches
//! the read side so a peer hang-up is noticed while the feed is quiet.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::codec::DamsNtCodec;
use crate::error::{GatewayError, SessionError};
use crate::frame::DamsNtFrame;
use crate::network::Registry;

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

pub struct ClientSession {
    id: u64,
    peer: SocketAddr,
    writer: tokio::sync::Mutex<Option<FramedWrite<BoxedWriter, DamsNtCodec>>>,
    /// Taken by the idle task on `start`.
    reader: Mutex<Option<BoxedReader>>,
    cancel: CancellationToken,
}

impl ClientSession {
    /// A session over an arbitrary writer with no read side.
    pub fn new(id: u64, peer: SocketAddr, writer: BoxedWriter) -> Self {
        Self {
            id,
            peer,
            writer: tokio::sync::Mutex::new(Some(FramedWrite::new(writer, DamsNtCodec::default()))),
            reader: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a read side for the idle task to watch.
    pub fn with_reader(self, reader: BoxedReader) -> Self {
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);
        self
    }

    /// The stock session over an accepted TCP connection.
    pub fn from_tcp(id: u64, stream: TcpStream, peer: SocketAddr) -> Result<Self, GatewayError> {
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        Ok(Self::new(id, peer, Box::new(write)).with_reader(Box::new(read)))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Write one frame and flush it.
    ///
    /// A pending write is abandoned with [`SessionError::Closed`] as
    /// soon as the session is disconnected.
    pub async fn send(&self, frame: &DamsNtFrame) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::Closed)?;
        tokio::select! {
            result = writer.send(frame.clone()) => result.map_err(into_session_error),
            _ = self.cancel.cancelled() => Err(SessionError::Closed),
        }
    }

    /// Spawn the idle task. It ends on disconnect or when the peer
    /// closes, and on the way out removes the session from `registry`.
    pub fn start(self: &Arc<Self>, registry: Registry) -> JoinHandle<()> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let session = Arc::clone(self);

        tokio::spawn(async move {
            match reader {
                Some(mut reader) => {
                    let mut buf = [0u8; 256];
                    loop {
                        tokio::select! {
                            _ = session.cancel.cancelled() => break,
                            read = reader.read(&mut buf) => match read {
                                Ok(0) => {
                                    info!(session = session.id, peer = %session.peer, "subscriber closed connection");
                                    break;
                                }
                                // Clients are pure receivers.
                                Ok(n) => trace!(session = session.id, n, "discarding inbound bytes"),
                                Err(e) => {
                                    debug!(session = session.id, error = %e, "read side failed");
                                    break;
                                }
                            },
                        }
                    }
                }
                None => session.cancel.cancelled().await,
            }

            registry.remove(session.id);
            session.disconnect().await;
        })
    }

    /// Close the connection. Safe to call more than once.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.get_mut().shutdown().await {
                debug!(session = self.id, error = %e, "shutdown of write side failed");
            }
            debug!(session = self.id, peer = %self.peer, "session disconnected");
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn into_session_error(e: GatewayError) -> SessionError {
    match e {
        GatewayError::Connection(io) => SessionError::Io(io),
        other => SessionError::Io(std::io::Error::other(other.to_string())),
    }
}
