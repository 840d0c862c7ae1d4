//! TCP accept loop and session lifecycle.
//!
//! The server knows nothing about frames. Each accepted connection is
//! turned into a [`ClientSession`] by an injected [`SessionFactory`],
//! registered, and started.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ClientSession, Registry};
use crate::error::GatewayError;

/// Builds a session from an accepted connection and its assigned id.
pub type SessionFactory =
    Arc<dyn Fn(TcpStream, SocketAddr, u64) -> Result<ClientSession, GatewayError> + Send + Sync>;

/// The stock factory: [`ClientSession::from_tcp`].
pub fn tcp_session_factory() -> SessionFactory {
    Arc::new(|stream, peer, id| ClientSession::from_tcp(id, stream, peer))
}

pub struct Server {
    /// Present until `listen` takes it or `shutdown` drops it.
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    factory: SessionFactory,
    registry: Registry,
    next_id: AtomicU64,
    session_tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
    /// Cancelled once the listening socket is closed.
    stopped: CancellationToken,
}

impl Server {
    pub async fn bind(addr: &str, factory: SessionFactory) -> Result<Arc<Self>, GatewayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("DAMS-NT server bound to {local_addr}");

        Ok(Arc::new(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            factory,
            registry: Registry::default(),
            next_id: AtomicU64::new(1),
            session_tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Accept connections until [`shutdown`](Self::shutdown).
    ///
    /// An accept error after shutdown has begun is swallowed; any other
    /// accept error ends the loop and is returned. Only one call can
    /// run; later calls fail with [`GatewayError::NotListenable`].
    pub async fn listen(self: &Arc<Self>) -> Result<(), GatewayError> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(GatewayError::NotListenable)?;
        info!("accepting subscribers on {}", self.local_addr);

        let result = loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(_) if self.shutdown.is_cancelled() => break Ok(()),
                Err(e) => {
                    warn!("accept failed: {e}");
                    break Err(GatewayError::Connection(e));
                }
            }
        };

        drop(listener);
        self.stopped.cancel();
        debug!("accept loop exited");
        result
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = match (self.factory)(stream, peer, id) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                warn!(session = id, %peer, "could not create session: {e}");
                return;
            }
        };

        if !self.registry.add(Arc::clone(&session)) {
            debug!(session = id, %peer, "registry closed, dropping connection");
            return;
        }
        info!(session = id, %peer, subscribers = self.registry.len(), "subscriber connected");

        let handle = session.start(self.registry.clone());
        let mut tasks = self
            .session_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Stop accepting, close the listening socket, and disconnect and
    /// remove every session. Idempotent. Returns once the accept loop
    /// and all session tasks have finished.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let unused = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if unused.is_some() {
            // listen() never ran.
            drop(unused);
            self.stopped.cancel();
        }
        self.stopped.cancelled().await;

        let sessions = self.registry.close();
        if !sessions.is_empty() {
            info!(count = sessions.len(), "disconnecting subscribers");
        }
        for session in sessions {
            session.disconnect().await;
        }

        let tasks = std::mem::take(
            &mut *self
                .session_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("registry", &self.registry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
