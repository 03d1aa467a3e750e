use crate::session::{Session, SessionHandler, SessionState};
use crate::{LinkError, ServerConfig};
use futures_util::future::join_all;
use rustiec_core::asdu::Asdu;
use std::collections::HashMap;
use std::net::SocketAddr;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

type HandlerFactory = dyn Fn(SocketAddr) -> Arc<dyn SessionHandler> + Send + Sync;

/// TCP listener accepting IEC 104 client connections.
///
/// Every accepted socket gets its own [`Session`] and a handler from the
/// factory. Sessions join the broadcast registry once the peer has started
/// data transfer and leave it when they close.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    local_addr: SocketAddr,
    connections: RwLock<HashMap<u64, Session>>,
    registry: RwLock<HashMap<u64, Session>>,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.inner.local_addr)
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl Server {
    /// Binds the listener and starts accepting connections.
    pub async fn bind<F>(config: ServerConfig, factory: F) -> Result<Self, LinkError>
    where
        F: Fn(SocketAddr) -> Arc<dyn SessionHandler> + Send + Sync + 'static,
    {
        config.session.validate()?;
        if config.max_connections == 0 {
            return Err(LinkError::InvalidConfig("max_connections must be at least 1"));
        }
        let listener = TcpListener::bind(config.bind).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(ServerInner {
            config,
            local_addr,
            connections: RwLock::new(HashMap::new()),
            registry: RwLock::new(HashMap::new()),
            shutdown,
            accept_task: Mutex::new(None),
        });
        log::info!("server listening on {local_addr}");

        let task = tokio::spawn(accept_loop(
            inner.clone(),
            listener,
            Arc::new(factory),
            shutdown_rx,
        ));
        *inner.accept_task.lock() = Some(task);
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Accepted connections that have not closed yet.
    pub fn connection_count(&self) -> usize {
        self.inner.connection_count()
    }

    /// Sessions that have started data transfer.
    pub fn active_sessions(&self) -> Vec<Session> {
        self.inner.snapshot()
    }

    /// Queues `asdu` on every active session without waiting.
    ///
    /// A session whose queue is full or which closed in the meantime is
    /// skipped and logged. Returns the number of sessions that accepted the
    /// ASDU.
    pub fn broadcast(&self, asdu: &Asdu) -> usize {
        let mut delivered = 0;
        for session in self.inner.snapshot() {
            match session.try_send(asdu) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("broadcast to session {} skipped: {e}", session.id()),
            }
        }
        delivered
    }

    /// Closes the listener and every connection.
    ///
    /// Connections get the configured stop grace to exit before their
    /// drivers are aborted, so this returns within roughly that bound.
    pub async fn stop(&self) {
        let _ = self.inner.shutdown.send_replace(true);
        let grace = self.inner.config.stop_grace;
        let accept = self.inner.accept_task.lock().take();
        if let Some(mut accept) = accept {
            if timeout(grace, &mut accept).await.is_err() {
                accept.abort();
            }
        }

        let sessions: Vec<Session> = self.inner.connections.read().values().cloned().collect();
        log::info!("server stopping {} connection(s)", sessions.len());
        join_all(sessions.iter().map(|s| s.close_within(grace))).await;
        for session in &sessions {
            self.inner.forget(session.id());
        }
    }
}

impl ServerInner {
    fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    fn snapshot(&self) -> Vec<Session> {
        self.registry
            .read()
            .values()
            .cloned()
            .collect()
    }

    fn forget(&self, id: u64) {
        self.registry.write().remove(&id);
        self.connections.write().remove(&id);
    }
}

async fn accept_loop(
    inner: Arc<ServerInner>,
    listener: TcpListener,
    factory: Arc<HandlerFactory>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if inner.connection_count() >= inner.config.max_connections {
                        log::warn!("rejecting {peer}: connection limit reached");
                        drop(stream);
                        continue;
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        log::debug!("set_nodelay for {peer} failed: {e}");
                    }
                    let session = Session::new(inner.config.session.clone(), factory(peer));
                    session.set_peer(peer);
                    if let Err(e) = session.start_server(stream) {
                        log::warn!("failed to start session for {peer}: {e}");
                        continue;
                    }
                    log::info!("session {} accepted from {peer}", session.id());
                    inner.connections.write().insert(session.id(), session.clone());
                    tokio::spawn(supervise(inner.clone(), session));
                }
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
    log::debug!("accept loop for {} stopped", inner.local_addr);
}

/// Tracks one connection's registry membership over its lifetime.
async fn supervise(inner: Arc<ServerInner>, session: Session) {
    let mut state = session.subscribe_state();
    let reached = state
        .wait_for(|s| matches!(s, SessionState::Active | SessionState::Closed))
        .await
        .map(|s| *s)
        .unwrap_or(SessionState::Closed);
    if reached == SessionState::Active {
        inner.registry.write().insert(session.id(), session.clone());
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }
    inner.forget(session.id());
}
