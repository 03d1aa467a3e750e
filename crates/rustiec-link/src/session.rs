//! One IEC 104 connection.
//!
//! A [`Session`] owns a single TCP stream through one driver task. The task
//! reads and decodes inbound frames, delivers ASDUs to the session's
//! [`SessionHandler`] in wire order, writes queued outbound ASDUs as I-frames
//! within the k window, and runs the t1/t2/t3 timers. Because only the driver
//! touches the socket, concurrent callers of [`Session::send`] never
//! interleave bytes of different frames.

use crate::{LinkError, SessionConfig};
use rustiec_core::apci::{frame_len, seq_add, seq_distance, Apci, UFunction, START_BYTE};
use rustiec_core::apci::{MAX_ASDU_LEN, MAX_FRAME_LEN};
use rustiec_core::asdu::Asdu;
use rustiec_core::element::DoublePointValue;
use rustiec_core::encoding::{reader::Reader, writer::Writer};
use rustiec_core::types::Cp56Time2a;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a session. There is no transition out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

/// Which end of the STARTDT handshake the driver plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Client,
    Server,
}

/// Callbacks invoked from a session's driver task.
///
/// Calls for one session are sequential and in wire order. A slow
/// `on_asdu` stalls only its own session.
pub trait SessionHandler: Send + Sync + 'static {
    fn on_asdu(&self, session: &Session, asdu: Asdu);

    /// Fired exactly once. `None` means a local, clean shutdown.
    fn on_closed(&self, _session: &Session, _error: Option<&LinkError>) {}
}

/// Event form of the [`SessionHandler`] callbacks, for channel consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Asdu(Asdu),
    /// Carries the rendered error, or `None` for a clean shutdown.
    Closed(Option<String>),
}

impl SessionHandler for mpsc::UnboundedSender<SessionEvent> {
    fn on_asdu(&self, _session: &Session, asdu: Asdu) {
        let _ = self.send(SessionEvent::Asdu(asdu));
    }

    fn on_closed(&self, _session: &Session, error: Option<&LinkError>) {
        let _ = self.send(SessionEvent::Closed(error.map(ToString::to_string)));
    }
}

/// Handle to one IEC 104 connection. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    config: SessionConfig,
    handler: Arc<dyn SessionHandler>,
    state: watch::Sender<SessionState>,
    shutdown: watch::Sender<bool>,
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    peer: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
    started: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("peer", &self.peer_addr())
            .finish()
    }
}

impl Session {
    pub fn new(config: SessionConfig, handler: Arc<dyn SessionHandler>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                config,
                handler,
                state,
                shutdown,
                outbound: Mutex::new(None),
                task: Mutex::new(None),
                peer: Mutex::new(None),
                closed: AtomicBool::new(false),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique identifier, used in log lines and server registries.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.inner.peer.lock()
    }

    /// Opens a TCP connection to `addr` and runs the STARTDT handshake.
    ///
    /// On failure the session ends in `Closed`; construct a new one to retry.
    pub async fn connect(&self, addr: SocketAddr) -> Result<(), LinkError> {
        self.inner.config.validate()?;
        self.transition(SessionState::Idle, SessionState::Connecting)?;
        *self.inner.peer.lock() = Some(addr);
        log::debug!("session {}: connecting to {addr}", self.inner.id);

        let stream = match timeout(self.inner.config.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.mark_closed();
                return Err(e.into());
            }
            Err(_) => {
                self.mark_closed();
                return Err(LinkError::ConnectTimeout);
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("session {}: set_nodelay failed: {e}", self.inner.id);
        }
        self.handshake(stream).await
    }

    /// Runs the client side of the protocol over an already-open stream.
    ///
    /// Returns once STARTDT is confirmed.
    pub async fn start_client<S>(&self, stream: S) -> Result<(), LinkError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.inner.config.validate()?;
        self.transition(SessionState::Idle, SessionState::Connecting)?;
        self.handshake(stream).await
    }

    /// Runs the server side of the protocol over an accepted stream.
    ///
    /// The session becomes `Active` when the peer sends STARTDT act.
    pub fn start_server<S>(&self, stream: S) -> Result<(), LinkError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.inner.config.validate()?;
        self.transition(SessionState::Idle, SessionState::Connecting)?;
        self.spawn_driver(stream, Role::Server, None);
        Ok(())
    }

    pub(crate) fn set_peer(&self, peer: SocketAddr) {
        *self.inner.peer.lock() = Some(peer);
    }

    async fn handshake<S>(&self, stream: S) -> Result<(), LinkError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (failed_tx, failed_rx) = oneshot::channel();
        self.spawn_driver(stream, Role::Client, Some(failed_tx));
        let mut state = self.subscribe_state();
        let reached = match state
            .wait_for(|s| matches!(s, SessionState::Active | SessionState::Closed))
            .await
        {
            Ok(s) => *s,
            Err(_) => SessionState::Closed,
        };
        if reached == SessionState::Active {
            log::info!("session {}: data transfer started", self.inner.id);
            return Ok(());
        }
        // An aborted driver drops the sender without a cause.
        match failed_rx.await {
            Ok(Some(e)) => Err(e),
            Ok(None) | Err(_) => Err(LinkError::Closed),
        }
    }

    /// Spawns the driver task. `failed` receives the error that ended the
    /// driver when the session never reached `Active`.
    fn spawn_driver<S>(
        &self,
        stream: S,
        role: Role,
        failed: Option<oneshot::Sender<Option<LinkError>>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.inner.config.send_queue);
        *self.inner.outbound.lock() = Some(tx);
        let driver = Driver::new(self.clone(), stream, role, rx);
        let session = self.clone();
        let task = tokio::spawn(async move {
            let result = driver.run().await;
            let started = session.inner.started.load(Ordering::Acquire);
            let error = session.finish(result.err());
            if let Some(failed) = failed.filter(|_| !started) {
                let _ = failed.send(error);
            }
        });
        *self.inner.task.lock() = Some(task);
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), LinkError> {
        let moved = self.inner.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else if self.state() == SessionState::Closed {
            Err(LinkError::Closed)
        } else {
            Err(LinkError::AlreadyStarted)
        }
    }

    fn mark_closed(&self) {
        self.inner.state.send_replace(SessionState::Closed);
        self.inner.outbound.lock().take();
    }

    /// Moves to `Closed` and notifies the handler once. Hands the error
    /// back to the caller.
    fn finish(&self, error: Option<LinkError>) -> Option<LinkError> {
        self.mark_closed();
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return error;
        }
        match &error {
            Some(e) => log::warn!("session {}: closed: {e}", self.inner.id),
            None => log::info!("session {}: closed", self.inner.id),
        }
        self.inner.handler.on_closed(self, error.as_ref());
        error
    }

    fn encode(&self, asdu: &Asdu) -> Result<Vec<u8>, LinkError> {
        let params = &self.inner.config.params;
        let mut buf = [0u8; MAX_ASDU_LEN];
        let mut w = Writer::new(&mut buf);
        asdu.encode(&mut w, params)?;
        if params.cot_size == 2 && asdu.originator == 0 {
            w.patch_u8(3, self.inner.config.originator)?;
        }
        Ok(w.as_written().to_vec())
    }

    fn sender(&self) -> Result<mpsc::Sender<Vec<u8>>, LinkError> {
        match self.state() {
            SessionState::Idle | SessionState::Connecting => Err(LinkError::NotConnected),
            SessionState::Closed => Err(LinkError::Closed),
            SessionState::Active => self
                .inner
                .outbound
                .lock()
                .as_ref()
                .cloned()
                .ok_or(LinkError::Closed),
        }
    }

    /// Queues one ASDU for transmission.
    ///
    /// Waits at most the configured send timeout for queue space. A zero
    /// originator is replaced by the session's configured originator.
    pub async fn send(&self, asdu: &Asdu) -> Result<(), LinkError> {
        let frame = self.encode(asdu)?;
        let tx = self.sender()?;
        match timeout(self.inner.config.send_timeout, tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(LinkError::Closed),
            Err(_) => Err(LinkError::SendTimeout),
        }
    }

    /// Queues one ASDU without waiting; a full queue is reported as
    /// [`LinkError::QueueFull`].
    pub fn try_send(&self, asdu: &Asdu) -> Result<(), LinkError> {
        let frame = self.encode(asdu)?;
        self.sender()?.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LinkError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    pub async fn single_command(
        &self,
        common_address: u16,
        ioa: u32,
        value: bool,
        select: bool,
    ) -> Result<(), LinkError> {
        self.send(&Asdu::single_command(common_address, ioa, value, select))
            .await
    }

    pub async fn double_command(
        &self,
        common_address: u16,
        ioa: u32,
        value: DoublePointValue,
        select: bool,
    ) -> Result<(), LinkError> {
        self.send(&Asdu::double_command(common_address, ioa, value, select))
            .await
    }

    pub async fn interrogation(&self, common_address: u16, qualifier: u8) -> Result<(), LinkError> {
        self.send(&Asdu::interrogation(common_address, qualifier))
            .await
    }

    pub async fn counter_interrogation(
        &self,
        common_address: u16,
        request: u8,
        freeze: u8,
    ) -> Result<(), LinkError> {
        self.send(&Asdu::counter_interrogation(common_address, request, freeze))
            .await
    }

    pub async fn clock_sync(&self, common_address: u16, time: Cp56Time2a) -> Result<(), LinkError> {
        self.send(&Asdu::clock_sync(common_address, time)).await
    }

    pub async fn test_command(&self, common_address: u16) -> Result<(), LinkError> {
        self.send(&Asdu::test_command(common_address)).await
    }

    pub async fn read_command(&self, common_address: u16, ioa: u32) -> Result<(), LinkError> {
        self.send(&Asdu::read_command(common_address, ioa)).await
    }

    /// Closes the session. Idempotent.
    ///
    /// The driver gets the configured close grace to flush acknowledgements
    /// before it is aborted.
    pub async fn disconnect(&self) {
        self.close_within(self.inner.config.close_grace).await;
    }

    /// Signals the driver to stop without waiting for it.
    ///
    /// Usable outside an async context, e.g. from `Drop`. The driver still
    /// flushes its final acknowledgement and notifies the handler.
    pub fn close(&self) {
        let _ = self.inner.shutdown.send_replace(true);
        self.inner.outbound.lock().take();
    }

    pub(crate) async fn close_within(&self, grace: Duration) {
        self.close();
        let task = self.inner.task.lock().take();
        if let Some(mut task) = task {
            if timeout(grace, &mut task).await.is_err() {
                log::warn!(
                    "session {}: driver did not stop within {grace:?}; aborting",
                    self.inner.id
                );
                task.abort();
            }
        }
        let _ = self.finish(None);
    }
}

struct Driver<S> {
    session: Session,
    config: SessionConfig,
    stream: S,
    role: Role,
    outbound: mpsc::Receiver<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
    rx_buf: Vec<u8>,
    started: bool,
    send_seq: u16,
    ack_seq: u16,
    recv_seq: u16,
    pending: VecDeque<(u16, Instant)>,
    unacked_recv: u16,
    first_unacked_recv: Option<Instant>,
    last_rx: Instant,
    testfr_sent: Option<Instant>,
    startdt_sent: Option<Instant>,
}

impl<S> Driver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn new(session: Session, stream: S, role: Role, outbound: mpsc::Receiver<Vec<u8>>) -> Self {
        let config = session.inner.config.clone();
        let shutdown = session.inner.shutdown.subscribe();
        Self {
            session,
            config,
            stream,
            role,
            outbound,
            shutdown,
            rx_buf: Vec::with_capacity(MAX_FRAME_LEN * 2),
            started: false,
            send_seq: 0,
            ack_seq: 0,
            recv_seq: 0,
            pending: VecDeque::new(),
            unacked_recv: 0,
            first_unacked_recv: None,
            last_rx: Instant::now(),
            testfr_sent: None,
            startdt_sent: None,
        }
    }

    fn id(&self) -> u64 {
        self.session.inner.id
    }

    async fn run(mut self) -> Result<(), LinkError> {
        if self.role == Role::Client {
            self.write_frame(Apci::U(UFunction::StartDtAct), &[]).await?;
            self.startdt_sent = Some(Instant::now());
        }

        let mut chunk = [0u8; 1024];
        loop {
            if *self.shutdown.borrow() {
                self.close_gracefully().await;
                return Ok(());
            }
            let deadline = self.next_deadline();
            let can_send = self.started && self.window_open();
            tokio::select! {
                read = self.stream.read(&mut chunk) => {
                    let n = read?;
                    if n == 0 {
                        return Err(LinkError::PeerClosed);
                    }
                    self.last_rx = Instant::now();
                    self.rx_buf.extend_from_slice(&chunk[..n]);
                    self.process_rx().await?;
                }
                frame = self.outbound.recv(), if can_send => match frame {
                    Some(asdu) => self.send_i_frame(&asdu).await?,
                    None => {
                        self.close_gracefully().await;
                        return Ok(());
                    }
                },
                _ = sleep_until(deadline) => self.on_timer().await?,
                _ = self.shutdown.changed() => {
                    self.close_gracefully().await;
                    return Ok(());
                }
            }
        }
    }

    fn window_open(&self) -> bool {
        seq_distance(self.ack_seq, self.send_seq) < self.config.k
    }

    fn next_deadline(&self) -> Instant {
        let t1 = self.config.t1;
        // The t3 deadline is replaced by the TESTFR confirmation deadline
        // while a test frame is outstanding.
        let mut deadline = match self.testfr_sent {
            None => self.last_rx + self.config.t3,
            Some(at) => at + t1,
        };
        let t1_marks = self
            .pending
            .front()
            .map(|(_, at)| *at)
            .into_iter()
            .chain(self.startdt_sent);
        for at in t1_marks {
            deadline = deadline.min(at + t1);
        }
        if let Some(at) = self.first_unacked_recv {
            deadline = deadline.min(at + self.config.t2);
        }
        deadline
    }

    async fn on_timer(&mut self) -> Result<(), LinkError> {
        let now = Instant::now();
        let t1 = self.config.t1;
        let expired = |at: Instant| now.saturating_duration_since(at) >= t1;

        if self.pending.front().is_some_and(|(_, at)| expired(*at)) {
            log::warn!("session {}: I-frame not acknowledged within t1", self.id());
            return Err(LinkError::T1Timeout);
        }
        if self.testfr_sent.is_some_and(expired) {
            log::warn!("session {}: TESTFR not confirmed within t1", self.id());
            return Err(LinkError::T1Timeout);
        }
        if self.startdt_sent.is_some_and(expired) {
            log::warn!("session {}: STARTDT not confirmed within t1", self.id());
            return Err(LinkError::T1Timeout);
        }
        if self
            .first_unacked_recv
            .is_some_and(|at| now.saturating_duration_since(at) >= self.config.t2)
        {
            self.send_ack().await?;
        }
        if self.testfr_sent.is_none()
            && now.saturating_duration_since(self.last_rx) >= self.config.t3
        {
            log::debug!("session {}: idle for t3, sending TESTFR", self.id());
            self.write_frame(Apci::U(UFunction::TestFrAct), &[]).await?;
            self.testfr_sent = Some(now);
        }
        Ok(())
    }

    async fn process_rx(&mut self) -> Result<(), LinkError> {
        loop {
            match frame_len(&self.rx_buf) {
                Ok(None) => return Ok(()),
                Ok(Some(len)) if self.rx_buf.len() < len => return Ok(()),
                Ok(Some(len)) => {
                    let frame: Vec<u8> = self.rx_buf.drain(..len).collect();
                    self.handle_frame(&frame).await?;
                }
                Err(e) => {
                    let skip = self.rx_buf[1..]
                        .iter()
                        .position(|b| *b == START_BYTE)
                        .map_or(self.rx_buf.len(), |p| p + 1);
                    log::warn!(
                        "session {}: bad frame header ({e}); skipping {skip} bytes",
                        self.id()
                    );
                    self.rx_buf.drain(..skip);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let mut r = Reader::new(frame);
        let (apci, payload) = match Apci::decode(&mut r) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("session {}: dropping malformed frame: {e}", self.id());
                return Ok(());
            }
        };

        match apci {
            Apci::I { send_seq, recv_seq } => {
                if !self.started {
                    log::warn!(
                        "session {}: I-frame before STARTDT; dropped",
                        self.id()
                    );
                    return Ok(());
                }
                if send_seq != self.recv_seq {
                    return Err(LinkError::SequenceMismatch {
                        expected: self.recv_seq,
                        received: send_seq,
                    });
                }
                self.recv_seq = seq_add(self.recv_seq, 1);
                self.acknowledge(recv_seq)?;
                self.unacked_recv += 1;
                self.first_unacked_recv.get_or_insert_with(Instant::now);

                let mut ar = Reader::new(payload);
                match Asdu::decode(&mut ar, &self.config.params) {
                    Ok(asdu) => self.session.inner.handler.on_asdu(&self.session, asdu),
                    Err(e) => log::warn!("session {}: dropping ASDU: {e}", self.id()),
                }

                if self.unacked_recv >= self.config.w {
                    self.send_ack().await?;
                }
            }
            Apci::S { recv_seq } => self.acknowledge(recv_seq)?,
            Apci::U(function) => self.handle_u(function).await?,
        }
        Ok(())
    }

    async fn handle_u(&mut self, function: UFunction) -> Result<(), LinkError> {
        log::debug!("session {}: received {function:?}", self.id());
        match function {
            UFunction::StartDtAct => {
                self.write_frame(Apci::U(UFunction::StartDtCon), &[]).await?;
                self.start_transfer();
            }
            UFunction::StartDtCon => {
                if self.startdt_sent.take().is_some() {
                    self.start_transfer();
                }
            }
            UFunction::StopDtAct => {
                if self.unacked_recv > 0 {
                    self.send_ack().await?;
                }
                self.started = false;
                self.write_frame(Apci::U(UFunction::StopDtCon), &[]).await?;
            }
            UFunction::StopDtCon => self.started = false,
            UFunction::TestFrAct => {
                self.write_frame(Apci::U(UFunction::TestFrCon), &[]).await?;
            }
            UFunction::TestFrCon => self.testfr_sent = None,
        }
        Ok(())
    }

    fn start_transfer(&mut self) {
        self.started = true;
        self.session.inner.started.store(true, Ordering::Release);
        self.session
            .inner
            .state
            .send_if_modified(|s| match s {
                SessionState::Connecting => {
                    *s = SessionState::Active;
                    true
                }
                _ => false,
            });
    }

    /// Releases every pending I-frame up to `recv_seq`.
    fn acknowledge(&mut self, recv_seq: u16) -> Result<(), LinkError> {
        let acked = seq_distance(self.ack_seq, recv_seq);
        if acked > seq_distance(self.ack_seq, self.send_seq) {
            return Err(LinkError::InvalidAck(recv_seq));
        }
        for _ in 0..acked {
            self.pending.pop_front();
        }
        self.ack_seq = recv_seq;
        Ok(())
    }

    async fn send_i_frame(&mut self, asdu: &[u8]) -> Result<(), LinkError> {
        let apci = Apci::I {
            send_seq: self.send_seq,
            recv_seq: self.recv_seq,
        };
        self.write_frame(apci, asdu).await?;
        self.pending.push_back((self.send_seq, Instant::now()));
        self.send_seq = seq_add(self.send_seq, 1);
        self.unacked_recv = 0;
        self.first_unacked_recv = None;
        Ok(())
    }

    async fn send_ack(&mut self) -> Result<(), LinkError> {
        self.write_frame(
            Apci::S {
                recv_seq: self.recv_seq,
            },
            &[],
        )
        .await?;
        self.unacked_recv = 0;
        self.first_unacked_recv = None;
        Ok(())
    }

    async fn write_frame(&mut self, apci: Apci, asdu: &[u8]) -> Result<(), LinkError> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let mut w = Writer::new(&mut buf);
        apci.encode(&mut w, asdu)?;
        let len = w.position();
        match timeout(self.config.t1, self.stream.write_all(&buf[..len])).await {
            Ok(result) => result?,
            Err(_) => return Err(LinkError::T1Timeout),
        }
        Ok(())
    }

    async fn close_gracefully(&mut self) {
        if self.unacked_recv > 0 {
            if let Err(e) = self.send_ack().await {
                log::debug!("session {}: final ack failed: {e}", self.id());
            }
        }
        let _ = self.stream.shutdown().await;
    }
}
