//! Per-device connection lifecycle and point access.

use crate::cache::{LearnedTypes, PointCache};
use crate::settings::{DeviceSettings, MissingTagPolicy, Tuning};
use crate::value::{f64_to_normalized, PointValue, Sample};
use crate::ClientError;
use rustiec_core::asdu::{Asdu, InformationObject};
use rustiec_core::element::{DoublePointValue, InformationElement, QOI_STATION};
use rustiec_core::types::{Cause, TypeId};
use rustiec_link::{LinkError, Session, SessionHandler, SessionState};
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{timeout, Instant};

const MIN_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const CONFIRMATION_BUFFER: usize = 64;

/// Delay before reconnect attempt number `failures + 1`.
///
/// `base * 2^min(failures, 5)`, clamped to 500 ms..=10 s.
pub fn backoff_delay(base: Duration, failures: u32) -> Duration {
    base.saturating_mul(1 << failures.min(5))
        .clamp(MIN_BACKOFF, MAX_BACKOFF)
}

/// Outcome of [`ClientAdapter::read`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Value(Sample),
    /// No value arrived and the missing-tag policy supplied this sentinel.
    Substituted(String),
}

impl Reading {
    pub fn sample(&self) -> Option<&Sample> {
        match self {
            Self::Value(sample) => Some(sample),
            Self::Substituted(_) => None,
        }
    }
}

struct AdapterHandler {
    cache: Arc<PointCache>,
    confirmations: broadcast::Sender<Asdu>,
}

impl SessionHandler for AdapterHandler {
    fn on_asdu(&self, _session: &Session, asdu: Asdu) {
        if asdu.type_id.is_monitor() && !asdu.cot.negative {
            self.cache.ingest(&asdu);
        } else {
            let _ = self.confirmations.send(asdu);
        }
    }

    fn on_closed(&self, session: &Session, error: Option<&LinkError>) {
        match error {
            Some(e) => log::warn!("session {} to {:?} closed: {e}", session.id(), session.peer_addr()),
            None => log::debug!("session {} closed", session.id()),
        }
    }
}

/// Binds one [`DeviceSettings`] to one live logical connection.
///
/// The adapter reconnects on demand: every read and write first makes sure
/// an active session exists, opening a new one when the previous session
/// closed or outlived [`DeviceSettings::lifetime`].
pub struct ClientAdapter {
    settings: RwLock<DeviceSettings>,
    session: Mutex<Option<Session>>,
    connect_lock: tokio::sync::Mutex<()>,
    cache: Arc<PointCache>,
    learned: LearnedTypes,
    confirmations: broadcast::Sender<Asdu>,
    failures: AtomicU32,
    connected_at: Mutex<Option<Instant>>,
    shutdown: watch::Sender<bool>,
}

impl std::fmt::Debug for ClientAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAdapter")
            .field("device", &self.settings().socket_addr())
            .field("connected", &self.is_connected())
            .field("failures", &self.consecutive_failures())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientAdapter {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        if let Some(session) = self.session.get_mut().take() {
            log::debug!("adapter dropped, closing session {}", session.id());
            session.close();
        }
    }
}

impl ClientAdapter {
    /// Validates `settings` and creates a disconnected adapter.
    pub fn new(settings: DeviceSettings) -> Result<Self, ClientError> {
        settings.validate()?;
        let (confirmations, _) = broadcast::channel(CONFIRMATION_BUFFER);
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            settings: RwLock::new(settings),
            session: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            cache: Arc::new(PointCache::new()),
            learned: LearnedTypes::new(),
            confirmations,
            failures: AtomicU32::new(0),
            connected_at: Mutex::new(None),
            shutdown,
        })
    }

    pub fn settings(&self) -> DeviceSettings {
        self.settings.read().clone()
    }

    /// Applies live timeout and retry changes.
    pub fn tune(&self, tuning: &Tuning) -> Result<(), ClientError> {
        self.settings.write().tune(tuning)?;
        Ok(())
    }

    pub fn cache(&self) -> &PointCache {
        &self.cache
    }

    pub fn learned_types(&self) -> &LearnedTypes {
        &self.learned
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|s| s.state() == SessionState::Active)
    }

    fn current(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn handler(&self) -> Arc<dyn SessionHandler> {
        Arc::new(AdapterHandler {
            cache: self.cache.clone(),
            confirmations: self.confirmations.clone(),
        })
    }

    /// Rejects addresses that do not fit the configured IOA width.
    fn check_ioa(&self, ioa: u32) -> Result<(), ClientError> {
        if ioa > self.settings().params.max_ioa() {
            return Err(ClientError::InvalidAddress(ioa.to_string()));
        }
        Ok(())
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleeps for `delay` unless [`shutdown`](Self::shutdown) is called first.
    pub(crate) async fn pause(&self, delay: Duration) -> Result<(), ClientError> {
        let mut stop = self.shutdown.subscribe();
        if *stop.borrow_and_update() {
            return Err(ClientError::Shutdown);
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = stop.wait_for(|stopped| *stopped) => Err(ClientError::Shutdown),
        }
    }

    /// Opens a session, trying up to `retry_count` times.
    ///
    /// A no-op when a session is already active. On success the failure
    /// counter is reset and the connect time recorded.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn connect(&self) -> Result<(), ClientError> {
        let _guard = self.connect_lock.lock().await;
        if self.is_shut_down() {
            return Err(ClientError::Shutdown);
        }
        if self.is_connected() {
            return Ok(());
        }

        let settings = self.settings();
        let attempts = settings.retry_count.max(1);
        for attempt in 1..=attempts {
            let session = Session::new(settings.session_config(), self.handler());
            match session.connect(settings.socket_addr()).await {
                Ok(()) => {
                    log::info!(
                        "connected to {} (attempt {attempt}/{attempts})",
                        settings.socket_addr()
                    );
                    *self.session.lock() = Some(session);
                    *self.connected_at.lock() = Some(Instant::now());
                    self.failures.store(0, Ordering::Relaxed);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "connect to {} failed (attempt {attempt}/{attempts}): {e}",
                        settings.socket_addr()
                    );
                    if attempt < attempts {
                        self.pause(settings.retry_delay).await?;
                    }
                }
            }
        }
        Err(ClientError::ConnectFailed { attempts })
    }

    /// Tears down the current session, waits out the backoff for the
    /// current failure streak, then connects again.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.disconnect().await;
        let delay = backoff_delay(self.settings().retry_delay, self.consecutive_failures());
        log::debug!("reconnecting in {delay:?}");
        self.pause(delay).await?;
        match self.connect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// True when the current connection is older than the configured
    /// lifetime. A zero lifetime never expires.
    pub fn check_lifetime(&self) -> bool {
        let lifetime = self.settings().lifetime;
        if lifetime.is_zero() {
            return false;
        }
        self.connected_at.lock().is_some_and(|at| at.elapsed() >= lifetime)
    }

    pub async fn disconnect(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.disconnect().await;
        }
    }

    /// Stops the adapter: pending backoff sleeps return
    /// [`ClientError::Shutdown`] and the session is closed.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.disconnect().await;
    }

    /// The active session, reconnecting first when it is missing, closed or
    /// past its lifetime.
    async fn ensure_session(&self) -> Result<Session, ClientError> {
        if self.check_lifetime() {
            log::info!("connection lifetime elapsed, refreshing");
            self.reconnect().await?;
        }
        if let Some(session) = self.current().filter(|s| s.state() == SessionState::Active) {
            return Ok(session);
        }
        if self.current().is_some() {
            self.reconnect().await?;
        } else {
            self.connect().await?;
        }
        self.current().ok_or(ClientError::NotConnected)
    }

    /// Sends a station interrogation for the configured common address.
    pub async fn interrogate(&self) -> Result<(), ClientError> {
        let session = self.ensure_session().await?;
        session
            .interrogation(self.settings().common_address, QOI_STATION)
            .await?;
        Ok(())
    }

    /// Interrogates the station and waits up to `interrogation_timeout` for
    /// the activation termination. Returns whether the station terminated
    /// the interrogation in time; replies received either way are cached.
    pub async fn general_interrogation(&self) -> Result<bool, ClientError> {
        let session = self.ensure_session().await?;
        let settings = self.settings();
        let mut confirmations = self.confirmations.subscribe();
        session
            .interrogation(settings.common_address, QOI_STATION)
            .await?;
        let deadline = Instant::now() + settings.interrogation_timeout;
        let reply = next_confirmation(&mut confirmations, deadline, |asdu| {
            asdu.type_id == TypeId::Interrogation
                && (asdu.cot.negative || asdu.cot.cause == Cause::ActivationTerm)
        })
        .await;
        Ok(reply.is_some_and(|asdu| !asdu.cot.negative))
    }

    /// Issues a test command and waits up to `ping_timeout` for its
    /// confirmation.
    pub async fn probe_protocol(&self) -> bool {
        let Some(session) = self.current().filter(|s| s.state() == SessionState::Active) else {
            return false;
        };
        let settings = self.settings();
        let mut confirmations = self.confirmations.subscribe();
        if session.test_command(settings.common_address).await.is_err() {
            return false;
        }
        let deadline = Instant::now() + settings.ping_timeout;
        matches!(
            next_confirmation(&mut confirmations, deadline, |asdu| {
                matches!(asdu.type_id, TypeId::Test | TypeId::TestCp56)
            })
            .await,
            Some(asdu) if !asdu.cot.negative
        )
    }

    /// Polls the cache until a sample for `ioa` newer than `since` shows up,
    /// optionally restricted to one value type.
    async fn poll_cache(
        &self,
        ioa: u32,
        type_id: Option<TypeId>,
        since: std::time::Instant,
        deadline: Instant,
        interval: Duration,
    ) -> Option<Sample> {
        loop {
            if let Some(sample) = self.cache.fresh_since(ioa, since).filter(|s| {
                type_id.map_or(true, |t| s.type_id.without_time() == t.without_time())
            }) {
                return Some(sample);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }

    /// Interrogates and polls for `ioa`, retrying the whole cycle.
    async fn acquire(&self, ioa: u32, type_id: Option<TypeId>) -> Result<Option<Sample>, ClientError> {
        let attempts = self.settings().retry_count.max(1);
        for attempt in 1..=attempts {
            let settings = self.settings();
            let since = std::time::Instant::now();
            match self.interrogate().await {
                Ok(()) => {
                    let deadline = Instant::now() + settings.read_timeout;
                    if let Some(sample) = self
                        .poll_cache(ioa, type_id, since, deadline, settings.poll_interval)
                        .await
                    {
                        return Ok(Some(sample));
                    }
                    log::debug!("IOA {ioa}: no value in cycle {attempt}/{attempts}");
                }
                Err(ClientError::Shutdown) => return Err(ClientError::Shutdown),
                Err(e) => log::warn!("IOA {ioa}: interrogation failed in cycle {attempt}/{attempts}: {e}"),
            }
            if attempt < attempts {
                self.pause(settings.retry_delay).await?;
            }
        }
        Ok(None)
    }

    /// Reads one point of a known value type.
    ///
    /// Returns [`ClientError::NotFound`] when every cycle times out, unless
    /// the missing-tag policy substitutes a sentinel.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn read(&self, ioa: u32, type_id: TypeId) -> Result<Reading, ClientError> {
        self.check_ioa(ioa)?;
        match self.acquire(ioa, Some(type_id)).await? {
            Some(sample) => Ok(Reading::Value(sample)),
            None => self.missing(ioa),
        }
    }

    /// Applies the missing-tag policy to a point that produced no value.
    pub(crate) fn missing(&self, ioa: u32) -> Result<Reading, ClientError> {
        match self.settings().missing_tag {
            MissingTagPolicy::Fail => Err(ClientError::NotFound { ioa }),
            MissingTagPolicy::Substitute(sentinel) => {
                log::debug!("IOA {ioa}: substituting {sentinel:?}");
                Ok(Reading::Substituted(sentinel))
            }
        }
    }

    /// Reads a point of unknown type, accepting whatever type it reports.
    ///
    /// The reported type is recorded so later reads of the bare IOA resolve
    /// to it; the returned type is the one on record.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn read_smart(&self, ioa: u32) -> Result<(Sample, TypeId), ClientError> {
        self.check_ioa(ioa)?;
        let sample = self
            .acquire(ioa, None)
            .await?
            .ok_or(ClientError::NotFound { ioa })?;
        let type_id = self.learned.learn(ioa, sample.type_id.without_time());
        Ok((sample, type_id))
    }

    /// Writes `value` to `ioa` and waits for a positive activation
    /// confirmation.
    ///
    /// `type_id` may be the point's monitor type or the command type to use;
    /// `None` picks the command from the value's kind. Sends and timeouts are
    /// retried; a negative confirmation or an unencodable command is final.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn write(
        &self,
        ioa: u32,
        type_id: Option<TypeId>,
        value: &PointValue,
    ) -> Result<(), ClientError> {
        self.check_ioa(ioa)?;
        let settings = self.settings();
        let command = build_command(settings.common_address, ioa, type_id, value)?;
        let attempts = settings.retry_count.max(1);
        let mut last = ClientError::Timeout;
        for attempt in 1..=attempts {
            match self.send_command(&command, ioa, settings.write_timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_final() => return Err(e),
                Err(e) => {
                    log::warn!("write to IOA {ioa} failed (attempt {attempt}/{attempts}): {e}");
                    last = e;
                }
            }
            if attempt < attempts {
                self.pause(settings.retry_delay).await?;
            }
        }
        Err(last)
    }

    async fn send_command(&self, command: &Asdu, ioa: u32, wait: Duration) -> Result<(), ClientError> {
        let session = self.ensure_session().await?;
        let mut confirmations = self.confirmations.subscribe();
        session.send(command).await?;
        let deadline = Instant::now() + wait;
        let wanted = command.type_id;
        let confirmation = next_confirmation(&mut confirmations, deadline, |asdu| {
            asdu.type_id == wanted
                && (asdu.cot.negative || asdu.cot.cause == Cause::ActivationCon)
                && asdu.objects.first().is_some_and(|o| o.address == ioa)
        })
        .await
        .ok_or(ClientError::Timeout)?;
        if confirmation.cot.negative {
            return Err(ClientError::NotAcknowledged { ioa });
        }
        Ok(())
    }
}

async fn next_confirmation(
    rx: &mut broadcast::Receiver<Asdu>,
    deadline: Instant,
    matches: impl Fn(&Asdu) -> bool,
) -> Option<Asdu> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, rx.recv()).await {
            Ok(Ok(asdu)) if matches(&asdu) => return Some(asdu),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                log::debug!("confirmation listener lagged by {skipped}");
            }
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

fn command_type(type_id: Option<TypeId>, value: &PointValue) -> Option<TypeId> {
    match type_id {
        Some(t) if t.is_command() => Some(t.without_time()),
        Some(t) if t.is_monitor() => t.command_for(),
        Some(_) => None,
        None => match value {
            PointValue::Bool(_) => Some(TypeId::SingleCommand),
            PointValue::Text(_) => None,
            PointValue::Float(_) => Some(TypeId::SetpointFloat),
            other => match other.as_i64() {
                Some(v) if i16::try_from(v).is_ok() => Some(TypeId::SetpointNormalized),
                _ => Some(TypeId::SetpointFloat),
            },
        },
    }
}

/// Builds the activation ASDU that writes `value` to `ioa`.
///
/// Integer values for a normalized set-point are sent raw; floats are taken
/// as `-1.0..=1.0` and scaled the same way reads scale them.
pub fn build_command(
    common_address: u16,
    ioa: u32,
    type_id: Option<TypeId>,
    value: &PointValue,
) -> Result<Asdu, ClientError> {
    let unsupported = || ClientError::UnsupportedValue {
        type_id,
        value: value.to_string(),
    };
    let command = command_type(type_id, value).ok_or_else(unsupported)?;
    let element = match command {
        TypeId::SingleCommand => InformationElement::SingleCommand {
            value: value.as_bool().ok_or_else(unsupported)?,
            qualifier: 0,
            select: false,
        },
        TypeId::DoubleCommand => {
            let state = match value {
                PointValue::Bool(true) => DoublePointValue::On,
                PointValue::Bool(false) => DoublePointValue::Off,
                other => match other.as_i64() {
                    Some(1) => DoublePointValue::Off,
                    Some(2) => DoublePointValue::On,
                    _ => return Err(unsupported()),
                },
            };
            InformationElement::DoubleCommand {
                value: state,
                qualifier: 0,
                select: false,
            }
        }
        TypeId::RegulatingStepCommand => match value.as_i64() {
            Some(step @ (1 | 2)) => InformationElement::RegulatingStep {
                step: step as u8,
                qualifier: 0,
                select: false,
            },
            _ => return Err(unsupported()),
        },
        TypeId::SetpointNormalized => {
            let raw = match value {
                PointValue::Float(v) => f64_to_normalized(*v),
                other => other.as_i64().and_then(|v| i16::try_from(v).ok()),
            };
            InformationElement::SetpointNormalized {
                value: raw.ok_or_else(unsupported)?,
                qualifier: 0,
                select: false,
            }
        }
        TypeId::SetpointScaled => InformationElement::SetpointScaled {
            value: value
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .ok_or_else(unsupported)?,
            qualifier: 0,
            select: false,
        },
        TypeId::SetpointFloat => {
            let v = value.as_f64().ok_or_else(unsupported)?;
            if !v.is_finite() || v.abs() > f64::from(f32::MAX) {
                return Err(unsupported());
            }
            InformationElement::SetpointFloat {
                value: v as f32,
                qualifier: 0,
                select: false,
            }
        }
        TypeId::BitstringCommand => match value {
            PointValue::Text(_) => return Err(unsupported()),
            other => InformationElement::BitstringCommand(
                other
                    .as_i64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(unsupported)?,
            ),
        },
        _ => return Err(unsupported()),
    };
    Ok(Asdu::new(command, Cause::Activation, common_address)
        .with_object(InformationObject::new(ioa, element)))
}

#[cfg(test)]
mod tests {
    use super::{backoff_delay, build_command};
    use crate::value::PointValue;
    use crate::ClientError;
    use rustiec_core::element::{DoublePointValue, InformationElement};
    use rustiec_core::types::{Cause, Quality, TypeId};
    use std::time::Duration;

    #[test]
    fn backoff_grows_then_caps() {
        let base = Duration::from_secs(1);
        let delays: Vec<_> = (0..8).map(|n| backoff_delay(base, n)).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[3], Duration::from_secs(8));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[7], Duration::from_secs(10));
        assert_eq!(
            backoff_delay(Duration::from_millis(10), 0),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn commands_follow_value_kind() {
        let bool_cmd = build_command(1, 5, None, &PointValue::Bool(true)).unwrap();
        assert_eq!(bool_cmd.type_id, TypeId::SingleCommand);
        assert_eq!(bool_cmd.cot.cause, Cause::Activation);

        let small = build_command(1, 5, None, &PointValue::Word(300)).unwrap();
        assert_eq!(small.type_id, TypeId::SetpointNormalized);
        assert_eq!(
            small.objects[0].element(),
            Some(&InformationElement::SetpointNormalized {
                value: 300,
                qualifier: 0,
                select: false
            })
        );

        let large = build_command(1, 5, None, &PointValue::Int(100_000)).unwrap();
        assert_eq!(large.type_id, TypeId::SetpointFloat);
        let float = build_command(1, 5, None, &PointValue::Float(2.5)).unwrap();
        assert_eq!(float.type_id, TypeId::SetpointFloat);
        let integral = build_command(1, 5, None, &PointValue::Float(42.0)).unwrap();
        assert_eq!(integral.type_id, TypeId::SetpointFloat);

        assert!(matches!(
            build_command(1, 5, None, &PointValue::Text("x".into())),
            Err(ClientError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn normalized_values_write_back_unchanged() {
        for raw in [i16::MIN, -16384, -1, 0, 1, 16384, i16::MAX] {
            let read = PointValue::from_element(&InformationElement::Normalized {
                value: raw,
                quality: Quality::GOOD,
            })
            .unwrap();
            let command = build_command(1, 9, Some(TypeId::MeasuredNormalized), &read).unwrap();
            assert_eq!(
                command.objects[0].element(),
                Some(&InformationElement::SetpointNormalized {
                    value: raw,
                    qualifier: 0,
                    select: false
                }),
                "raw {raw} read as {read}"
            );
        }
    }

    #[test]
    fn commands_follow_known_type() {
        let dp = build_command(1, 9, Some(TypeId::DoublePointCp56), &PointValue::Bool(true)).unwrap();
        assert_eq!(dp.type_id, TypeId::DoubleCommand);
        assert_eq!(
            dp.objects[0].element(),
            Some(&InformationElement::DoubleCommand {
                value: DoublePointValue::On,
                qualifier: 0,
                select: false
            })
        );

        let norm = build_command(
            1,
            9,
            Some(TypeId::MeasuredNormalized),
            &PointValue::Float(-0.5),
        )
        .unwrap();
        assert_eq!(
            norm.objects[0].element(),
            Some(&InformationElement::SetpointNormalized {
                value: -16384,
                qualifier: 0,
                select: false
            })
        );

        let raw = build_command(1, 9, Some(TypeId::SetpointNormalized), &PointValue::Int(-1)).unwrap();
        assert_eq!(
            raw.objects[0].element(),
            Some(&InformationElement::SetpointNormalized {
                value: -1,
                qualifier: 0,
                select: false
            })
        );

        let scaled = build_command(1, 9, Some(TypeId::SetpointScaled), &PointValue::Int(-7)).unwrap();
        assert_eq!(scaled.type_id, TypeId::SetpointScaled);

        assert!(build_command(1, 9, Some(TypeId::MeasuredNormalized), &PointValue::Float(1.5)).is_err());
        assert!(build_command(1, 9, Some(TypeId::IntegratedTotals), &PointValue::Int(1)).is_err());
        assert!(build_command(1, 9, Some(TypeId::SinglePoint), &PointValue::Int(5)).is_err());
    }
}
