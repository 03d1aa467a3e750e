//! Device-level read facade with health checks and block polling.

use crate::adapter::{ClientAdapter, Reading};
use crate::block::BlockReader;
use crate::resolver::{parse_inferred, resolve};
use crate::value::Sample;
use crate::ClientError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// How long a [`DeviceReader::check_connection`] result is reused.
pub const HEALTH_CACHE_TTL: Duration = Duration::from_secs(10);

/// Host reachability check used before any protocol-level probing.
pub trait ReachabilityProbe: Send + Sync {
    async fn reachable(&self, addr: SocketAddr, timeout: Duration) -> bool;
}

/// Reachability by opening and immediately dropping a TCP connection to the
/// device port.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl ReachabilityProbe for TcpProbe {
    async fn reachable(&self, addr: SocketAddr, wait: Duration) -> bool {
        matches!(timeout(wait, TcpStream::connect(addr)).await, Ok(Ok(_)))
    }
}

/// One device as seen by a polling loop.
///
/// Owns the device's [`ClientAdapter`] and one [`BlockReader`] per
/// configured block range.
#[derive(Debug)]
pub struct DeviceReader<P: ReachabilityProbe = TcpProbe> {
    adapter: Arc<ClientAdapter>,
    blocks: Vec<BlockReader>,
    probe: P,
    reads: AtomicU64,
    health: Mutex<Option<(Instant, bool)>>,
    health_ttl: Duration,
    reconnecting: Arc<AtomicBool>,
}

impl DeviceReader<TcpProbe> {
    pub fn new(adapter: ClientAdapter) -> Self {
        Self::with_probe(adapter, TcpProbe)
    }
}

impl<P: ReachabilityProbe> DeviceReader<P> {
    pub fn with_probe(adapter: ClientAdapter, probe: P) -> Self {
        let blocks = adapter
            .settings()
            .block_ranges
            .into_iter()
            .map(BlockReader::new)
            .collect();
        Self {
            adapter: Arc::new(adapter),
            blocks,
            probe,
            reads: AtomicU64::new(0),
            health: Mutex::new(None),
            health_ttl: HEALTH_CACHE_TTL,
            reconnecting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides how long a health result is reused.
    pub fn with_health_ttl(mut self, ttl: Duration) -> Self {
        self.health_ttl = ttl;
        self
    }

    pub fn adapter(&self) -> &ClientAdapter {
        &self.adapter
    }

    pub fn blocks(&self) -> &[BlockReader] {
        &self.blocks
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Combined reachability and protocol liveness, cached for
    /// [`HEALTH_CACHE_TTL`] unless overridden.
    ///
    /// When the host answers but the session does not, a reconnect is
    /// started in the background and `false` is returned right away. An
    /// unreachable host is reported down without reconnecting. Concurrent
    /// callers share one check.
    pub async fn check_connection(&self) -> bool {
        let mut health = self.health.lock().await;
        if let Some((at, healthy)) = *health {
            if at.elapsed() < self.health_ttl {
                return healthy;
            }
        }

        let settings = self.adapter.settings();
        let addr = settings.socket_addr();
        let healthy = if !self.probe.reachable(addr, settings.ping_timeout).await {
            log::warn!("{addr} unreachable");
            false
        } else if self.adapter.probe_protocol().await {
            true
        } else {
            self.spawn_reconnect();
            false
        };

        *health = Some((Instant::now(), healthy));
        healthy
    }

    fn spawn_reconnect(&self) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let adapter = self.adapter.clone();
        let reconnecting = self.reconnecting.clone();
        tokio::spawn(async move {
            match adapter.reconnect().await {
                Ok(()) => log::info!("background reconnect succeeded"),
                Err(e) => log::warn!("background reconnect failed: {e}"),
            }
            reconnecting.store(false, Ordering::Release);
        });
    }

    pub async fn is_device_healthy(&self) -> bool {
        self.check_connection().await
    }

    /// Reads every configured block.
    ///
    /// Only every `max_read_times`-th call refreshes the blocks, sharing one
    /// station interrogation between them; the calls in between return the
    /// previous snapshots. A failed interrogation keeps every previous
    /// snapshot.
    pub async fn read_multi(&self) -> Vec<(u32, Sample)> {
        let call = self.reads.fetch_add(1, Ordering::Relaxed);
        let cadence = u64::from(self.adapter.settings().max_read_times.max(1));
        if call % cadence == 0 && !self.blocks.is_empty() {
            let since = Instant::now();
            match self.adapter.general_interrogation().await {
                Ok(terminated) => {
                    if !terminated {
                        log::debug!("interrogation not terminated in time");
                    }
                    for block in &self.blocks {
                        block.harvest(self.adapter.cache(), since);
                    }
                }
                Err(e) => log::warn!("block refresh failed: {e}"),
            }
        }
        self.blocks.iter().flat_map(|b| b.snapshot()).collect()
    }

    /// Reads one point by address string (`"<type>:<ioa>"` or `"<ioa>"`).
    ///
    /// Points inside a configured block are served from its snapshot.
    /// Anything else goes to the adapter: a direct read when the type is
    /// known, a type-discovering read otherwise.
    pub async fn read(&self, address: &str) -> Result<Reading, ClientError> {
        let point = resolve(address, self.adapter.learned_types())?;
        let block = self.blocks.iter().find(|b| {
            b.covers(point.ioa)
                && point
                    .type_id
                    .map_or(true, |t| t.without_time() == b.range().type_id.without_time())
        });
        if let Some(block) = block {
            if block.refresh_count() == 0 {
                block.refresh(&self.adapter).await?;
            }
            return match block.get(point.ioa) {
                Some(sample) => Ok(Reading::Value(sample)),
                None => self.adapter.missing(point.ioa),
            };
        }
        match point.type_id {
            Some(type_id) => self.adapter.read(point.ioa, type_id).await,
            None => match self.adapter.read_smart(point.ioa).await {
                Ok((sample, _)) => Ok(Reading::Value(sample)),
                Err(ClientError::NotFound { ioa }) => self.adapter.missing(ioa),
                Err(e) => Err(e),
            },
        }
    }

    /// Writes a raw value string to a point, inferring its kind.
    pub async fn write(&self, address: &str, raw: &str) -> Result<(), ClientError> {
        let point = resolve(address, self.adapter.learned_types())?;
        self.adapter
            .write(point.ioa, point.type_id, &parse_inferred(raw))
            .await
    }

    pub async fn shutdown(&self) {
        self.adapter.shutdown().await;
    }
}
