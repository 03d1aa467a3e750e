use crate::LinkError;
use rustiec_core::asdu::AsduParams;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Standard IEC 104 TCP port.
pub const DEFAULT_PORT: u16 = 2404;

const MIN_TIMER: Duration = Duration::from_secs(1);
const MAX_T1_T2: Duration = Duration::from_secs(255);
const MAX_T3: Duration = Duration::from_secs(172_800);

/// Per-session protocol settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    pub params: AsduParams,
    /// Stamped on every ASDU this session sends when the COT is two octets.
    pub originator: u8,
    pub connect_timeout: Duration,
    /// Time-out of send or test APDUs.
    pub t1: Duration,
    /// Time-out for acknowledging received I-frames.
    pub t2: Duration,
    /// Idle time before a test frame is sent.
    pub t3: Duration,
    /// Maximum unacknowledged I-frames in flight.
    pub k: u16,
    /// Acknowledge after this many received I-frames.
    pub w: u16,
    /// Upper bound for a caller waiting on a full send queue.
    pub send_timeout: Duration,
    pub send_queue: usize,
    /// Time a closing session gets to finish before it is aborted.
    pub close_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            params: AsduParams::IEC104,
            originator: 0,
            connect_timeout: Duration::from_secs(10),
            t1: Duration::from_secs(15),
            t2: Duration::from_secs(10),
            t3: Duration::from_secs(20),
            k: 12,
            w: 8,
            send_timeout: Duration::from_secs(5),
            send_queue: 256,
            close_grace: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    pub fn with_params(mut self, params: AsduParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_originator(mut self, originator: u8) -> Self {
        self.originator = originator;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timers(mut self, t1: Duration, t2: Duration, t3: Duration) -> Self {
        self.t1 = t1;
        self.t2 = t2;
        self.t3 = t3;
        self
    }

    pub fn with_window(mut self, k: u16, w: u16) -> Self {
        self.k = k;
        self.w = w;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if !self.params.is_valid() {
            return Err(LinkError::InvalidConfig("field widths out of range"));
        }
        if !(MIN_TIMER..=MAX_T1_T2).contains(&self.t1) {
            return Err(LinkError::InvalidConfig("t1 must be 1..=255 s"));
        }
        if !(MIN_TIMER..=MAX_T1_T2).contains(&self.t2) {
            return Err(LinkError::InvalidConfig("t2 must be 1..=255 s"));
        }
        if self.t2 >= self.t1 {
            return Err(LinkError::InvalidConfig("t2 must be shorter than t1"));
        }
        if !(MIN_TIMER..=MAX_T3).contains(&self.t3) {
            return Err(LinkError::InvalidConfig("t3 must be 1..=172800 s"));
        }
        if self.k == 0 || self.k >= rustiec_core::apci::SEQ_MODULO {
            return Err(LinkError::InvalidConfig("k must be 1..=32767"));
        }
        if self.w == 0 || self.w > self.k {
            return Err(LinkError::InvalidConfig("w must be 1..=k"));
        }
        if self.send_queue == 0 {
            return Err(LinkError::InvalidConfig("send queue must hold a frame"));
        }
        if self.connect_timeout.is_zero() {
            return Err(LinkError::InvalidConfig("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Listener settings for [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Sockets accepted beyond this bound are closed immediately.
    pub max_connections: usize,
    pub session: SessionConfig,
    /// Time live connections get to exit on stop before being aborted.
    pub stop_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 10,
            session: SessionConfig::default(),
            stop_grace: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}
