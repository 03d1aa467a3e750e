//! Per-device configuration.
//!
//! A [`DeviceSettings`] is normally built from the compact descriptor
//!
//! ```text
//! ip|port|commonAddr|originatorAddr|cotLen|caLen|ioaLen|maxReadTimes|blockRanges
//! ```
//!
//! where `blockRanges` is optional and holds `;`-separated `type:from-to`
//! entries such as `13:100-120;1:1-16`. Everything not carried by the
//! descriptor starts from the defaults and can be adjusted with the `with_*`
//! builders before the settings are handed to an adapter.

use crate::SettingsError;
use rustiec_core::asdu::AsduParams;
use rustiec_core::types::TypeId;
use rustiec_link::{SessionConfig, DEFAULT_PORT};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// A contiguous IOA range of one value type, polled as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRange {
    pub type_id: TypeId,
    pub from: u32,
    pub to: u32,
}

impl BlockRange {
    pub fn contains(&self, ioa: u32) -> bool {
        (self.from..=self.to).contains(&ioa)
    }
}

impl FromStr for BlockRange {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsError::InvalidBlockRange(s.to_string());
        let (type_part, range) = s.trim().split_once(':').ok_or_else(invalid)?;
        let (from, to) = range.split_once('-').ok_or_else(invalid)?;
        let type_part = type_part.trim();
        let type_id = type_part
            .parse::<u8>()
            .ok()
            .and_then(TypeId::from_u8)
            .or_else(|| TypeId::from_mnemonic(type_part))
            .filter(|t| t.is_monitor())
            .ok_or_else(invalid)?;
        let from = from.trim().parse::<u32>().map_err(|_| invalid())?;
        let to = to.trim().parse::<u32>().map_err(|_| invalid())?;
        if from > to || to > AsduParams::IEC104.max_ioa() {
            return Err(invalid());
        }
        Ok(Self { type_id, from, to })
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.type_id.to_u8(), self.from, self.to)
    }
}

/// Parses the `;`-separated block range field. Empty input yields no ranges.
pub fn parse_block_ranges(s: &str) -> Result<Vec<BlockRange>, SettingsError> {
    s.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// What a read returns when no value could be obtained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MissingTagPolicy {
    /// Report the miss as an error.
    #[default]
    Fail,
    /// Return this sentinel text instead, marked as substituted.
    Substitute(String),
}

/// Live adjustments applied with [`DeviceSettings::tune`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuning {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub interrogation_timeout: Option<Duration>,
    pub retry_count: Option<u32>,
    pub retry_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSettings {
    pub ip: IpAddr,
    pub port: u16,
    pub common_address: u16,
    pub originator: u8,
    pub params: AsduParams,
    /// Block refresh cadence for multi-point reads; 1 refreshes every call.
    pub max_read_times: u32,
    pub block_ranges: Vec<BlockRange>,
    pub connect_timeout: Duration,
    /// Time a single read cycle waits for the value after interrogating.
    pub read_timeout: Duration,
    /// Time a command waits for its activation confirmation.
    pub write_timeout: Duration,
    /// Time a block refresh collects interrogation replies.
    pub interrogation_timeout: Duration,
    pub ping_timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    /// Connection age that forces a reconnect; zero disables it.
    pub lifetime: Duration,
    pub poll_interval: Duration,
    pub t1: Duration,
    pub t2: Duration,
    pub t3: Duration,
    pub missing_tag: MissingTagPolicy,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            common_address: 1,
            originator: 0,
            params: AsduParams::IEC104,
            max_read_times: 1,
            block_ranges: Vec::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(5),
            interrogation_timeout: Duration::from_secs(2),
            ping_timeout: Duration::from_secs(1),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            lifetime: Duration::ZERO,
            poll_interval: Duration::from_millis(50),
            t1: Duration::from_secs(15),
            t2: Duration::from_secs(10),
            t3: Duration::from_secs(20),
            missing_tag: MissingTagPolicy::Fail,
        }
    }
}

fn field<T: FromStr>(name: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

impl DeviceSettings {
    /// Parses the pipe-delimited descriptor and validates the result.
    pub fn from_descriptor(descriptor: &str) -> Result<Self, SettingsError> {
        let fields: Vec<&str> = descriptor.trim().split('|').collect();
        if !(8..=9).contains(&fields.len()) {
            return Err(SettingsError::FieldCount(fields.len()));
        }

        let port: u32 = field("port", fields[1])?;
        if !(1..=u32::from(u16::MAX)).contains(&port) {
            return Err(SettingsError::OutOfRange("port"));
        }
        let settings = Self {
            ip: field("ip", fields[0])?,
            port: port as u16,
            common_address: field("common address", fields[2])?,
            originator: field("originator address", fields[3])?,
            params: AsduParams::new(
                field("cot length", fields[4])?,
                field("common address length", fields[5])?,
                field("ioa length", fields[6])?,
            ),
            max_read_times: field("max read times", fields[7])?,
            block_ranges: parse_block_ranges(fields.get(8).copied().unwrap_or(""))?,
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Renders the descriptor form; timeouts and policies are not included.
    pub fn to_descriptor(&self) -> String {
        let blocks = self
            .block_ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.ip,
            self.port,
            self.common_address,
            self.originator,
            self.params.cot_size,
            self.params.common_address_size,
            self.params.ioa_size,
            self.max_read_times,
            blocks
        )
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port == 0 {
            return Err(SettingsError::OutOfRange("port"));
        }
        if !self.params.is_valid() {
            return Err(SettingsError::OutOfRange("field lengths"));
        }
        if self.common_address == 0 || self.common_address > self.params.max_common_address() {
            return Err(SettingsError::OutOfRange("common address"));
        }
        // A one-octet cause of transmission has no originator field.
        if self.originator != 0 && self.params.cot_size == 1 {
            return Err(SettingsError::OutOfRange("originator address"));
        }
        if self.max_read_times == 0 {
            return Err(SettingsError::OutOfRange("max read times"));
        }
        if self.retry_count == 0 {
            return Err(SettingsError::OutOfRange("retry count"));
        }
        let timeouts = [
            ("connect timeout", self.connect_timeout),
            ("read timeout", self.read_timeout),
            ("write timeout", self.write_timeout),
            ("interrogation timeout", self.interrogation_timeout),
            ("ping timeout", self.ping_timeout),
            ("poll interval", self.poll_interval),
        ];
        if let Some(&(name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(SettingsError::OutOfRange(name));
        }
        if let Some(block) = self
            .block_ranges
            .iter()
            .find(|b| b.to > self.params.max_ioa())
        {
            return Err(SettingsError::InvalidBlockRange(block.to_string()));
        }
        self.session_config()
            .validate()
            .map_err(|_| SettingsError::OutOfRange("protocol timers"))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_params(self.params)
            .with_originator(self.originator)
            .with_connect_timeout(self.connect_timeout)
            .with_timers(self.t1, self.t2, self.t3)
    }

    /// Applies live timeout and retry changes; rejected values leave the
    /// settings untouched.
    pub fn tune(&mut self, tuning: &Tuning) -> Result<(), SettingsError> {
        let mut next = self.clone();
        if let Some(v) = tuning.read_timeout {
            next.read_timeout = v;
        }
        if let Some(v) = tuning.write_timeout {
            next.write_timeout = v;
        }
        if let Some(v) = tuning.interrogation_timeout {
            next.interrogation_timeout = v;
        }
        if let Some(v) = tuning.retry_count {
            next.retry_count = v;
        }
        if let Some(v) = tuning.retry_delay {
            next.retry_delay = v;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    pub fn with_interrogation_timeout(mut self, timeout: Duration) -> Self {
        self.interrogation_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_timers(mut self, t1: Duration, t2: Duration, t3: Duration) -> Self {
        self.t1 = t1;
        self.t2 = t2;
        self.t3 = t3;
        self
    }

    pub fn with_missing_tag(mut self, policy: MissingTagPolicy) -> Self {
        self.missing_tag = policy;
        self
    }
}

impl FromStr for DeviceSettings {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_descriptor(s)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_block_ranges, BlockRange, DeviceSettings, Tuning};
    use crate::SettingsError;
    use rustiec_core::types::TypeId;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn parses_descriptor_without_blocks() {
        let s = DeviceSettings::from_descriptor("10.0.0.5|2404|1|0|2|2|3|1|").unwrap();
        assert_eq!(s.ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(s.port, 2404);
        assert_eq!(s.common_address, 1);
        assert_eq!(s.originator, 0);
        assert_eq!(s.params.cot_size, 2);
        assert_eq!(s.params.common_address_size, 2);
        assert_eq!(s.params.ioa_size, 3);
        assert_eq!(s.max_read_times, 1);
        assert!(s.block_ranges.is_empty());
    }

    #[test]
    fn eight_field_descriptor_is_accepted() {
        let s: DeviceSettings = "192.168.1.20|2404|7|3|2|2|3|5".parse().unwrap();
        assert_eq!(s.common_address, 7);
        assert_eq!(s.originator, 3);
        assert_eq!(s.max_read_times, 5);
    }

    #[test]
    fn parses_block_ranges() {
        let s = DeviceSettings::from_descriptor("10.0.0.5|2404|1|0|2|2|3|4|13:100-120;M_SP_NA_1:1-16")
            .unwrap();
        assert_eq!(
            s.block_ranges,
            vec![
                BlockRange {
                    type_id: TypeId::MeasuredFloat,
                    from: 100,
                    to: 120
                },
                BlockRange {
                    type_id: TypeId::SinglePoint,
                    from: 1,
                    to: 16
                },
            ]
        );
        assert_eq!(
            s.to_descriptor(),
            "10.0.0.5|2404|1|0|2|2|3|4|13:100-120;1:1-16"
        );
    }

    #[test]
    fn invalid_ports_are_rejected() {
        for port in ["0", "65536", "-1", "x"] {
            let descriptor = format!("10.0.0.5|{port}|1|0|2|2|3|1|");
            assert!(
                DeviceSettings::from_descriptor(&descriptor).is_err(),
                "port {port} accepted"
            );
        }
        assert_eq!(
            DeviceSettings::from_descriptor("10.0.0.5|0|1|0|2|2|3|1|").unwrap_err(),
            SettingsError::OutOfRange("port")
        );
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let bad = [
            "10.0.0.5|2404|1|0|2|2|3",
            "10.0.0.5|2404|1|0|2|2|3|1||extra",
            "not-an-ip|2404|1|0|2|2|3|1|",
            "10.0.0.5|2404|0|0|2|2|3|1|",
            "10.0.0.5|2404|1|0|3|2|3|1|",
            "10.0.0.5|2404|1|0|2|2|4|1|",
            "10.0.0.5|2404|300|0|2|1|3|1|",
            "10.0.0.5|2404|1|0|2|2|3|0|",
            "10.0.0.5|2404|1|0|2|2|3|1|13:120-100",
            "10.0.0.5|2404|1|0|2|2|3|1|45:1-2",
            "10.0.0.5|2404|1|0|2|2|1|1|13:1-300",
        ];
        for descriptor in bad {
            assert!(
                DeviceSettings::from_descriptor(descriptor).is_err(),
                "{descriptor} accepted"
            );
        }
    }

    #[test]
    fn originator_needs_two_octet_cause() {
        assert_eq!(
            DeviceSettings::from_descriptor("10.0.0.5|2404|1|3|1|2|3|1|").unwrap_err(),
            SettingsError::OutOfRange("originator address")
        );
        let s = DeviceSettings::from_descriptor("10.0.0.5|2404|1|0|1|2|3|1|").unwrap();
        assert_eq!(s.params.cot_size, 1);
    }

    #[test]
    fn empty_block_segments_are_ignored() {
        assert!(parse_block_ranges("").unwrap().is_empty());
        assert_eq!(parse_block_ranges(" 1:1-2 ; ;").unwrap().len(), 1);
    }

    #[test]
    fn tune_rejects_invalid_values_atomically() {
        let mut s = DeviceSettings::default();
        let before = s.clone();
        let err = s.tune(&Tuning {
            read_timeout: Some(Duration::from_secs(9)),
            retry_count: Some(0),
            ..Tuning::default()
        });
        assert!(err.is_err());
        assert_eq!(s, before);

        s.tune(&Tuning {
            read_timeout: Some(Duration::from_secs(9)),
            ..Tuning::default()
        })
        .unwrap();
        assert_eq!(s.read_timeout, Duration::from_secs(9));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn settings_round_trip_through_json() {
        let s = DeviceSettings::from_descriptor("10.0.0.5|2404|1|0|2|2|3|2|13:1-5").unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: DeviceSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
