use clap::ValueEnum;
use rustiec_client::{DeviceSettings, PointKind};
use rustiec_core::asdu::AsduParams;
use std::net::IpAddr;
use std::time::Duration;

/// CLI-friendly selector for how a written value is interpreted.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ValueKindArg {
    Bool,
    Word,
    Int,
    Float,
    Text,
}

impl ValueKindArg {
    /// Convert to the client's [`PointKind`].
    pub const fn into_point_kind(self) -> PointKind {
        match self {
            Self::Bool => PointKind::Bool,
            Self::Word => PointKind::Word,
            Self::Int => PointKind::Int,
            Self::Float => PointKind::Float,
            Self::Text => PointKind::Text,
        }
    }
}

/// Settings for a standard-width IEC 104 device, for tools that take the
/// address on the command line instead of a descriptor.
pub fn device_settings(ip: IpAddr, port: u16, common_address: u16, timeout_ms: u64) -> DeviceSettings {
    let timeout = Duration::from_millis(timeout_ms.max(1));
    DeviceSettings {
        ip,
        port,
        common_address,
        params: AsduParams::IEC104,
        ..DeviceSettings::default()
    }
    .with_timeouts(timeout, timeout, timeout)
}
