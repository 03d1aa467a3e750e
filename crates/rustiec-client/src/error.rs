use rustiec_core::types::TypeId;
use rustiec_link::LinkError;
use thiserror::Error;

/// Rejections raised while building or validating [`DeviceSettings`](crate::DeviceSettings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("descriptor has {0} fields, expected 8 or 9")]
    FieldCount(usize),
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("{0} out of range")]
    OutOfRange(&'static str),
    #[error("invalid block range {0:?}")]
    InvalidBlockRange(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("encode error: {0}")]
    Encode(#[from] rustiec_core::EncodeError),
    #[error("not connected")]
    NotConnected,
    #[error("connect failed after {attempts} attempt(s)")]
    ConnectFailed { attempts: u32 },
    #[error("no value received for IOA {ioa}")]
    NotFound { ioa: u32 },
    #[error("command for IOA {ioa} was not acknowledged")]
    NotAcknowledged { ioa: u32 },
    #[error("request timed out")]
    Timeout,
    #[error("value {value:?} cannot be written with {type_id:?}")]
    UnsupportedValue { type_id: Option<TypeId>, value: String },
    #[error("invalid point address {0:?}")]
    InvalidAddress(String),
    #[error("adapter shut down")]
    Shutdown,
}

impl ClientError {
    /// Whether retrying the same request cannot succeed.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::NotAcknowledged { .. }
                | Self::Shutdown
                | Self::Encode(_)
                | Self::Link(LinkError::Encode(_))
                | Self::UnsupportedValue { .. }
                | Self::InvalidAddress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ClientError;
    use rustiec_core::EncodeError;
    use rustiec_link::LinkError;

    #[test]
    fn unencodable_requests_are_final() {
        assert!(ClientError::Link(LinkError::Encode(EncodeError::ValueOutOfRange)).is_final());
        assert!(ClientError::Encode(EncodeError::BufferTooSmall).is_final());
        assert!(ClientError::NotAcknowledged { ioa: 1 }.is_final());
        assert!(!ClientError::Timeout.is_final());
        assert!(!ClientError::Link(LinkError::SendTimeout).is_final());
        assert!(!ClientError::ConnectFailed { attempts: 2 }.is_final());
    }
}
