/// Cause of transmission (6-bit reason code).
///
/// Codes without a standard meaning are kept as [`Reserved`](Self::Reserved)
/// so decoding never loses information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cause {
    Periodic,
    Background,
    Spontaneous,
    Initialized,
    Request,
    Activation,
    ActivationCon,
    Deactivation,
    DeactivationCon,
    ActivationTerm,
    ReturnInfoRemote,
    ReturnInfoLocal,
    FileTransfer,
    InterrogatedByStation,
    /// Group interrogation response, groups 1..=16.
    InterrogatedByGroup(u8),
    RequestByGeneralCounter,
    /// Counter interrogation response, groups 1..=4.
    RequestByGroupCounter(u8),
    UnknownTypeId,
    UnknownCause,
    UnknownCommonAddress,
    UnknownObjectAddress,
    Reserved(u8),
}

impl Cause {
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x3F {
            1 => Self::Periodic,
            2 => Self::Background,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationCon,
            8 => Self::Deactivation,
            9 => Self::DeactivationCon,
            10 => Self::ActivationTerm,
            11 => Self::ReturnInfoRemote,
            12 => Self::ReturnInfoLocal,
            13 => Self::FileTransfer,
            20 => Self::InterrogatedByStation,
            g @ 21..=36 => Self::InterrogatedByGroup(g - 20),
            37 => Self::RequestByGeneralCounter,
            g @ 38..=41 => Self::RequestByGroupCounter(g - 37),
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCause,
            46 => Self::UnknownCommonAddress,
            47 => Self::UnknownObjectAddress,
            other => Self::Reserved(other),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Periodic => 1,
            Self::Background => 2,
            Self::Spontaneous => 3,
            Self::Initialized => 4,
            Self::Request => 5,
            Self::Activation => 6,
            Self::ActivationCon => 7,
            Self::Deactivation => 8,
            Self::DeactivationCon => 9,
            Self::ActivationTerm => 10,
            Self::ReturnInfoRemote => 11,
            Self::ReturnInfoLocal => 12,
            Self::FileTransfer => 13,
            Self::InterrogatedByStation => 20,
            Self::InterrogatedByGroup(g) => (20 + g) & 0x3F,
            Self::RequestByGeneralCounter => 37,
            Self::RequestByGroupCounter(g) => (37 + g) & 0x3F,
            Self::UnknownTypeId => 44,
            Self::UnknownCause => 45,
            Self::UnknownCommonAddress => 46,
            Self::UnknownObjectAddress => 47,
            Self::Reserved(v) => v & 0x3F,
        }
    }

    /// Causes under which a station reports process values.
    pub const fn is_process_report(self) -> bool {
        matches!(
            self,
            Self::Periodic
                | Self::Background
                | Self::Spontaneous
                | Self::Request
                | Self::ReturnInfoRemote
                | Self::ReturnInfoLocal
                | Self::InterrogatedByStation
                | Self::InterrogatedByGroup(_)
                | Self::RequestByGeneralCounter
                | Self::RequestByGroupCounter(_)
        )
    }
}

/// Full cause-of-transmission octet: cause code plus test and P/N flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CauseOfTransmission {
    pub cause: Cause,
    pub negative: bool,
    pub test: bool,
}

impl CauseOfTransmission {
    pub const fn new(cause: Cause) -> Self {
        Self {
            cause,
            negative: false,
            test: false,
        }
    }

    pub const fn negative(cause: Cause) -> Self {
        Self {
            cause,
            negative: true,
            test: false,
        }
    }

    pub const fn from_u8(value: u8) -> Self {
        Self {
            cause: Cause::from_u8(value),
            negative: value & 0x40 != 0,
            test: value & 0x80 != 0,
        }
    }

    pub const fn to_u8(self) -> u8 {
        let mut out = self.cause.to_u8();
        if self.negative {
            out |= 0x40;
        }
        if self.test {
            out |= 0x80;
        }
        out
    }
}

impl From<Cause> for CauseOfTransmission {
    fn from(cause: Cause) -> Self {
        Self::new(cause)
    }
}
