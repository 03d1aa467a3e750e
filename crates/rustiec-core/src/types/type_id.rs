use crate::element::ElementKind;
use crate::types::time::TimeFormat;

macro_rules! type_ids {
    ($( $variant:ident = $value:literal, $mnemonic:literal, $kind:ident, $time:ident; )*) => {
        /// ASDU type identification.
        ///
        /// Each variant fixes the element codec and time tag carried by every
        /// information object of an ASDU.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum TypeId {
            $( $variant = $value, )*
        }

        impl TypeId {
            /// All supported type identifiers in ascending order.
            pub const ALL: &'static [TypeId] = &[$( TypeId::$variant, )*];

            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )*
                    _ => None,
                }
            }

            pub const fn to_u8(self) -> u8 {
                self as u8
            }

            /// Standard mnemonic, e.g. `M_ME_NC_1`.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Self::$variant => $mnemonic, )*
                }
            }

            /// Element codec carried by objects of this type.
            pub const fn element_kind(self) -> ElementKind {
                match self {
                    $( Self::$variant => ElementKind::$kind, )*
                }
            }

            /// Time tag appended to every element of this type.
            pub const fn time_format(self) -> TimeFormat {
                match self {
                    $( Self::$variant => TimeFormat::$time, )*
                }
            }
        }
    };
}

type_ids! {
    SinglePoint = 1, "M_SP_NA_1", SinglePoint, None;
    SinglePointCp24 = 2, "M_SP_TA_1", SinglePoint, Cp24;
    DoublePoint = 3, "M_DP_NA_1", DoublePoint, None;
    DoublePointCp24 = 4, "M_DP_TA_1", DoublePoint, Cp24;
    StepPosition = 5, "M_ST_NA_1", StepPosition, None;
    StepPositionCp24 = 6, "M_ST_TA_1", StepPosition, Cp24;
    Bitstring = 7, "M_BO_NA_1", Bitstring, None;
    BitstringCp24 = 8, "M_BO_TA_1", Bitstring, Cp24;
    MeasuredNormalized = 9, "M_ME_NA_1", Normalized, None;
    MeasuredNormalizedCp24 = 10, "M_ME_TA_1", Normalized, Cp24;
    MeasuredScaled = 11, "M_ME_NB_1", Scaled, None;
    MeasuredScaledCp24 = 12, "M_ME_TB_1", Scaled, Cp24;
    MeasuredFloat = 13, "M_ME_NC_1", Float, None;
    MeasuredFloatCp24 = 14, "M_ME_TC_1", Float, Cp24;
    IntegratedTotals = 15, "M_IT_NA_1", Counter, None;
    IntegratedTotalsCp24 = 16, "M_IT_TA_1", Counter, Cp24;
    ProtectionEventCp24 = 17, "M_EP_TA_1", ProtectionEvent, Cp24;
    PackedStartEventsCp24 = 18, "M_EP_TB_1", PackedStartEvents, Cp24;
    PackedOutputCircuitCp24 = 19, "M_EP_TC_1", PackedOutputCircuit, Cp24;
    PackedSinglePoint = 20, "M_PS_NA_1", PackedSinglePoint, None;
    MeasuredNormalizedNoQuality = 21, "M_ME_ND_1", NormalizedNoQuality, None;
    SinglePointCp56 = 30, "M_SP_TB_1", SinglePoint, Cp56;
    DoublePointCp56 = 31, "M_DP_TB_1", DoublePoint, Cp56;
    StepPositionCp56 = 32, "M_ST_TB_1", StepPosition, Cp56;
    BitstringCp56 = 33, "M_BO_TB_1", Bitstring, Cp56;
    MeasuredNormalizedCp56 = 34, "M_ME_TD_1", Normalized, Cp56;
    MeasuredScaledCp56 = 35, "M_ME_TE_1", Scaled, Cp56;
    MeasuredFloatCp56 = 36, "M_ME_TF_1", Float, Cp56;
    IntegratedTotalsCp56 = 37, "M_IT_TB_1", Counter, Cp56;
    ProtectionEventCp56 = 38, "M_EP_TD_1", ProtectionEvent, Cp56;
    PackedStartEventsCp56 = 39, "M_EP_TE_1", PackedStartEvents, Cp56;
    PackedOutputCircuitCp56 = 40, "M_EP_TF_1", PackedOutputCircuit, Cp56;
    SingleCommand = 45, "C_SC_NA_1", SingleCommand, None;
    DoubleCommand = 46, "C_DC_NA_1", DoubleCommand, None;
    RegulatingStepCommand = 47, "C_RC_NA_1", RegulatingStep, None;
    SetpointNormalized = 48, "C_SE_NA_1", SetpointNormalized, None;
    SetpointScaled = 49, "C_SE_NB_1", SetpointScaled, None;
    SetpointFloat = 50, "C_SE_NC_1", SetpointFloat, None;
    BitstringCommand = 51, "C_BO_NA_1", BitstringCommand, None;
    SingleCommandCp56 = 58, "C_SC_TA_1", SingleCommand, Cp56;
    DoubleCommandCp56 = 59, "C_DC_TA_1", DoubleCommand, Cp56;
    RegulatingStepCommandCp56 = 60, "C_RC_TA_1", RegulatingStep, Cp56;
    SetpointNormalizedCp56 = 61, "C_SE_TA_1", SetpointNormalized, Cp56;
    SetpointScaledCp56 = 62, "C_SE_TB_1", SetpointScaled, Cp56;
    SetpointFloatCp56 = 63, "C_SE_TC_1", SetpointFloat, Cp56;
    BitstringCommandCp56 = 64, "C_BO_TA_1", BitstringCommand, Cp56;
    EndOfInitialization = 70, "M_EI_NA_1", EndOfInitialization, None;
    Interrogation = 100, "C_IC_NA_1", Interrogation, None;
    CounterInterrogation = 101, "C_CI_NA_1", CounterInterrogation, None;
    Read = 102, "C_RD_NA_1", Read, None;
    ClockSync = 103, "C_CS_NA_1", ClockSync, None;
    Test = 104, "C_TS_NA_1", TestPattern, None;
    ResetProcess = 105, "C_RP_NA_1", ResetProcess, None;
    DelayAcquisition = 106, "C_CD_NA_1", DelayAcquisition, None;
    TestCp56 = 107, "C_TS_TA_1", TestCounter, Cp56;
    ParameterNormalized = 110, "P_ME_NA_1", ParameterNormalized, None;
    ParameterScaled = 111, "P_ME_NB_1", ParameterScaled, None;
    ParameterFloat = 112, "P_ME_NC_1", ParameterFloat, None;
    ParameterActivation = 113, "P_AC_NA_1", ParameterActivation, None;
}

impl TypeId {
    /// Looks up a type by its mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.mnemonic().eq_ignore_ascii_case(name))
    }

    /// Monitor-direction types carry process information from the station.
    pub const fn is_monitor(self) -> bool {
        matches!(self as u8, 1..=40 | 70)
    }

    /// Control-direction process commands (45..=64).
    pub const fn is_command(self) -> bool {
        matches!(self as u8, 45..=64)
    }

    /// Same element kind without a time tag, e.g. `M_ME_TF_1` to `M_ME_NC_1`.
    ///
    /// Protection event types only exist with a time tag and map to themselves.
    pub const fn without_time(self) -> Self {
        match self {
            Self::SinglePointCp24 | Self::SinglePointCp56 => Self::SinglePoint,
            Self::DoublePointCp24 | Self::DoublePointCp56 => Self::DoublePoint,
            Self::StepPositionCp24 | Self::StepPositionCp56 => Self::StepPosition,
            Self::BitstringCp24 | Self::BitstringCp56 => Self::Bitstring,
            Self::MeasuredNormalizedCp24 | Self::MeasuredNormalizedCp56 => {
                Self::MeasuredNormalized
            }
            Self::MeasuredScaledCp24 | Self::MeasuredScaledCp56 => Self::MeasuredScaled,
            Self::MeasuredFloatCp24 | Self::MeasuredFloatCp56 => Self::MeasuredFloat,
            Self::IntegratedTotalsCp24 | Self::IntegratedTotalsCp56 => Self::IntegratedTotals,
            Self::ProtectionEventCp56 => Self::ProtectionEventCp24,
            Self::PackedStartEventsCp56 => Self::PackedStartEventsCp24,
            Self::PackedOutputCircuitCp56 => Self::PackedOutputCircuitCp24,
            Self::SingleCommandCp56 => Self::SingleCommand,
            Self::DoubleCommandCp56 => Self::DoubleCommand,
            Self::RegulatingStepCommandCp56 => Self::RegulatingStepCommand,
            Self::SetpointNormalizedCp56 => Self::SetpointNormalized,
            Self::SetpointScaledCp56 => Self::SetpointScaled,
            Self::SetpointFloatCp56 => Self::SetpointFloat,
            Self::BitstringCommandCp56 => Self::BitstringCommand,
            Self::TestCp56 => Self::Test,
            other => other,
        }
    }

    /// Command type that writes a point reported with this monitor type.
    pub const fn command_for(self) -> Option<Self> {
        match self.without_time() {
            Self::SinglePoint => Some(Self::SingleCommand),
            Self::DoublePoint => Some(Self::DoubleCommand),
            Self::StepPosition => Some(Self::RegulatingStepCommand),
            Self::Bitstring => Some(Self::BitstringCommand),
            Self::MeasuredNormalized | Self::MeasuredNormalizedNoQuality => {
                Some(Self::SetpointNormalized)
            }
            Self::MeasuredScaled => Some(Self::SetpointScaled),
            Self::MeasuredFloat => Some(Self::SetpointFloat),
            _ => None,
        }
    }

    /// Inverse of [`command_for`](Self::command_for) for untimed commands.
    pub const fn monitor_for(self) -> Option<Self> {
        match self.without_time() {
            Self::SingleCommand => Some(Self::SinglePoint),
            Self::DoubleCommand => Some(Self::DoublePoint),
            Self::RegulatingStepCommand => Some(Self::StepPosition),
            Self::BitstringCommand => Some(Self::Bitstring),
            Self::SetpointNormalized => Some(Self::MeasuredNormalized),
            Self::SetpointScaled => Some(Self::MeasuredScaled),
            Self::SetpointFloat => Some(Self::MeasuredFloat),
            _ => None,
        }
    }
}

impl core::fmt::Display for TypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::TypeId;
    use crate::element::ElementKind;
    use crate::types::time::TimeFormat;

    #[test]
    fn numeric_roundtrip_for_all_types() {
        for t in TypeId::ALL {
            assert_eq!(TypeId::from_u8(t.to_u8()), Some(*t));
        }
        assert_eq!(TypeId::from_u8(0), None);
        assert_eq!(TypeId::from_u8(41), None);
        assert_eq!(TypeId::from_u8(120), None);
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(TypeId::from_mnemonic("M_ME_NC_1"), Some(TypeId::MeasuredFloat));
        assert_eq!(TypeId::from_mnemonic("c_ic_na_1"), Some(TypeId::Interrogation));
        assert_eq!(TypeId::from_mnemonic("M_XX_NA_1"), None);
    }

    #[test]
    fn layout_follows_type() {
        assert_eq!(TypeId::MeasuredFloatCp56.element_kind(), ElementKind::Float);
        assert_eq!(TypeId::MeasuredFloatCp56.time_format(), TimeFormat::Cp56);
        assert_eq!(TypeId::SinglePointCp24.time_format(), TimeFormat::Cp24);
        assert_eq!(TypeId::ClockSync.time_format(), TimeFormat::None);
    }

    #[test]
    fn command_mapping() {
        assert_eq!(
            TypeId::SinglePointCp56.command_for(),
            Some(TypeId::SingleCommand)
        );
        assert_eq!(
            TypeId::MeasuredNormalizedNoQuality.command_for(),
            Some(TypeId::SetpointNormalized)
        );
        assert_eq!(TypeId::IntegratedTotals.command_for(), None);
        assert_eq!(
            TypeId::SetpointFloatCp56.monitor_for(),
            Some(TypeId::MeasuredFloat)
        );
        assert!(TypeId::SetpointFloat.is_command());
        assert!(TypeId::EndOfInitialization.is_monitor());
        assert!(!TypeId::Interrogation.is_monitor());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_by_variant_name() {
        let json = serde_json::to_string(&TypeId::MeasuredFloat).unwrap();
        assert_eq!(json, "\"MeasuredFloat\"");
        let back: TypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TypeId::MeasuredFloat);
    }
}
