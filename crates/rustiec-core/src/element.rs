use crate::encoding::{reader::Reader, writer::Writer};
use crate::types::{Cp56Time2a, Quality};
use crate::{DecodeError, EncodeError};

/// Qualifier of interrogation requesting every point of the station.
pub const QOI_STATION: u8 = 20;
/// Fixed test bit pattern carried by `C_TS_NA_1`.
pub const TEST_PATTERN: u16 = 0x55AA;

/// Element codec selected by a type identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementKind {
    SinglePoint,
    DoublePoint,
    StepPosition,
    Bitstring,
    Normalized,
    Scaled,
    Float,
    Counter,
    ProtectionEvent,
    PackedStartEvents,
    PackedOutputCircuit,
    PackedSinglePoint,
    NormalizedNoQuality,
    SingleCommand,
    DoubleCommand,
    RegulatingStep,
    SetpointNormalized,
    SetpointScaled,
    SetpointFloat,
    BitstringCommand,
    EndOfInitialization,
    Interrogation,
    CounterInterrogation,
    Read,
    ClockSync,
    TestPattern,
    ResetProcess,
    DelayAcquisition,
    TestCounter,
    ParameterNormalized,
    ParameterScaled,
    ParameterFloat,
    ParameterActivation,
}

impl ElementKind {
    /// Encoded width in octets, excluding any time tag.
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::Read => 0,
            Self::SinglePoint
            | Self::DoublePoint
            | Self::SingleCommand
            | Self::DoubleCommand
            | Self::RegulatingStep
            | Self::EndOfInitialization
            | Self::Interrogation
            | Self::CounterInterrogation
            | Self::ResetProcess
            | Self::ParameterActivation => 1,
            Self::StepPosition
            | Self::NormalizedNoQuality
            | Self::TestPattern
            | Self::DelayAcquisition
            | Self::TestCounter => 2,
            Self::Normalized
            | Self::Scaled
            | Self::ProtectionEvent
            | Self::SetpointNormalized
            | Self::SetpointScaled
            | Self::ParameterNormalized
            | Self::ParameterScaled => 3,
            Self::PackedStartEvents | Self::PackedOutputCircuit | Self::BitstringCommand => 4,
            Self::Bitstring
            | Self::Float
            | Self::Counter
            | Self::PackedSinglePoint
            | Self::SetpointFloat
            | Self::ParameterFloat => 5,
            Self::ClockSync => 7,
        }
    }
}

/// Two-bit double point state (DPI / DCS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DoublePointValue {
    Intermediate = 0,
    Off = 1,
    On = 2,
    Indeterminate = 3,
}

impl DoublePointValue {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Intermediate,
            1 => Self::Off,
            2 => Self::On,
            _ => Self::Indeterminate,
        }
    }

    pub const fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Binary counter reading (BCR).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BinaryCounterReading {
    pub value: i32,
    /// Sequence number, 0..=31.
    pub sequence: u8,
    pub carry: bool,
    pub adjusted: bool,
    pub invalid: bool,
}

/// One information element value.
///
/// Each variant has the fixed width reported by [`ElementKind::encoded_len`].
/// Qualifier fields are range-checked on encode so that every encodable
/// value decodes back unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InformationElement {
    SinglePoint {
        value: bool,
        quality: Quality,
    },
    DoublePoint {
        value: DoublePointValue,
        quality: Quality,
    },
    StepPosition {
        /// -64..=63
        value: i8,
        transient: bool,
        quality: Quality,
    },
    Bitstring {
        value: u32,
        quality: Quality,
    },
    Normalized {
        value: i16,
        quality: Quality,
    },
    Scaled {
        value: i16,
        quality: Quality,
    },
    Float {
        value: f32,
        quality: Quality,
    },
    Counter(BinaryCounterReading),
    ProtectionEvent {
        state: DoublePointValue,
        elapsed_invalid: bool,
        quality: Quality,
        elapsed_ms: u16,
    },
    PackedStartEvents {
        /// GS, SL1..SL3, SIE, SRD in bits 0..=5.
        events: u8,
        elapsed_invalid: bool,
        quality: Quality,
        duration_ms: u16,
    },
    PackedOutputCircuit {
        /// GC, CL1..CL3 in bits 0..=3.
        circuits: u8,
        elapsed_invalid: bool,
        quality: Quality,
        operating_ms: u16,
    },
    PackedSinglePoint {
        status: u16,
        change: u16,
        quality: Quality,
    },
    NormalizedNoQuality(i16),
    SingleCommand {
        value: bool,
        qualifier: u8,
        select: bool,
    },
    DoubleCommand {
        value: DoublePointValue,
        qualifier: u8,
        select: bool,
    },
    RegulatingStep {
        /// 1 = lower, 2 = higher.
        step: u8,
        qualifier: u8,
        select: bool,
    },
    SetpointNormalized {
        value: i16,
        qualifier: u8,
        select: bool,
    },
    SetpointScaled {
        value: i16,
        qualifier: u8,
        select: bool,
    },
    SetpointFloat {
        value: f32,
        qualifier: u8,
        select: bool,
    },
    BitstringCommand(u32),
    EndOfInitialization {
        cause: u8,
        after_parameter_change: bool,
    },
    Interrogation {
        qualifier: u8,
    },
    CounterInterrogation {
        request: u8,
        freeze: u8,
    },
    Read,
    ClockSync(Cp56Time2a),
    TestPattern(u16),
    ResetProcess {
        qualifier: u8,
    },
    DelayAcquisition {
        delay_ms: u16,
    },
    TestCounter(u16),
    ParameterNormalized {
        value: i16,
        qualifier: u8,
    },
    ParameterScaled {
        value: i16,
        qualifier: u8,
    },
    ParameterFloat {
        value: f32,
        qualifier: u8,
    },
    ParameterActivation {
        qualifier: u8,
    },
}

fn check(cond: bool) -> Result<(), EncodeError> {
    if cond {
        Ok(())
    } else {
        Err(EncodeError::ValueOutOfRange)
    }
}

/// IEEE STD 754 values on the wire must be finite.
fn finite(value: f32) -> Result<f32, DecodeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DecodeError::InvalidValue)
    }
}

/// Point-information octets have no overflow bit.
fn point_flags(quality: &Quality) -> Result<u8, EncodeError> {
    check(!quality.overflow)?;
    Ok(quality.flags())
}

fn qualified(qualifier: u8, select: bool, max: u8) -> Result<u8, EncodeError> {
    check(qualifier <= max)?;
    Ok(if select { 0x80 } else { 0 })
}

impl InformationElement {
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::SinglePoint { .. } => ElementKind::SinglePoint,
            Self::DoublePoint { .. } => ElementKind::DoublePoint,
            Self::StepPosition { .. } => ElementKind::StepPosition,
            Self::Bitstring { .. } => ElementKind::Bitstring,
            Self::Normalized { .. } => ElementKind::Normalized,
            Self::Scaled { .. } => ElementKind::Scaled,
            Self::Float { .. } => ElementKind::Float,
            Self::Counter(_) => ElementKind::Counter,
            Self::ProtectionEvent { .. } => ElementKind::ProtectionEvent,
            Self::PackedStartEvents { .. } => ElementKind::PackedStartEvents,
            Self::PackedOutputCircuit { .. } => ElementKind::PackedOutputCircuit,
            Self::PackedSinglePoint { .. } => ElementKind::PackedSinglePoint,
            Self::NormalizedNoQuality(_) => ElementKind::NormalizedNoQuality,
            Self::SingleCommand { .. } => ElementKind::SingleCommand,
            Self::DoubleCommand { .. } => ElementKind::DoubleCommand,
            Self::RegulatingStep { .. } => ElementKind::RegulatingStep,
            Self::SetpointNormalized { .. } => ElementKind::SetpointNormalized,
            Self::SetpointScaled { .. } => ElementKind::SetpointScaled,
            Self::SetpointFloat { .. } => ElementKind::SetpointFloat,
            Self::BitstringCommand(_) => ElementKind::BitstringCommand,
            Self::EndOfInitialization { .. } => ElementKind::EndOfInitialization,
            Self::Interrogation { .. } => ElementKind::Interrogation,
            Self::CounterInterrogation { .. } => ElementKind::CounterInterrogation,
            Self::Read => ElementKind::Read,
            Self::ClockSync(_) => ElementKind::ClockSync,
            Self::TestPattern(_) => ElementKind::TestPattern,
            Self::ResetProcess { .. } => ElementKind::ResetProcess,
            Self::DelayAcquisition { .. } => ElementKind::DelayAcquisition,
            Self::TestCounter(_) => ElementKind::TestCounter,
            Self::ParameterNormalized { .. } => ElementKind::ParameterNormalized,
            Self::ParameterScaled { .. } => ElementKind::ParameterScaled,
            Self::ParameterFloat { .. } => ElementKind::ParameterFloat,
            Self::ParameterActivation { .. } => ElementKind::ParameterActivation,
        }
    }

    /// Quality descriptor for monitor-direction values that carry one.
    pub const fn quality(&self) -> Option<Quality> {
        match self {
            Self::SinglePoint { quality, .. }
            | Self::DoublePoint { quality, .. }
            | Self::StepPosition { quality, .. }
            | Self::Bitstring { quality, .. }
            | Self::Normalized { quality, .. }
            | Self::Scaled { quality, .. }
            | Self::Float { quality, .. }
            | Self::ProtectionEvent { quality, .. }
            | Self::PackedStartEvents { quality, .. }
            | Self::PackedOutputCircuit { quality, .. }
            | Self::PackedSinglePoint { quality, .. } => Some(*quality),
            _ => None,
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match *self {
            Self::SinglePoint { value, quality } => {
                w.write_u8(point_flags(&quality)? | u8::from(value))
            }
            Self::DoublePoint { value, quality } => {
                w.write_u8(point_flags(&quality)? | value.to_bits())
            }
            Self::StepPosition {
                value,
                transient,
                quality,
            } => {
                check((-64..=63).contains(&value))?;
                let vti = (value as u8 & 0x7F) | if transient { 0x80 } else { 0 };
                w.write_u8(vti)?;
                w.write_u8(quality.to_qds())
            }
            Self::Bitstring { value, quality } => {
                w.write_le_u32(value)?;
                w.write_u8(quality.to_qds())
            }
            Self::Normalized { value, quality } | Self::Scaled { value, quality } => {
                w.write_le_i16(value)?;
                w.write_u8(quality.to_qds())
            }
            Self::Float { value, quality } => {
                w.write_le_f32(value)?;
                w.write_u8(quality.to_qds())
            }
            Self::Counter(bcr) => {
                check(bcr.sequence <= 31)?;
                w.write_all(&bcr.value.to_le_bytes())?;
                let mut b = bcr.sequence;
                if bcr.carry {
                    b |= 0x20;
                }
                if bcr.adjusted {
                    b |= 0x40;
                }
                if bcr.invalid {
                    b |= 0x80;
                }
                w.write_u8(b)
            }
            Self::ProtectionEvent {
                state,
                elapsed_invalid,
                quality,
                elapsed_ms,
            } => {
                let ei = if elapsed_invalid { 0x08 } else { 0 };
                w.write_u8(point_flags(&quality)? | ei | state.to_bits())?;
                w.write_le_u16(elapsed_ms)
            }
            Self::PackedStartEvents {
                events: bits,
                elapsed_invalid,
                quality,
                duration_ms: ms,
            }
            | Self::PackedOutputCircuit {
                circuits: bits,
                elapsed_invalid,
                quality,
                operating_ms: ms,
            } => {
                let mask = if matches!(self, Self::PackedStartEvents { .. }) {
                    0x3F
                } else {
                    0x0F
                };
                check(bits & !mask == 0)?;
                w.write_u8(bits)?;
                let ei = if elapsed_invalid { 0x08 } else { 0 };
                w.write_u8(point_flags(&quality)? | ei)?;
                w.write_le_u16(ms)
            }
            Self::PackedSinglePoint {
                status,
                change,
                quality,
            } => {
                w.write_le_u16(status)?;
                w.write_le_u16(change)?;
                w.write_u8(quality.to_qds())
            }
            Self::NormalizedNoQuality(value) => w.write_le_i16(value),
            Self::SingleCommand {
                value,
                qualifier,
                select,
            } => {
                let se = qualified(qualifier, select, 31)?;
                w.write_u8(se | (qualifier << 2) | u8::from(value))
            }
            Self::DoubleCommand {
                value,
                qualifier,
                select,
            } => {
                let se = qualified(qualifier, select, 31)?;
                w.write_u8(se | (qualifier << 2) | value.to_bits())
            }
            Self::RegulatingStep {
                step,
                qualifier,
                select,
            } => {
                check(step <= 3)?;
                let se = qualified(qualifier, select, 31)?;
                w.write_u8(se | (qualifier << 2) | step)
            }
            Self::SetpointNormalized {
                value,
                qualifier,
                select,
            }
            | Self::SetpointScaled {
                value,
                qualifier,
                select,
            } => {
                let se = qualified(qualifier, select, 127)?;
                w.write_le_i16(value)?;
                w.write_u8(se | qualifier)
            }
            Self::SetpointFloat {
                value,
                qualifier,
                select,
            } => {
                let se = qualified(qualifier, select, 127)?;
                w.write_le_f32(value)?;
                w.write_u8(se | qualifier)
            }
            Self::BitstringCommand(value) => w.write_le_u32(value),
            Self::EndOfInitialization {
                cause,
                after_parameter_change,
            } => {
                check(cause <= 127)?;
                w.write_u8(cause | if after_parameter_change { 0x80 } else { 0 })
            }
            Self::Interrogation { qualifier }
            | Self::ResetProcess { qualifier }
            | Self::ParameterActivation { qualifier } => w.write_u8(qualifier),
            Self::CounterInterrogation { request, freeze } => {
                check(request <= 63 && freeze <= 3)?;
                w.write_u8(request | (freeze << 6))
            }
            Self::Read => Ok(()),
            Self::ClockSync(time) => time.encode(w),
            Self::TestPattern(v) | Self::TestCounter(v) => w.write_le_u16(v),
            Self::DelayAcquisition { delay_ms } => w.write_le_u16(delay_ms),
            Self::ParameterNormalized { value, qualifier }
            | Self::ParameterScaled { value, qualifier } => {
                w.write_le_i16(value)?;
                w.write_u8(qualifier)
            }
            Self::ParameterFloat { value, qualifier } => {
                w.write_le_f32(value)?;
                w.write_u8(qualifier)
            }
        }
    }

    pub fn decode(r: &mut Reader<'_>, kind: ElementKind) -> Result<Self, DecodeError> {
        Ok(match kind {
            ElementKind::SinglePoint => {
                let b = r.read_u8()?;
                Self::SinglePoint {
                    value: b & 0x01 != 0,
                    quality: Quality::from_flags(b),
                }
            }
            ElementKind::DoublePoint => {
                let b = r.read_u8()?;
                Self::DoublePoint {
                    value: DoublePointValue::from_bits(b),
                    quality: Quality::from_flags(b),
                }
            }
            ElementKind::StepPosition => {
                let vti = r.read_u8()?;
                let qds = r.read_u8()?;
                // Sign-extend the 7-bit value.
                let value = ((vti << 1) as i8) >> 1;
                Self::StepPosition {
                    value,
                    transient: vti & 0x80 != 0,
                    quality: Quality::from_qds(qds),
                }
            }
            ElementKind::Bitstring => Self::Bitstring {
                value: r.read_le_u32()?,
                quality: Quality::from_qds(r.read_u8()?),
            },
            ElementKind::Normalized => Self::Normalized {
                value: r.read_le_i16()?,
                quality: Quality::from_qds(r.read_u8()?),
            },
            ElementKind::Scaled => Self::Scaled {
                value: r.read_le_i16()?,
                quality: Quality::from_qds(r.read_u8()?),
            },
            ElementKind::Float => Self::Float {
                value: finite(r.read_le_f32()?)?,
                quality: Quality::from_qds(r.read_u8()?),
            },
            ElementKind::Counter => {
                let value = r.read_le_u32()? as i32;
                let b = r.read_u8()?;
                Self::Counter(BinaryCounterReading {
                    value,
                    sequence: b & 0x1F,
                    carry: b & 0x20 != 0,
                    adjusted: b & 0x40 != 0,
                    invalid: b & 0x80 != 0,
                })
            }
            ElementKind::ProtectionEvent => {
                let sep = r.read_u8()?;
                Self::ProtectionEvent {
                    state: DoublePointValue::from_bits(sep),
                    elapsed_invalid: sep & 0x08 != 0,
                    quality: Quality::from_flags(sep),
                    elapsed_ms: r.read_le_u16()?,
                }
            }
            ElementKind::PackedStartEvents => {
                let events = r.read_u8()? & 0x3F;
                let qdp = r.read_u8()?;
                Self::PackedStartEvents {
                    events,
                    elapsed_invalid: qdp & 0x08 != 0,
                    quality: Quality::from_flags(qdp),
                    duration_ms: r.read_le_u16()?,
                }
            }
            ElementKind::PackedOutputCircuit => {
                let circuits = r.read_u8()? & 0x0F;
                let qdp = r.read_u8()?;
                Self::PackedOutputCircuit {
                    circuits,
                    elapsed_invalid: qdp & 0x08 != 0,
                    quality: Quality::from_flags(qdp),
                    operating_ms: r.read_le_u16()?,
                }
            }
            ElementKind::PackedSinglePoint => Self::PackedSinglePoint {
                status: r.read_le_u16()?,
                change: r.read_le_u16()?,
                quality: Quality::from_qds(r.read_u8()?),
            },
            ElementKind::NormalizedNoQuality => Self::NormalizedNoQuality(r.read_le_i16()?),
            ElementKind::SingleCommand => {
                let b = r.read_u8()?;
                Self::SingleCommand {
                    value: b & 0x01 != 0,
                    qualifier: (b >> 2) & 0x1F,
                    select: b & 0x80 != 0,
                }
            }
            ElementKind::DoubleCommand => {
                let b = r.read_u8()?;
                Self::DoubleCommand {
                    value: DoublePointValue::from_bits(b),
                    qualifier: (b >> 2) & 0x1F,
                    select: b & 0x80 != 0,
                }
            }
            ElementKind::RegulatingStep => {
                let b = r.read_u8()?;
                Self::RegulatingStep {
                    step: b & 0x03,
                    qualifier: (b >> 2) & 0x1F,
                    select: b & 0x80 != 0,
                }
            }
            ElementKind::SetpointNormalized => {
                let value = r.read_le_i16()?;
                let qos = r.read_u8()?;
                Self::SetpointNormalized {
                    value,
                    qualifier: qos & 0x7F,
                    select: qos & 0x80 != 0,
                }
            }
            ElementKind::SetpointScaled => {
                let value = r.read_le_i16()?;
                let qos = r.read_u8()?;
                Self::SetpointScaled {
                    value,
                    qualifier: qos & 0x7F,
                    select: qos & 0x80 != 0,
                }
            }
            ElementKind::SetpointFloat => {
                let value = finite(r.read_le_f32()?)?;
                let qos = r.read_u8()?;
                Self::SetpointFloat {
                    value,
                    qualifier: qos & 0x7F,
                    select: qos & 0x80 != 0,
                }
            }
            ElementKind::BitstringCommand => Self::BitstringCommand(r.read_le_u32()?),
            ElementKind::EndOfInitialization => {
                let b = r.read_u8()?;
                Self::EndOfInitialization {
                    cause: b & 0x7F,
                    after_parameter_change: b & 0x80 != 0,
                }
            }
            ElementKind::Interrogation => Self::Interrogation {
                qualifier: r.read_u8()?,
            },
            ElementKind::CounterInterrogation => {
                let b = r.read_u8()?;
                Self::CounterInterrogation {
                    request: b & 0x3F,
                    freeze: b >> 6,
                }
            }
            ElementKind::Read => Self::Read,
            ElementKind::ClockSync => Self::ClockSync(Cp56Time2a::decode(r)?),
            ElementKind::TestPattern => Self::TestPattern(r.read_le_u16()?),
            ElementKind::ResetProcess => Self::ResetProcess {
                qualifier: r.read_u8()?,
            },
            ElementKind::DelayAcquisition => Self::DelayAcquisition {
                delay_ms: r.read_le_u16()?,
            },
            ElementKind::TestCounter => Self::TestCounter(r.read_le_u16()?),
            ElementKind::ParameterNormalized => Self::ParameterNormalized {
                value: r.read_le_i16()?,
                qualifier: r.read_u8()?,
            },
            ElementKind::ParameterScaled => Self::ParameterScaled {
                value: r.read_le_i16()?,
                qualifier: r.read_u8()?,
            },
            ElementKind::ParameterFloat => Self::ParameterFloat {
                value: finite(r.read_le_f32()?)?,
                qualifier: r.read_u8()?,
            },
            ElementKind::ParameterActivation => Self::ParameterActivation {
                qualifier: r.read_u8()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BinaryCounterReading, DoublePointValue, ElementKind, InformationElement};
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::types::Quality;
    use crate::{DecodeError, EncodeError};
    use proptest::prelude::*;

    fn roundtrip(element: InformationElement) -> InformationElement {
        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        element.encode(&mut w).unwrap();
        assert_eq!(w.position(), element.kind().encoded_len());
        let len = w.position();
        let mut r = Reader::new(&buf[..len]);
        let out = InformationElement::decode(&mut r, element.kind()).unwrap();
        assert!(r.is_empty());
        out
    }

    fn quality_strategy(allow_overflow: bool) -> impl Strategy<Value = Quality> {
        (any::<[bool; 5]>()).prop_map(move |b| Quality {
            invalid: b[0],
            not_topical: b[1],
            substituted: b[2],
            blocked: b[3],
            overflow: allow_overflow && b[4],
        })
    }

    fn dpi_strategy() -> impl Strategy<Value = DoublePointValue> {
        (0u8..4).prop_map(DoublePointValue::from_bits)
    }

    #[test]
    fn single_point_packs_quality_and_value() {
        let mut buf = [0u8; 1];
        let mut w = Writer::new(&mut buf);
        InformationElement::SinglePoint {
            value: true,
            quality: Quality {
                invalid: true,
                ..Quality::GOOD
            },
        }
        .encode(&mut w)
        .unwrap();
        assert_eq!(buf, [0x81]);
    }

    #[test]
    fn point_octets_reject_overflow_flag() {
        let mut buf = [0u8; 1];
        let mut w = Writer::new(&mut buf);
        let err = InformationElement::SinglePoint {
            value: false,
            quality: Quality {
                overflow: true,
                ..Quality::GOOD
            },
        }
        .encode(&mut w)
        .unwrap_err();
        assert_eq!(err, EncodeError::ValueOutOfRange);
    }

    #[test]
    fn scaled_boundaries_roundtrip() {
        for value in [i16::MIN, -1, 0, 1, i16::MAX] {
            let e = InformationElement::Scaled {
                value,
                quality: Quality::GOOD,
            };
            assert_eq!(roundtrip(e), e);
        }
    }

    #[test]
    fn non_finite_floats_rejected() {
        for value in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let mut buf = [0u8; 8];
            let mut w = Writer::new(&mut buf);
            let err = InformationElement::Float {
                value,
                quality: Quality::GOOD,
            }
            .encode(&mut w)
            .unwrap_err();
            assert_eq!(err, EncodeError::ValueOutOfRange);
        }
        let max = InformationElement::SetpointFloat {
            value: f32::MAX,
            qualifier: 0,
            select: false,
        };
        assert_eq!(roundtrip(max), max);
    }

    #[test]
    fn non_finite_floats_rejected_on_decode() {
        let kinds = [
            ElementKind::Float,
            ElementKind::SetpointFloat,
            ElementKind::ParameterFloat,
        ];
        for bits in [0x7F80_0000u32, 0xFF80_0000, 0x7FC0_0000] {
            let mut bytes = bits.to_le_bytes().to_vec();
            bytes.push(0);
            for kind in kinds {
                let mut r = Reader::new(&bytes);
                assert_eq!(
                    InformationElement::decode(&mut r, kind),
                    Err(DecodeError::InvalidValue),
                    "{bits:#010x} as {kind:?}"
                );
            }
        }
    }

    #[test]
    fn step_position_sign_extends() {
        let e = InformationElement::StepPosition {
            value: -64,
            transient: true,
            quality: Quality::GOOD,
        };
        assert_eq!(roundtrip(e), e);
    }

    #[test]
    fn read_has_no_payload() {
        assert_eq!(ElementKind::Read.encoded_len(), 0);
        assert_eq!(roundtrip(InformationElement::Read), InformationElement::Read);
    }

    #[test]
    fn truncated_element_fails_cleanly() {
        let mut r = Reader::new(&[0x00, 0x00, 0x80]);
        assert!(InformationElement::decode(&mut r, ElementKind::Float).is_err());
    }

    proptest! {
        #[test]
        fn single_point_roundtrip(value in any::<bool>(), quality in quality_strategy(false)) {
            let e = InformationElement::SinglePoint { value, quality };
            prop_assert_eq!(roundtrip(e), e);
        }

        #[test]
        fn double_point_roundtrip(value in dpi_strategy(), quality in quality_strategy(false)) {
            let e = InformationElement::DoublePoint { value, quality };
            prop_assert_eq!(roundtrip(e), e);
        }

        #[test]
        fn step_roundtrip(value in -64i8..=63, transient in any::<bool>(), quality in quality_strategy(true)) {
            let e = InformationElement::StepPosition { value, transient, quality };
            prop_assert_eq!(roundtrip(e), e);
        }

        #[test]
        fn measured_roundtrip(n in any::<i16>(), bits in any::<u32>(), quality in quality_strategy(true)) {
            for e in [
                InformationElement::Normalized { value: n, quality },
                InformationElement::Scaled { value: n, quality },
                InformationElement::Bitstring { value: bits, quality },
                InformationElement::NormalizedNoQuality(n),
            ] {
                prop_assert_eq!(roundtrip(e), e);
            }
        }

        #[test]
        fn float_roundtrip(value in proptest::num::f32::NORMAL | proptest::num::f32::ZERO | proptest::num::f32::SUBNORMAL,
                           quality in quality_strategy(true)) {
            let e = InformationElement::Float { value, quality };
            let out = roundtrip(e);
            match out {
                InformationElement::Float { value: v, quality: q } => {
                    prop_assert_eq!(v.to_bits(), value.to_bits());
                    prop_assert_eq!(q, quality);
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn float_decode_accepts_only_finite(bits in any::<u32>(), qds in any::<u8>()) {
            let mut bytes = bits.to_le_bytes().to_vec();
            bytes.push(qds);
            let decoded = InformationElement::decode(&mut Reader::new(&bytes), ElementKind::Float);
            prop_assert_eq!(decoded.is_ok(), f32::from_bits(bits).is_finite());
        }

        #[test]
        fn counter_roundtrip(value in any::<i32>(), sequence in 0u8..32, flags in any::<[bool; 3]>()) {
            let e = InformationElement::Counter(BinaryCounterReading {
                value,
                sequence,
                carry: flags[0],
                adjusted: flags[1],
                invalid: flags[2],
            });
            prop_assert_eq!(roundtrip(e), e);
        }

        #[test]
        fn protection_roundtrip(state in dpi_strategy(), ei in any::<bool>(), quality in quality_strategy(false),
                                ms in any::<u16>(), events in 0u8..64, circuits in 0u8..16) {
            for e in [
                InformationElement::ProtectionEvent { state, elapsed_invalid: ei, quality, elapsed_ms: ms },
                InformationElement::PackedStartEvents { events, elapsed_invalid: ei, quality, duration_ms: ms },
                InformationElement::PackedOutputCircuit { circuits, elapsed_invalid: ei, quality, operating_ms: ms },
            ] {
                prop_assert_eq!(roundtrip(e), e);
            }
        }

        #[test]
        fn command_roundtrip(value in any::<bool>(), dcs in dpi_strategy(), qu in 0u8..32, ql in 0u8..128,
                             select in any::<bool>(), n in any::<i16>(), step in 0u8..4) {
            for e in [
                InformationElement::SingleCommand { value, qualifier: qu, select },
                InformationElement::DoubleCommand { value: dcs, qualifier: qu, select },
                InformationElement::RegulatingStep { step, qualifier: qu, select },
                InformationElement::SetpointNormalized { value: n, qualifier: ql, select },
                InformationElement::SetpointScaled { value: n, qualifier: ql, select },
                InformationElement::SetpointFloat { value: f32::from(n) / 7.0, qualifier: ql, select },
            ] {
                prop_assert_eq!(roundtrip(e), e);
            }
        }

        #[test]
        fn system_roundtrip(q in any::<u8>(), request in 0u8..64, freeze in 0u8..4, word in any::<u16>(), coi in 0u8..128, bs in any::<bool>()) {
            for e in [
                InformationElement::Interrogation { qualifier: q },
                InformationElement::CounterInterrogation { request, freeze },
                InformationElement::ResetProcess { qualifier: q },
                InformationElement::DelayAcquisition { delay_ms: word },
                InformationElement::TestPattern(word),
                InformationElement::TestCounter(word),
                InformationElement::EndOfInitialization { cause: coi, after_parameter_change: bs },
                InformationElement::ParameterActivation { qualifier: q },
                InformationElement::ParameterScaled { value: word as i16, qualifier: q },
            ] {
                prop_assert_eq!(roundtrip(e), e);
            }
        }
    }
}
