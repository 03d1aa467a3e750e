use rustiec_core::element::InformationElement;
use rustiec_core::types::{Quality, TypeId};
use std::fmt;
use std::time::Instant;

/// Semantic kind of a point as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointKind {
    Bool,
    Word,
    Int,
    Float,
    Text,
}

/// A decoded point value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointValue {
    Bool(bool),
    Word(u16),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PointValue {
    pub fn kind(&self) -> PointKind {
        match self {
            Self::Bool(_) => PointKind::Bool,
            Self::Word(_) => PointKind::Word,
            Self::Int(_) => PointKind::Int,
            Self::Float(_) => PointKind::Float,
            Self::Text(_) => PointKind::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Word(v) => Some(f64::from(*v)),
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Integral view; floats qualify only when they have no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Word(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Text(_) => None,
            other => other.as_i64().and_then(|v| match v {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            }),
        }
    }

    /// Maps an information element onto the caller-facing value.
    ///
    /// Normalized values are scaled to `-1.0..1.0`. Elements that carry no
    /// process value (system commands) yield `None`.
    pub fn from_element(element: &InformationElement) -> Option<Self> {
        use InformationElement as E;
        let value = match *element {
            E::SinglePoint { value, .. } | E::SingleCommand { value, .. } => Self::Bool(value),
            E::DoublePoint { value, .. } | E::DoubleCommand { value, .. } => {
                Self::Word(u16::from(value.to_bits()))
            }
            E::ProtectionEvent { state, .. } => Self::Word(u16::from(state.to_bits())),
            E::StepPosition { value, .. } => Self::Int(i64::from(value)),
            E::RegulatingStep { step, .. } => Self::Word(u16::from(step)),
            E::Bitstring { value, .. } | E::BitstringCommand(value) => Self::Int(i64::from(value)),
            E::Normalized { value, .. }
            | E::NormalizedNoQuality(value)
            | E::SetpointNormalized { value, .. }
            | E::ParameterNormalized { value, .. } => Self::Float(normalized_to_f64(value)),
            E::Scaled { value, .. }
            | E::SetpointScaled { value, .. }
            | E::ParameterScaled { value, .. } => Self::Int(i64::from(value)),
            E::Float { value, .. }
            | E::SetpointFloat { value, .. }
            | E::ParameterFloat { value, .. } => Self::Float(f64::from(value)),
            E::Counter(bcr) => Self::Int(i64::from(bcr.value)),
            E::PackedStartEvents { events, .. } => Self::Word(u16::from(events)),
            E::PackedOutputCircuit { circuits, .. } => Self::Word(u16::from(circuits)),
            E::PackedSinglePoint { status, .. } => Self::Word(status),
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Word(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

pub fn normalized_to_f64(raw: i16) -> f64 {
    f64::from(raw) / 32768.0
}

/// Inverse of [`normalized_to_f64`]; `None` outside `-1.0..=1.0`.
///
/// `1.0` itself has no exact representation and saturates to `i16::MAX`.
pub fn f64_to_normalized(value: f64) -> Option<i16> {
    if !(-1.0..=1.0).contains(&value) {
        return None;
    }
    Some((value * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
}

/// A value as last reported by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: PointValue,
    pub type_id: TypeId,
    pub quality: Quality,
    pub received_at: Instant,
}

impl Sample {
    pub fn is_good(&self) -> bool {
        self.quality.is_good()
    }
}

#[cfg(test)]
mod tests {
    use super::{f64_to_normalized, normalized_to_f64, PointValue};
    use rustiec_core::element::{BinaryCounterReading, DoublePointValue, InformationElement};
    use rustiec_core::types::Quality;

    #[test]
    fn elements_map_to_values() {
        assert_eq!(
            PointValue::from_element(&InformationElement::SinglePoint {
                value: true,
                quality: Quality::GOOD
            }),
            Some(PointValue::Bool(true))
        );
        assert_eq!(
            PointValue::from_element(&InformationElement::DoublePoint {
                value: DoublePointValue::On,
                quality: Quality::GOOD
            }),
            Some(PointValue::Word(2))
        );
        assert_eq!(
            PointValue::from_element(&InformationElement::Normalized {
                value: -16384,
                quality: Quality::GOOD
            }),
            Some(PointValue::Float(-0.5))
        );
        assert_eq!(
            PointValue::from_element(&InformationElement::Counter(BinaryCounterReading {
                value: -7,
                ..BinaryCounterReading::default()
            })),
            Some(PointValue::Int(-7))
        );
        assert_eq!(
            PointValue::from_element(&InformationElement::Interrogation { qualifier: 20 }),
            None
        );
    }

    #[test]
    fn normalized_conversion_bounds() {
        assert_eq!(f64_to_normalized(-1.0), Some(i16::MIN));
        assert_eq!(f64_to_normalized(0.5), Some(16384));
        assert_eq!(f64_to_normalized(1.0), Some(i16::MAX));
        assert_eq!(f64_to_normalized(1.0001), None);
        assert_eq!(f64_to_normalized(f64::NAN), None);
        assert_eq!(normalized_to_f64(i16::MIN), -1.0);
    }

    #[test]
    fn bool_view_only_accepts_zero_and_one() {
        assert_eq!(PointValue::Word(1).as_bool(), Some(true));
        assert_eq!(PointValue::Float(0.0).as_bool(), Some(false));
        assert_eq!(PointValue::Int(2).as_bool(), None);
        assert_eq!(PointValue::Float(0.5).as_i64(), None);
    }
}
