//! Address and value-type resolution for user-facing point strings.

use crate::cache::LearnedTypes;
use crate::value::{PointKind, PointValue};
use crate::ClientError;
use rustiec_core::asdu::AsduParams;
use rustiec_core::types::TypeId;

/// Largest address a three-octet IOA can carry.
pub const MAX_IOA: u32 = AsduParams::IEC104.max_ioa();

/// A resolved point: its IOA and, when known, the value type it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointAddress {
    pub ioa: u32,
    pub type_id: Option<TypeId>,
}

/// Resolves `"<type>:<ioa>"` or a bare `"<ioa>"`.
///
/// The type may be a number (`13`) or a mnemonic (`M_ME_NC_1`). A bare IOA
/// picks up the type previously learned for it, if any. Addresses above
/// [`MAX_IOA`] are rejected.
pub fn resolve(address: &str, learned: &LearnedTypes) -> Result<PointAddress, ClientError> {
    let invalid = || ClientError::InvalidAddress(address.to_string());
    let parse_ioa = |raw: &str| {
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|ioa| *ioa <= MAX_IOA)
            .ok_or_else(invalid)
    };
    let address = address.trim();
    match address.split_once(':') {
        Some((type_part, ioa)) => {
            let type_part = type_part.trim();
            let type_id = type_part
                .parse::<u8>()
                .ok()
                .and_then(TypeId::from_u8)
                .or_else(|| TypeId::from_mnemonic(type_part))
                .ok_or_else(invalid)?;
            let ioa = parse_ioa(ioa)?;
            Ok(PointAddress {
                ioa,
                type_id: Some(type_id),
            })
        }
        None => {
            let ioa = parse_ioa(address)?;
            Ok(PointAddress {
                ioa,
                type_id: learned.get(ioa),
            })
        }
    }
}

/// Infers the value kind of a raw string.
///
/// Fixed precedence: boolean tokens (`0`, `1`, `true`, `false`), then
/// integers fitting `u16` (word), then other integers, then decimals, then
/// text. This is a convenience policy for writes without a known type and
/// callers with stronger type information should pass it instead.
pub fn infer_kind(raw: &str) -> PointKind {
    let raw = raw.trim();
    if matches!(raw, "0" | "1") || raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        PointKind::Bool
    } else if raw.parse::<u16>().is_ok() {
        PointKind::Word
    } else if raw.parse::<i64>().is_ok() {
        PointKind::Int
    } else if raw.parse::<f64>().is_ok_and(f64::is_finite) {
        PointKind::Float
    } else {
        PointKind::Text
    }
}

/// Parses `raw` as a value of `kind`.
pub fn parse_value(raw: &str, kind: PointKind) -> Result<PointValue, ClientError> {
    let trimmed = raw.trim();
    let invalid = || ClientError::UnsupportedValue {
        type_id: None,
        value: raw.to_string(),
    };
    Ok(match kind {
        PointKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => PointValue::Bool(true),
            "0" | "false" | "off" => PointValue::Bool(false),
            _ => return Err(invalid()),
        },
        PointKind::Word => PointValue::Word(trimmed.parse().map_err(|_| invalid())?),
        PointKind::Int => PointValue::Int(trimmed.parse().map_err(|_| invalid())?),
        PointKind::Float => {
            let value: f64 = trimmed.parse().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            PointValue::Float(value)
        }
        PointKind::Text => PointValue::Text(raw.to_string()),
    })
}

/// Infers the kind of `raw` and parses it accordingly.
pub fn parse_inferred(raw: &str) -> PointValue {
    match parse_value(raw, infer_kind(raw)) {
        Ok(value) => value,
        Err(_) => PointValue::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_kind, parse_inferred, parse_value, resolve, PointAddress, MAX_IOA};
    use crate::cache::LearnedTypes;
    use crate::ClientError;
    use crate::value::{PointKind, PointValue};
    use rustiec_core::types::TypeId;

    #[test]
    fn explicit_type_forms() {
        let learned = LearnedTypes::new();
        assert_eq!(
            resolve("13:100", &learned).unwrap(),
            PointAddress {
                ioa: 100,
                type_id: Some(TypeId::MeasuredFloat)
            }
        );
        assert_eq!(
            resolve("m_sp_na_1:7", &learned).unwrap().type_id,
            Some(TypeId::SinglePoint)
        );
        assert!(resolve("99:1", &learned).is_err());
        assert!(resolve("13:x", &learned).is_err());
    }

    #[test]
    fn addresses_beyond_three_octets_are_rejected() {
        let learned = LearnedTypes::new();
        assert_eq!(resolve("16777215", &learned).unwrap().ioa, MAX_IOA);
        assert!(matches!(
            resolve("16777216", &learned),
            Err(ClientError::InvalidAddress(_))
        ));
        assert!(resolve("13:16777216", &learned).is_err());
    }

    #[test]
    fn bare_ioa_uses_learned_type() {
        let learned = LearnedTypes::new();
        assert_eq!(resolve("42", &learned).unwrap().type_id, None);
        learned.learn(42, TypeId::MeasuredScaled);
        assert_eq!(
            resolve(" 42 ", &learned).unwrap().type_id,
            Some(TypeId::MeasuredScaled)
        );
    }

    #[test]
    fn inference_precedence() {
        assert_eq!(infer_kind("1"), PointKind::Bool);
        assert_eq!(infer_kind("TRUE"), PointKind::Bool);
        assert_eq!(infer_kind("2"), PointKind::Word);
        assert_eq!(infer_kind("65535"), PointKind::Word);
        assert_eq!(infer_kind("65536"), PointKind::Int);
        assert_eq!(infer_kind("-3"), PointKind::Int);
        assert_eq!(infer_kind("2.5"), PointKind::Float);
        assert_eq!(infer_kind("NaN"), PointKind::Text);
        assert_eq!(infer_kind("open"), PointKind::Text);
    }

    #[test]
    fn parses_values() {
        assert_eq!(parse_inferred("false"), PointValue::Bool(false));
        assert_eq!(parse_inferred("300"), PointValue::Word(300));
        assert_eq!(parse_inferred("-1.25"), PointValue::Float(-1.25));
        assert_eq!(
            parse_value("on", PointKind::Bool).unwrap(),
            PointValue::Bool(true)
        );
        assert!(parse_value("inf", PointKind::Float).is_err());
    }
}
