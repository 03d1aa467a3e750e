use crate::element::{DoublePointValue, InformationElement, QOI_STATION, TEST_PATTERN};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::types::{Cause, CauseOfTransmission, Cp56Time2a, TimeFormat, TimeTag, TypeId};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

/// Largest number of elements a single ASDU can announce.
pub const MAX_OBJECTS: usize = 127;

/// Field widths agreed out-of-band between both ends of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AsduParams {
    /// 1 or 2; the second octet carries the originator address.
    pub cot_size: u8,
    /// 1 or 2.
    pub common_address_size: u8,
    /// 1 to 3.
    pub ioa_size: u8,
}

impl AsduParams {
    /// Widths mandated by IEC 60870-5-104.
    pub const IEC104: Self = Self {
        cot_size: 2,
        common_address_size: 2,
        ioa_size: 3,
    };

    pub const fn new(cot_size: u8, common_address_size: u8, ioa_size: u8) -> Self {
        Self {
            cot_size,
            common_address_size,
            ioa_size,
        }
    }

    pub const fn is_valid(&self) -> bool {
        matches!(self.cot_size, 1 | 2)
            && matches!(self.common_address_size, 1 | 2)
            && matches!(self.ioa_size, 1..=3)
    }

    /// Octets before the first information object.
    pub const fn header_len(&self) -> usize {
        2 + self.cot_size as usize + self.common_address_size as usize
    }

    pub const fn max_common_address(&self) -> u16 {
        if self.common_address_size == 1 {
            0xFF
        } else {
            0xFFFF
        }
    }

    pub const fn max_ioa(&self) -> u32 {
        (1u32 << (8 * self.ioa_size as u32)) - 1
    }

    /// Encoded size of one non-sequence object of `type_id`.
    pub const fn object_len(&self, type_id: TypeId) -> usize {
        self.ioa_size as usize
            + type_id.element_kind().encoded_len()
            + type_id.time_format().encoded_len()
    }
}

impl Default for AsduParams {
    fn default() -> Self {
        Self::IEC104
    }
}

/// One element plus the time tag its type requires.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementGroup {
    pub element: InformationElement,
    pub time: Option<TimeTag>,
}

impl ElementGroup {
    pub const fn new(element: InformationElement) -> Self {
        Self {
            element,
            time: None,
        }
    }

    pub const fn with_time(element: InformationElement, time: TimeTag) -> Self {
        Self {
            element,
            time: Some(time),
        }
    }
}

/// An addressed information object.
///
/// Holds more than one group only inside a sequence ASDU, where group `i`
/// belongs to address `address + i`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InformationObject {
    pub address: u32,
    pub groups: Vec<ElementGroup>,
}

impl InformationObject {
    pub fn new(address: u32, element: InformationElement) -> Self {
        Self {
            address,
            groups: alloc::vec![ElementGroup::new(element)],
        }
    }

    pub fn with_time(address: u32, element: InformationElement, time: TimeTag) -> Self {
        Self {
            address,
            groups: alloc::vec![ElementGroup::with_time(element, time)],
        }
    }

    /// First element, the only one outside sequence ASDUs.
    pub fn element(&self) -> Option<&InformationElement> {
        self.groups.first().map(|g| &g.element)
    }
}

/// Application service data unit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asdu {
    pub type_id: TypeId,
    /// SQ bit: one address followed by consecutive elements.
    pub sequence: bool,
    pub cot: CauseOfTransmission,
    pub originator: u8,
    pub common_address: u16,
    pub objects: Vec<InformationObject>,
}

impl Asdu {
    pub fn new(type_id: TypeId, cot: impl Into<CauseOfTransmission>, common_address: u16) -> Self {
        Self {
            type_id,
            sequence: false,
            cot: cot.into(),
            originator: 0,
            common_address,
            objects: Vec::new(),
        }
    }

    pub fn with_originator(mut self, originator: u8) -> Self {
        self.originator = originator;
        self
    }

    pub fn with_object(mut self, object: InformationObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn push(&mut self, object: InformationObject) {
        self.objects.push(object);
    }

    /// Number of elements announced in the variable structure qualifier.
    pub fn element_count(&self) -> usize {
        if self.sequence {
            self.objects.first().map_or(0, |o| o.groups.len())
        } else {
            self.objects.len()
        }
    }

    /// Every element with its resolved address.
    pub fn points(&self) -> impl Iterator<Item = (u32, &ElementGroup)> + '_ {
        self.objects.iter().flat_map(|o| {
            o.groups
                .iter()
                .enumerate()
                .map(move |(i, g)| (o.address.wrapping_add(i as u32), g))
        })
    }

    /// Copy of this ASDU answered with a different cause, e.g. an activation
    /// confirmation.
    pub fn mirror(&self, cause: Cause, negative: bool) -> Self {
        let mut out = self.clone();
        out.cot = CauseOfTransmission {
            cause,
            negative,
            test: self.cot.test,
        };
        out
    }

    pub fn encoded_len(&self, params: &AsduParams) -> usize {
        let element_len =
            self.type_id.element_kind().encoded_len() + self.type_id.time_format().encoded_len();
        let objects = if self.sequence {
            params.ioa_size as usize + element_len * self.element_count()
        } else {
            (params.ioa_size as usize + element_len) * self.objects.len()
        };
        params.header_len() + objects
    }

    pub fn encode(&self, w: &mut Writer<'_>, params: &AsduParams) -> Result<(), EncodeError> {
        if !params.is_valid() {
            return Err(EncodeError::InvalidLength);
        }
        if self.common_address > params.max_common_address() {
            return Err(EncodeError::ValueOutOfRange);
        }
        let count = self.element_count();
        if count > MAX_OBJECTS {
            return Err(EncodeError::InvalidLength);
        }
        if self.sequence && (self.objects.len() != 1 || count == 0) {
            return Err(EncodeError::InvalidLength);
        }

        w.write_u8(self.type_id.to_u8())?;
        w.write_u8(count as u8 | if self.sequence { 0x80 } else { 0 })?;
        w.write_u8(self.cot.to_u8())?;
        if params.cot_size == 2 {
            w.write_u8(self.originator)?;
        }
        w.write_le_uint(u32::from(self.common_address), params.common_address_size)?;

        if self.sequence {
            let object = &self.objects[0];
            let last = object.address.checked_add(count as u32 - 1);
            if last.map_or(true, |a| a > params.max_ioa()) {
                return Err(EncodeError::ValueOutOfRange);
            }
            w.write_le_uint(object.address, params.ioa_size)?;
            for group in &object.groups {
                self.encode_group(w, group)?;
            }
        } else {
            for object in &self.objects {
                if object.groups.len() != 1 {
                    return Err(EncodeError::ShapeMismatch);
                }
                if object.address > params.max_ioa() {
                    return Err(EncodeError::ValueOutOfRange);
                }
                w.write_le_uint(object.address, params.ioa_size)?;
                self.encode_group(w, &object.groups[0])?;
            }
        }
        Ok(())
    }

    fn encode_group(&self, w: &mut Writer<'_>, group: &ElementGroup) -> Result<(), EncodeError> {
        if group.element.kind() != self.type_id.element_kind() {
            return Err(EncodeError::ShapeMismatch);
        }
        let expected = self.type_id.time_format();
        match (&group.time, expected) {
            (None, TimeFormat::None) => group.element.encode(w),
            (Some(tag), format) if tag.format() == format => {
                group.element.encode(w)?;
                tag.encode(w)
            }
            _ => Err(EncodeError::ShapeMismatch),
        }
    }

    /// Decodes one ASDU. The reader must span exactly that ASDU; trailing
    /// octets are rejected.
    pub fn decode(r: &mut Reader<'_>, params: &AsduParams) -> Result<Self, DecodeError> {
        if !params.is_valid() {
            return Err(DecodeError::InvalidLength);
        }
        let raw_type = r.read_u8()?;
        let type_id = TypeId::from_u8(raw_type).ok_or(DecodeError::UnsupportedType(raw_type))?;
        let vsq = r.read_u8()?;
        let sequence = vsq & 0x80 != 0;
        let count = usize::from(vsq & 0x7F);
        let cot = CauseOfTransmission::from_u8(r.read_u8()?);
        let originator = if params.cot_size == 2 {
            r.read_u8()?
        } else {
            0
        };
        let common_address = r.read_le_uint(params.common_address_size)? as u16;

        let mut objects = Vec::new();
        if sequence {
            if count == 0 {
                return Err(DecodeError::InvalidLength);
            }
            let address = r.read_le_uint(params.ioa_size)?;
            let mut groups = Vec::with_capacity(count);
            for _ in 0..count {
                groups.push(decode_group(r, type_id)?);
            }
            objects.push(InformationObject { address, groups });
        } else {
            for _ in 0..count {
                let address = r.read_le_uint(params.ioa_size)?;
                let group = decode_group(r, type_id)?;
                objects.push(InformationObject {
                    address,
                    groups: alloc::vec![group],
                });
            }
        }

        if !r.is_empty() {
            return Err(DecodeError::InvalidLength);
        }

        Ok(Self {
            type_id,
            sequence,
            cot,
            originator,
            common_address,
            objects,
        })
    }

    /// Station interrogation (`C_IC_NA_1`, IOA 0).
    pub fn interrogation(common_address: u16, qualifier: u8) -> Self {
        Self::new(TypeId::Interrogation, Cause::Activation, common_address).with_object(
            InformationObject::new(0, InformationElement::Interrogation { qualifier }),
        )
    }

    /// General interrogation of every point.
    pub fn station_interrogation(common_address: u16) -> Self {
        Self::interrogation(common_address, QOI_STATION)
    }

    pub fn counter_interrogation(common_address: u16, request: u8, freeze: u8) -> Self {
        Self::new(TypeId::CounterInterrogation, Cause::Activation, common_address).with_object(
            InformationObject::new(0, InformationElement::CounterInterrogation { request, freeze }),
        )
    }

    pub fn clock_sync(common_address: u16, time: Cp56Time2a) -> Self {
        Self::new(TypeId::ClockSync, Cause::Activation, common_address)
            .with_object(InformationObject::new(0, InformationElement::ClockSync(time)))
    }

    pub fn test_command(common_address: u16) -> Self {
        Self::new(TypeId::Test, Cause::Activation, common_address).with_object(
            InformationObject::new(0, InformationElement::TestPattern(TEST_PATTERN)),
        )
    }

    pub fn read_command(common_address: u16, address: u32) -> Self {
        Self::new(TypeId::Read, Cause::Request, common_address)
            .with_object(InformationObject::new(address, InformationElement::Read))
    }

    pub fn single_command(common_address: u16, address: u32, value: bool, select: bool) -> Self {
        Self::new(TypeId::SingleCommand, Cause::Activation, common_address).with_object(
            InformationObject::new(
                address,
                InformationElement::SingleCommand {
                    value,
                    qualifier: 0,
                    select,
                },
            ),
        )
    }

    pub fn double_command(
        common_address: u16,
        address: u32,
        value: DoublePointValue,
        select: bool,
    ) -> Self {
        Self::new(TypeId::DoubleCommand, Cause::Activation, common_address).with_object(
            InformationObject::new(
                address,
                InformationElement::DoubleCommand {
                    value,
                    qualifier: 0,
                    select,
                },
            ),
        )
    }
}

fn decode_group(r: &mut Reader<'_>, type_id: TypeId) -> Result<ElementGroup, DecodeError> {
    let element = InformationElement::decode(r, type_id.element_kind())?;
    let time = TimeTag::decode(r, type_id.time_format())?;
    Ok(ElementGroup { element, time })
}

#[cfg(test)]
mod tests {
    use super::{Asdu, AsduParams, ElementGroup, InformationObject};
    use crate::element::InformationElement;
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::types::{Cause, Cp24Time2a, Quality, TimeTag, TypeId};
    use crate::{DecodeError, EncodeError};
    use proptest::prelude::*;

    fn float(value: f32) -> InformationElement {
        InformationElement::Float {
            value,
            quality: Quality::GOOD,
        }
    }

    fn encode(asdu: &Asdu, params: &AsduParams) -> Vec<u8> {
        let mut buf = [0u8; 255];
        let mut w = Writer::new(&mut buf);
        asdu.encode(&mut w, params).unwrap();
        w.as_written().to_vec()
    }

    #[test]
    fn interrogation_wire_layout() {
        let bytes = encode(&Asdu::station_interrogation(1), &AsduParams::IEC104);
        assert_eq!(bytes, [100, 0x01, 0x06, 0x00, 0x01, 0x00, 0, 0, 0, 20]);
    }

    #[test]
    fn narrow_fields_drop_originator() {
        let asdu = Asdu::new(TypeId::MeasuredFloat, Cause::Spontaneous, 7)
            .with_originator(9)
            .with_object(InformationObject::new(0x0102, float(1.0)));
        let params = AsduParams::new(1, 1, 2);
        let bytes = encode(&asdu, &params);
        assert_eq!(bytes[..6], [13, 0x01, 0x03, 0x07, 0x02, 0x01]);

        let mut r = Reader::new(&bytes);
        let decoded = Asdu::decode(&mut r, &params).unwrap();
        assert_eq!(decoded.originator, 0);
        assert_eq!(decoded.objects, asdu.objects);
    }

    #[test]
    fn sequence_addresses_are_consecutive() {
        let mut asdu = Asdu::new(TypeId::MeasuredFloat, Cause::InterrogatedByStation, 1);
        asdu.sequence = true;
        asdu.push(InformationObject {
            address: 100,
            groups: vec![ElementGroup::new(float(1.0)), ElementGroup::new(float(2.0))],
        });
        let bytes = encode(&asdu, &AsduParams::IEC104);
        assert_eq!(bytes[1], 0x82);
        assert_eq!(bytes.len(), asdu.encoded_len(&AsduParams::IEC104));

        let mut r = Reader::new(&bytes);
        let decoded = Asdu::decode(&mut r, &AsduParams::IEC104).unwrap();
        let addresses: Vec<u32> = decoded.points().map(|(a, _)| a).collect();
        assert_eq!(addresses, vec![100, 101]);
    }

    #[test]
    fn mixed_shapes_rejected() {
        let asdu = Asdu::new(TypeId::MeasuredFloat, Cause::Spontaneous, 1).with_object(
            InformationObject::new(
                1,
                InformationElement::SinglePoint {
                    value: true,
                    quality: Quality::GOOD,
                },
            ),
        );
        let mut buf = [0u8; 64];
        let mut w = Writer::new(&mut buf);
        assert_eq!(
            asdu.encode(&mut w, &AsduParams::IEC104).unwrap_err(),
            EncodeError::ShapeMismatch
        );
    }

    #[test]
    fn missing_or_wrong_time_tag_rejected() {
        let untimed = Asdu::new(TypeId::MeasuredFloatCp56, Cause::Spontaneous, 1)
            .with_object(InformationObject::new(1, float(0.5)));
        let wrong = Asdu::new(TypeId::MeasuredFloatCp56, Cause::Spontaneous, 1).with_object(
            InformationObject::with_time(1, float(0.5), TimeTag::Cp24(Cp24Time2a::default())),
        );
        for asdu in [untimed, wrong] {
            let mut buf = [0u8; 64];
            let mut w = Writer::new(&mut buf);
            assert_eq!(
                asdu.encode(&mut w, &AsduParams::IEC104).unwrap_err(),
                EncodeError::ShapeMismatch
            );
        }
    }

    #[test]
    fn address_must_fit_width() {
        let asdu = Asdu::new(TypeId::MeasuredFloat, Cause::Spontaneous, 300)
            .with_object(InformationObject::new(1, float(0.5)));
        let mut buf = [0u8; 64];
        let mut w = Writer::new(&mut buf);
        assert_eq!(
            asdu.encode(&mut w, &AsduParams::new(2, 1, 3)).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
    }

    #[test]
    fn unknown_type_reported() {
        let mut r = Reader::new(&[120, 0x01, 0x0D, 0x00, 0x01, 0x00]);
        assert_eq!(
            Asdu::decode(&mut r, &AsduParams::IEC104).unwrap_err(),
            DecodeError::UnsupportedType(120)
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode(&Asdu::station_interrogation(1), &AsduParams::IEC104);
        bytes.push(0);
        let mut r = Reader::new(&bytes);
        assert_eq!(
            Asdu::decode(&mut r, &AsduParams::IEC104).unwrap_err(),
            DecodeError::InvalidLength
        );
    }

    fn params_strategy() -> impl Strategy<Value = AsduParams> {
        (1u8..=2, 1u8..=2, 1u8..=3).prop_map(|(c, a, i)| AsduParams::new(c, a, i))
    }

    proptest! {
        #[test]
        fn every_prefix_fails_cleanly(params in params_strategy(), values in proptest::collection::vec(-1.0e6f32..1.0e6, 1..20)) {
            let mut asdu = Asdu::new(TypeId::MeasuredFloat, Cause::Spontaneous, 1);
            for (i, v) in values.iter().enumerate() {
                asdu.push(InformationObject::new(i as u32 + 1, float(*v)));
            }
            let mut buf = [0u8; 255];
            let mut w = Writer::new(&mut buf);
            asdu.encode(&mut w, &params).unwrap();
            let bytes = w.as_written();

            for cut in 0..bytes.len() {
                let mut r = Reader::new(&bytes[..cut]);
                prop_assert!(Asdu::decode(&mut r, &params).is_err());
            }
            let mut r = Reader::new(bytes);
            prop_assert_eq!(Asdu::decode(&mut r, &params).unwrap(), asdu);
        }

        #[test]
        fn decode_never_panics(params in params_strategy(), bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut r = Reader::new(&bytes);
            let _ = Asdu::decode(&mut r, &params);
        }

        #[test]
        fn header_roundtrip(params in params_strategy(), cot in 0u8..=255, originator in any::<u8>(), ca in 1u16..=255, ioa in 0u32..=255) {
            let mut asdu = Asdu::new(TypeId::SinglePoint, crate::types::CauseOfTransmission::from_u8(cot), ca)
                .with_object(InformationObject::new(ioa, InformationElement::SinglePoint { value: true, quality: Quality::GOOD }));
            if params.cot_size == 2 {
                asdu.originator = originator;
            }
            let mut buf = [0u8; 32];
            let mut w = Writer::new(&mut buf);
            asdu.encode(&mut w, &params).unwrap();
            let mut r = Reader::new(w.as_written());
            prop_assert_eq!(Asdu::decode(&mut r, &params).unwrap(), asdu);
        }
    }
}
