use crate::encoding::{reader::Reader, writer::Writer};
use crate::{DecodeError, EncodeError};

/// First octet of every APDU.
pub const START_BYTE: u8 = 0x68;
/// Start byte, length byte, and four control octets.
pub const APCI_LEN: usize = 6;
/// Largest value of the length octet.
pub const MAX_APDU_LEN: usize = 253;
/// Largest ASDU that fits behind the control field.
pub const MAX_ASDU_LEN: usize = MAX_APDU_LEN - 4;
/// Largest complete frame on the wire.
pub const MAX_FRAME_LEN: usize = MAX_APDU_LEN + 2;
/// Send and receive sequence numbers count modulo 2^15.
pub const SEQ_MODULO: u16 = 32_768;

/// Unnumbered control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UFunction {
    StartDtAct,
    StartDtCon,
    StopDtAct,
    StopDtCon,
    TestFrAct,
    TestFrCon,
}

impl UFunction {
    pub const fn to_u8(self) -> u8 {
        let bits = match self {
            Self::StartDtAct => 0x04,
            Self::StartDtCon => 0x08,
            Self::StopDtAct => 0x10,
            Self::StopDtCon => 0x20,
            Self::TestFrAct => 0x40,
            Self::TestFrCon => 0x80,
        };
        bits | 0x03
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x07 => Some(Self::StartDtAct),
            0x0B => Some(Self::StartDtCon),
            0x13 => Some(Self::StopDtAct),
            0x23 => Some(Self::StopDtCon),
            0x43 => Some(Self::TestFrAct),
            0x83 => Some(Self::TestFrCon),
            _ => None,
        }
    }

    /// Confirmation answering an activation; `None` for confirmations.
    pub const fn confirmation(self) -> Option<Self> {
        match self {
            Self::StartDtAct => Some(Self::StartDtCon),
            Self::StopDtAct => Some(Self::StopDtCon),
            Self::TestFrAct => Some(Self::TestFrCon),
            _ => None,
        }
    }
}

/// Application protocol control information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Apci {
    /// Numbered information transfer, always followed by an ASDU.
    I { send_seq: u16, recv_seq: u16 },
    /// Numbered supervisory acknowledgement.
    S { recv_seq: u16 },
    /// Unnumbered control function.
    U(UFunction),
}

impl Apci {
    /// Writes a complete frame: header, control field, and `asdu`.
    ///
    /// I-frames must carry an ASDU; S- and U-frames must not.
    pub fn encode(&self, w: &mut Writer<'_>, asdu: &[u8]) -> Result<(), EncodeError> {
        match self {
            Self::I { .. } if asdu.is_empty() => return Err(EncodeError::InvalidLength),
            Self::S { .. } | Self::U(_) if !asdu.is_empty() => {
                return Err(EncodeError::InvalidLength)
            }
            _ => {}
        }
        if asdu.len() > MAX_ASDU_LEN {
            return Err(EncodeError::InvalidLength);
        }

        w.write_u8(START_BYTE)?;
        w.write_u8((asdu.len() + 4) as u8)?;
        match *self {
            Self::I { send_seq, recv_seq } => {
                if send_seq >= SEQ_MODULO || recv_seq >= SEQ_MODULO {
                    return Err(EncodeError::ValueOutOfRange);
                }
                w.write_le_u16(send_seq << 1)?;
                w.write_le_u16(recv_seq << 1)?;
            }
            Self::S { recv_seq } => {
                if recv_seq >= SEQ_MODULO {
                    return Err(EncodeError::ValueOutOfRange);
                }
                w.write_all(&[0x01, 0x00])?;
                w.write_le_u16(recv_seq << 1)?;
            }
            Self::U(function) => w.write_all(&[function.to_u8(), 0, 0, 0])?,
        }
        w.write_all(asdu)
    }

    /// Decodes one frame and returns its control field and ASDU bytes.
    pub fn decode<'a>(r: &mut Reader<'a>) -> Result<(Self, &'a [u8]), DecodeError> {
        if r.read_u8()? != START_BYTE {
            return Err(DecodeError::InvalidValue);
        }
        let len = usize::from(r.read_u8()?);
        if len < 4 {
            return Err(DecodeError::InvalidLength);
        }
        let control = r.read_exact(4)?;
        let asdu = r.read_exact(len - 4)?;

        let apci = if control[0] & 0x01 == 0 {
            if asdu.is_empty() {
                return Err(DecodeError::InvalidLength);
            }
            Self::I {
                send_seq: u16::from_le_bytes([control[0], control[1]]) >> 1,
                recv_seq: u16::from_le_bytes([control[2], control[3]]) >> 1,
            }
        } else if control[0] & 0x03 == 0x01 {
            Self::S {
                recv_seq: u16::from_le_bytes([control[2], control[3]]) >> 1,
            }
        } else {
            Self::U(UFunction::from_u8(control[0]).ok_or(DecodeError::InvalidValue)?)
        };

        if !matches!(apci, Self::I { .. }) && !asdu.is_empty() {
            return Err(DecodeError::InvalidLength);
        }
        Ok((apci, asdu))
    }
}

/// Inspects the first two octets of a stream buffer.
///
/// Returns the total frame length once the header is available, `None` if
/// more bytes are needed, and an error if the buffer does not start with a
/// valid header.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
    match buf {
        [] => Ok(None),
        [first, ..] if *first != START_BYTE => Err(DecodeError::InvalidValue),
        [_] => Ok(None),
        [_, len, ..] if usize::from(*len) < 4 => Err(DecodeError::InvalidLength),
        [_, len, ..] => Ok(Some(usize::from(*len) + 2)),
    }
}

/// `seq + n` modulo 2^15.
pub const fn seq_add(seq: u16, n: u16) -> u16 {
    ((seq as u32 + n as u32) % SEQ_MODULO as u32) as u16
}

/// Number of steps from `from` forward to `to` modulo 2^15.
pub const fn seq_distance(from: u16, to: u16) -> u16 {
    ((to as u32 + SEQ_MODULO as u32 - from as u32) % SEQ_MODULO as u32) as u16
}
