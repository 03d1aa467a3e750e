const OVERFLOW: u8 = 0x01;
const BLOCKED: u8 = 0x10;
const SUBSTITUTED: u8 = 0x20;
const NOT_TOPICAL: u8 = 0x40;
const INVALID: u8 = 0x80;

/// Quality descriptor flags shared by SIQ, DIQ, QDS and QDP octets.
///
/// `overflow` only exists in QDS; point information octets carry the
/// value in the low bits instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quality {
    pub invalid: bool,
    pub not_topical: bool,
    pub substituted: bool,
    pub blocked: bool,
    pub overflow: bool,
}

impl Quality {
    pub const GOOD: Self = Self {
        invalid: false,
        not_topical: false,
        substituted: false,
        blocked: false,
        overflow: false,
    };

    pub const fn is_good(&self) -> bool {
        !(self.invalid || self.not_topical || self.substituted || self.blocked || self.overflow)
    }

    /// Decodes the IV/NT/SB/BL bits of any quality-carrying octet.
    pub const fn from_flags(octet: u8) -> Self {
        Self {
            invalid: octet & INVALID != 0,
            not_topical: octet & NOT_TOPICAL != 0,
            substituted: octet & SUBSTITUTED != 0,
            blocked: octet & BLOCKED != 0,
            overflow: false,
        }
    }

    /// IV/NT/SB/BL bits, leaving the low nibble clear.
    pub const fn flags(&self) -> u8 {
        let mut out = 0;
        if self.invalid {
            out |= INVALID;
        }
        if self.not_topical {
            out |= NOT_TOPICAL;
        }
        if self.substituted {
            out |= SUBSTITUTED;
        }
        if self.blocked {
            out |= BLOCKED;
        }
        out
    }

    /// Decodes a full QDS octet including the overflow bit.
    pub const fn from_qds(octet: u8) -> Self {
        let mut q = Self::from_flags(octet);
        q.overflow = octet & OVERFLOW != 0;
        q
    }

    pub const fn to_qds(&self) -> u8 {
        let mut out = self.flags();
        if self.overflow {
            out |= OVERFLOW;
        }
        out
    }
}
