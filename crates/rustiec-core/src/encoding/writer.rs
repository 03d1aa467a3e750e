use crate::EncodeError;

#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn as_written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        if self.remaining() < 1 {
            return Err(EncodeError::BufferTooSmall);
        }
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if self.remaining() < data.len() {
            return Err(EncodeError::BufferTooSmall);
        }
        let end = self.pos + data.len();
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    pub fn write_le_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn write_le_i16(&mut self, value: i16) -> Result<(), EncodeError> {
        self.write_all(&value.to_le_bytes())
    }

    pub fn write_le_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a finite `f32`; NaN and infinities are rejected.
    pub fn write_le_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        if !value.is_finite() {
            return Err(EncodeError::ValueOutOfRange);
        }
        self.write_all(&value.to_le_bytes())
    }

    /// Writes `value` as a little-endian integer of 1 to 4 bytes.
    pub fn write_le_uint(&mut self, value: u32, width: u8) -> Result<(), EncodeError> {
        if !(1..=4).contains(&width) {
            return Err(EncodeError::InvalidLength);
        }
        if width < 4 && value >> (8 * u32::from(width)) != 0 {
            return Err(EncodeError::ValueOutOfRange);
        }
        self.write_all(&value.to_le_bytes()[..width as usize])
    }

    /// Overwrites an already written byte, used to patch length fields.
    pub fn patch_u8(&mut self, at: usize, value: u8) -> Result<(), EncodeError> {
        if at >= self.pos {
            return Err(EncodeError::InvalidLength);
        }
        self.buf[at] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;
    use crate::EncodeError;

    #[test]
    fn writer_writes_values() {
        let mut buf = [0u8; 4];
        let mut w = Writer::new(&mut buf);
        w.write_u8(1).unwrap();
        w.write_all(&[2, 3]).unwrap();
        assert_eq!(w.as_written(), &[1, 2, 3]);
    }

    #[test]
    fn writer_bounds() {
        let mut buf = [0u8; 1];
        let mut w = Writer::new(&mut buf);
        w.write_u8(1).unwrap();
        assert_eq!(w.write_u8(2).unwrap_err(), EncodeError::BufferTooSmall);
    }

    #[test]
    fn uint_width_must_hold_value() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        w.write_le_uint(0x01_0203, 3).unwrap();
        assert_eq!(w.as_written(), &[0x03, 0x02, 0x01]);
        assert_eq!(
            w.write_le_uint(0x100, 1).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
    }

    #[test]
    fn non_finite_float_rejected() {
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        assert_eq!(
            w.write_le_f32(f32::INFINITY).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
        assert_eq!(
            w.write_le_f32(f32::NAN).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
        w.write_le_f32(f32::MAX).unwrap();
        assert_eq!(w.position(), 4);
    }
}
