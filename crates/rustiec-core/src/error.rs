use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    BufferTooSmall,
    ValueOutOfRange,
    InvalidLength,
    /// An element or time tag does not match the layout fixed by the type id.
    ShapeMismatch,
    Unsupported,
    Message(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("buffer too small"),
            Self::ValueOutOfRange => f.write_str("value out of range"),
            Self::InvalidLength => f.write_str("invalid length"),
            Self::ShapeMismatch => f.write_str("element shape does not match type id"),
            Self::Unsupported => f.write_str("operation unsupported"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof,
    InvalidLength,
    InvalidValue,
    /// The type identification byte names a type this crate cannot decode.
    UnsupportedType(u8),
    Unsupported,
    Message(&'static str),
}

impl DecodeError {
    /// True for malformed or truncated input, as opposed to a well-formed
    /// frame carrying an unknown type.
    pub const fn is_format_error(&self) -> bool {
        !matches!(self, Self::UnsupportedType(_) | Self::Unsupported)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => f.write_str("unexpected end of input"),
            Self::InvalidLength => f.write_str("invalid length"),
            Self::InvalidValue => f.write_str("invalid value"),
            Self::UnsupportedType(id) => write!(f, "unsupported type id {id}"),
            Self::Unsupported => f.write_str("operation unsupported"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::DecodeError;

    #[test]
    fn unsupported_type_is_not_a_format_error() {
        assert!(!DecodeError::UnsupportedType(120).is_format_error());
        assert!(DecodeError::UnexpectedEof.is_format_error());
        assert!(DecodeError::InvalidLength.is_format_error());
    }
}
