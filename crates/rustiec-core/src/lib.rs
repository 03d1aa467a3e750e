//! IEC 60870-5-104 protocol encoding and decoding in pure Rust.
//!
//! `rustiec-core` provides `no_std`-compatible encoding and decoding of
//! APCI frames, ASDU headers, and information elements. It forms the
//! foundation of the rustiec crate family and has no I/O of its own.
//!
//! # Feature flags
//!
//! - **`std`** (default): enables `std::error::Error` implementations and
//!   `SystemTime` conversions for time tags.
//! - **`alloc`** (default): enables the owned [`asdu::Asdu`] model.
//! - **`serde`**: derives `Serialize`/`Deserialize` on core types.
//! - **`defmt`**: derives `defmt::Format` for embedded logging.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// APCI framing: start byte, length, and I/S/U control fields.
pub mod apci;
/// Owned ASDU model with header and object encode/decode.
#[cfg(feature = "alloc")]
pub mod asdu;
/// Information element variants and their fixed-width codecs.
pub mod element;
/// Little-endian reader/writer over caller-owned buffers.
pub mod encoding;
/// Error types for encoding and decoding operations.
pub mod error;
/// Type identifiers, causes of transmission, quality descriptors, and time tags.
pub mod types;

pub use error::{DecodeError, EncodeError};
