/// Bounds-checked byte reader for decoding IEC 104 frames.
pub mod reader;
/// Byte writer for encoding IEC 104 frames into a caller-owned buffer.
pub mod writer;
