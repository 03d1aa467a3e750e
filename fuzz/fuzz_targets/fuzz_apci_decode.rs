#![no_main]

use libfuzzer_sys::fuzz_target;
use rustiec_core::apci::{frame_len, Apci};
use rustiec_core::encoding::reader::Reader;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some(len)) = frame_len(data) {
        if len <= data.len() {
            let mut r = Reader::new(&data[..len]);
            let _ = Apci::decode(&mut r);
        }
    }
});
