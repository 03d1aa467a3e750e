#![no_main]

use libfuzzer_sys::fuzz_target;
use rustiec_core::apci::MAX_ASDU_LEN;
use rustiec_core::asdu::{Asdu, AsduParams};
use rustiec_core::encoding::{reader::Reader, writer::Writer};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let params = AsduParams::new(1 + (selector & 1), 1 + ((selector >> 1) & 1), 1 + (selector >> 2) % 3);
    let mut r = Reader::new(payload);
    if let Ok(asdu) = Asdu::decode(&mut r, &params) {
        let mut buf = [0u8; MAX_ASDU_LEN];
        let mut w = Writer::new(&mut buf);
        let _ = asdu.encode(&mut w, &params);
    }
});
