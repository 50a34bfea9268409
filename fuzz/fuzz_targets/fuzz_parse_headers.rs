#![no_main]
use libfuzzer_sys::fuzz_target;
use rar_reader::engine::native::{rar4, rar5};

fuzz_target!(|data: &[u8]| {
    let _ = rar4::parse_block(data);
    let _ = rar5::header_len(data);
    let _ = rar5::parse_block(data);
});
