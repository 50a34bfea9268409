#![no_main]
use std::io::Write;

use libfuzzer_sys::fuzz_target;
use rar_reader::Archive;

// Write the input as an archive file, then list it and read every entry.
fuzz_target!(|data: &[u8]| {
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if file.write_all(data).is_err() {
        return;
    }

    let Ok(mut archive) = Archive::open(file.path()) else {
        return;
    };
    let mut positions = Vec::new();
    while let Ok(Some(header)) = archive.next() {
        positions.push(header.block_pos);
        // Cap payload size to prevent OOM and timeouts
        if !header.is_dir() && header.unpacked_size <= 1024 * 1024 {
            let _ = archive.read_all();
        }
        if positions.len() > 1024 {
            break;
        }
    }
    for pos in positions.into_iter().rev().take(16) {
        let _ = archive.seek_pos(pos);
    }
    let _ = archive.close();
});
