#![no_main]

use comlink::{archive::ArchiveReader, ArchiveConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(archive) = ArchiveReader::new(ArchiveConfig::lenient()).read(data) {
        let _ = archive.parse_objects();
        let _ = archive.imports();
    }
});
