#![no_main]

use comlink::coff::ObjectFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(ObjectFile::Coff(object)) = ObjectFile::parse(data) {
        for symbol in object.symbols() {
            let _ = symbol.name();
        }
        let _ = object.kind();
    }
});
