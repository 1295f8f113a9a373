//! Fuzz target for opening arbitrary bytes as a ZIP archive.
//!
//! Opens the input read-only with the consistency check on and off, lists
//! every entry and reads each one to the end. Errors are expected; panics
//! and hangs are not.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use zipsession::{Archive, OpenFlags, Password};

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::TempDir::new() else {
        return;
    };
    let path = dir.path().join("input.zip");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    for flags in [
        OpenFlags::READ_ONLY,
        OpenFlags::READ_ONLY | OpenFlags::CHECK_CONSISTENCY,
    ] {
        let Ok(archive) = Archive::open(&path, flags) else {
            continue;
        };
        let password = Password::new("fuzz");
        for entry in archive.entries().flatten() {
            let _ = entry.name();
            let _ = entry.compression_method();
            let _ = entry.encryption_method();
            if let Ok(mut stream) = archive.input_stream(&entry, Some(&password)) {
                let mut buf = [0u8; 4096];
                while let Ok(n) = stream.read_chunk(&mut buf) {
                    if n == 0 {
                        break;
                    }
                }
            }
        }
        let _ = archive.comment();
        let _ = archive.close();
    }
});
