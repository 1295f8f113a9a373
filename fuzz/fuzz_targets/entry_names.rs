//! Fuzz target for entry name handling.
//!
//! Splits the input into names and stages, renames, looks up and removes
//! them in a fresh session under UTF-8 and GBK, then discards it. Lookups
//! must agree with what was staged.
//!
//! Run with: cargo +nightly fuzz run entry_names

#![no_main]

use libfuzzer_sys::fuzz_target;
use zipsession::{Archive, OpenFlags, OpenOptions};

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::TempDir::new() else {
        return;
    };
    let path = dir.path().join("names.zip");
    let names: Vec<String> = data
        .split(|&b| b == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect();

    for charset in ["utf-8", "gbk"] {
        let Ok(options) = OpenOptions::new().flags(OpenFlags::CREATE).charset(charset) else {
            continue;
        };
        let Ok(archive) = Archive::open_with(&path, options.name_cache(4)) else {
            continue;
        };
        for name in &names {
            if let Ok(index) = archive.add_bytes(name, name.as_bytes()) {
                assert_eq!(archive.index_of(name).ok().flatten(), Some(index));
            }
        }
        if let Some(first) = names.first() {
            let _ = archive.rename(0, &format!("{}~", first));
        }
        for name in names.iter().rev() {
            let _ = archive.remove_by_name(name);
        }
        let _ = archive.discard();
    }
});
