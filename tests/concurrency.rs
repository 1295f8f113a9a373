//! Concurrency tests.
//!
//! A session is shared between threads by reference. Reads from different
//! threads must not interfere, and a close on one thread must orphan the
//! streams other threads hold.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{random_bytes, scratch};
use sha2::{Digest, Sha256};
use zipsession::{Archive, CompressionMethod, OpenFlags};

fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn stream_digest(archive: &Archive, name: &str) -> [u8; 32] {
    let mut stream = archive.input_stream_by_name(name, None).unwrap();
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read_chunk(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    hasher.finalize().into()
}

// =============================================================================
// Parallel Reads
// =============================================================================

#[test]
fn test_two_threads_read_two_entries() {
    let (_dir, path) = scratch();
    let first = random_bytes(256 * 1024, 1);
    let second = random_bytes(256 * 1024, 2);

    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    let a = archive.add_bytes("first.bin", &first).unwrap();
    archive.add_bytes("second.bin", &second).unwrap();
    archive
        .set_compression_method(a, CompressionMethod::Store, 0)
        .unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let (got_first, got_second) = thread::scope(|s| {
        let one = s.spawn(|| stream_digest(&archive, "first.bin"));
        let two = s.spawn(|| stream_digest(&archive, "second.bin"));
        (one.join().unwrap(), two.join().unwrap())
    });

    assert_eq!(got_first, digest(&first));
    assert_eq!(got_second, digest(&second));
}

#[test]
fn test_many_threads_read_same_entry() {
    let (_dir, path) = scratch();
    let data = random_bytes(64 * 1024, 3);
    common::create_archive(&path, &[("shared.bin", &data)]).unwrap();
    let expected = digest(&data);

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| assert_eq!(stream_digest(&archive, "shared.bin"), expected));
        }
    });
}

#[test]
fn test_shared_through_arc() {
    let (_dir, path) = scratch();
    common::create_archive(&path, &[("a.txt", b"alpha"), ("b.txt", b"beta")]).unwrap();

    let archive = Arc::new(Archive::open(&path, OpenFlags::READ_ONLY).unwrap());
    let handles: Vec<_> = ["a.txt", "b.txt"]
        .into_iter()
        .map(|name| {
            let archive = Arc::clone(&archive);
            thread::spawn(move || {
                let entry = archive.entry(name).unwrap().unwrap();
                (name, entry.size())
            })
        })
        .collect();

    let mut sizes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    sizes.sort();
    assert_eq!(sizes, [("a.txt", 5), ("b.txt", 4)]);
}

// =============================================================================
// Mixed Reads And Writes
// =============================================================================

#[test]
fn test_lookups_while_adding() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    archive.add_bytes("anchor.txt", b"anchor").unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..100 {
                archive
                    .add_bytes(&format!("added{}.txt", i), b"x")
                    .unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..100 {
                assert_eq!(archive.index_of("anchor.txt").unwrap(), Some(0));
            }
        });
    });

    assert_eq!(archive.len().unwrap(), 101);
    archive.discard().unwrap();
}

#[test]
fn test_close_orphans_stream_on_other_thread() {
    let (_dir, path) = scratch();
    let data = random_bytes(4096, 4);
    common::create_archive(&path, &[("data.bin", &data)]).unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let opened = Barrier::new(2);
    let closed = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            let mut stream = archive.input_stream_by_name("data.bin", None).unwrap();
            let mut buf = [0u8; 16];
            assert_eq!(stream.read_chunk(&mut buf).unwrap(), 16);
            opened.wait();
            closed.wait();
            assert!(stream.read_chunk(&mut buf).unwrap_err().is_closed());
        });
        s.spawn(|| {
            opened.wait();
            archive.close().unwrap();
            closed.wait();
        });
    });
}

#[test]
fn test_concurrent_close_commits_once() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    archive.add_bytes("once.txt", b"once").unwrap();

    let start = Barrier::new(4);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                start.wait();
                archive.close().unwrap();
            });
        }
    });

    assert_eq!(common::read_all(&path).len(), 1);
}
