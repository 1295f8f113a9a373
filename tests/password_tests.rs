//! Password and encryption tests.
//!
//! These tests verify:
//! - Encrypting entries requires a per-call or default password
//! - Wrong and missing passwords surface on the first read, not on open
//! - The session default password is used for reads and re-encoding
//! - Encrypted entries survive unrelated edits with their encryption intact
//! - Edits never write an encrypted entry back without its encryption
//! - Entries can be decrypted and re-keyed

#![cfg(feature = "aes")]

mod common;

use common::{read_entry, repetitive_text, scratch};
use zipsession::{
    Archive, EncryptionMethod, Error, OpenFlags, OpenOptions, Password, PasswordDetectionMethod,
};

const SECRET: &[u8] = b"top secret payload, nobody should read this";

fn encrypted_archive(path: &std::path::Path, method: EncryptionMethod, password: &str) {
    let archive = Archive::open(path, OpenFlags::CREATE).unwrap();
    let index = archive.add_bytes("secret.txt", SECRET).unwrap();
    archive
        .set_encryption_method(index, method, Some(&Password::new(password)))
        .unwrap();
    archive.add_bytes("public.txt", b"anyone can read this").unwrap();
    archive.close().unwrap();
}

// =============================================================================
// Setting Encryption
// =============================================================================

#[test]
fn test_encryption_requires_password() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    let index = archive.add_bytes("a.txt", b"a").unwrap();

    let err = archive
        .set_encryption_method(index, EncryptionMethod::Aes256, None)
        .unwrap_err();
    assert!(matches!(err, Error::PasswordRequired));
    assert!(err.is_encryption_error());

    // No password is needed to turn encryption off.
    archive
        .set_encryption_method(index, EncryptionMethod::None, None)
        .unwrap();
    archive.discard().unwrap();
}

#[test]
fn test_empty_password_rejected() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    let index = archive.add_bytes("a.txt", b"a").unwrap();
    let err = archive
        .set_encryption_method(index, EncryptionMethod::Aes128, Some(&Password::new("")))
        .unwrap_err();
    assert!(err.is_invalid_argument());
    archive.discard().unwrap();
}

#[test]
fn test_decode_only_methods_rejected() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    let index = archive.add_bytes("a.txt", b"a").unwrap();
    let pw = Password::new("pw");
    for method in [EncryptionMethod::TradPkware, EncryptionMethod::Unknown] {
        let err = archive
            .set_encryption_method(index, method, Some(&pw))
            .unwrap_err();
        assert!(err.is_invalid_argument(), "{:?}", method);
    }
    archive.discard().unwrap();
}

#[test]
fn test_default_password_satisfies_encryption() {
    let (_dir, path) = scratch();
    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    archive
        .set_default_password(Some(Password::new("fallback")))
        .unwrap();
    let index = archive.add_bytes("secret.txt", SECRET).unwrap();
    archive
        .set_encryption_method(index, EncryptionMethod::Aes192, None)
        .unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let entry = archive.entry("secret.txt").unwrap().unwrap();
    assert_eq!(entry.encryption_method(), EncryptionMethod::Aes192);
    assert_eq!(
        read_entry(&archive, "secret.txt", Some(&Password::new("fallback"))).unwrap(),
        SECRET
    );
}

// =============================================================================
// Reading Encrypted Entries
// =============================================================================

#[test]
fn test_each_aes_strength_roundtrips() {
    for method in [
        EncryptionMethod::Aes128,
        EncryptionMethod::Aes192,
        EncryptionMethod::Aes256,
    ] {
        let (_dir, path) = scratch();
        encrypted_archive(&path, method, "123abc");

        let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
        let entry = archive.entry("secret.txt").unwrap().unwrap();
        assert!(entry.is_encrypted());
        assert_eq!(entry.encryption_method(), method);
        assert_eq!(entry.size(), SECRET.len() as u64);
        assert_eq!(
            read_entry(&archive, "secret.txt", Some(&Password::new("123abc"))).unwrap(),
            SECRET
        );
    }
}

#[test]
fn test_wrong_password_reported_on_first_read() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let wrong = Password::new("wrong");
    // Opening the stream succeeds; the password is checked when data is needed.
    let mut stream = archive
        .input_stream_by_name("secret.txt", Some(&wrong))
        .unwrap();

    let mut buf = [0u8; 16];
    let err = stream.read_chunk(&mut buf).unwrap_err();
    assert!(matches!(err, Error::WrongPassword { .. }), "{:?}", err);
    assert_eq!(err.entry_name(), Some("secret.txt"));
    assert_eq!(err.entry_index(), Some(0));
    assert!(err.is_recoverable());
}

#[test]
fn test_missing_password_reported_on_first_read() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes128, "right");

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let mut stream = archive.input_stream_by_name("secret.txt", None).unwrap();
    let mut buf = [0u8; 16];
    match stream.read_chunk(&mut buf) {
        Err(Error::WrongPassword {
            detection_method, ..
        }) => assert_eq!(detection_method, PasswordDetectionMethod::PasswordMissing),
        other => panic!("expected a missing password error, got {:?}", other),
    }
}

#[test]
fn test_unencrypted_entry_ignores_password() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    assert_eq!(
        read_entry(&archive, "public.txt", Some(&Password::new("whatever"))).unwrap(),
        b"anyone can read this"
    );
    assert_eq!(
        read_entry(&archive, "public.txt", None).unwrap(),
        b"anyone can read this"
    );
}

#[test]
fn test_default_password_used_for_reading() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = Archive::open_with(
        &path,
        OpenOptions::new()
            .flags(OpenFlags::READ_ONLY)
            .default_password(Password::new("right")),
    )
    .unwrap();
    assert_eq!(
        archive.default_password().unwrap().unwrap().as_str(),
        "right"
    );
    assert_eq!(read_entry(&archive, "secret.txt", None).unwrap(), SECRET);

    // A per-call password overrides the default.
    let err = read_entry(&archive, "secret.txt", Some(&Password::new("nope"))).unwrap_err();
    assert!(matches!(err, Error::WrongPassword { .. }));

    archive.set_default_password(None).unwrap();
    assert!(archive.default_password().unwrap().is_none());
    assert!(read_entry(&archive, "secret.txt", None).is_err());
}

// =============================================================================
// Editing Archives With Encrypted Entries
// =============================================================================

fn open_with_password(path: &std::path::Path, password: &str) -> Archive {
    Archive::open_with(path, OpenOptions::new().default_password(Password::new(password))).unwrap()
}

#[test]
fn test_encrypted_entry_survives_unrelated_edit() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = open_with_password(&path, "right");
    archive.add_bytes("later.txt", b"added later").unwrap();
    archive.rename(1, "renamed-public.txt").unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    assert_eq!(archive.len().unwrap(), 3);
    let entry = archive.entry("secret.txt").unwrap().unwrap();
    assert_eq!(entry.encryption_method(), EncryptionMethod::Aes256);
    assert!(matches!(
        read_entry(&archive, "secret.txt", None),
        Err(Error::WrongPassword { .. })
    ));
    assert_eq!(
        read_entry(&archive, "secret.txt", Some(&Password::new("right"))).unwrap(),
        SECRET
    );
}

#[test]
fn test_renamed_encrypted_entry_keeps_encryption() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes128, "right");

    let archive = open_with_password(&path, "right");
    archive.rename(0, "moved-secret.txt").unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let entry = archive.entry("moved-secret.txt").unwrap().unwrap();
    assert_eq!(entry.encryption_method(), EncryptionMethod::Aes128);
    assert_eq!(
        read_entry(&archive, "moved-secret.txt", Some(&Password::new("right"))).unwrap(),
        SECRET
    );
}

#[test]
fn test_edit_without_password_keeps_encrypted_archive() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");
    let before = std::fs::read(&path).unwrap();

    let archive = Archive::open(&path, OpenFlags::empty()).unwrap();
    archive.add_bytes("other.txt", b"unrelated").unwrap();
    let err = archive.close().unwrap_err();
    assert!(matches!(err, Error::PasswordRequired));

    // Nothing was written, so the encrypted entry is still readable.
    assert_eq!(std::fs::read(&path).unwrap(), before);
    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    assert_eq!(
        archive.entry("secret.txt").unwrap().unwrap().encryption_method(),
        EncryptionMethod::Aes256
    );
    assert_eq!(
        read_entry(&archive, "secret.txt", Some(&Password::new("right"))).unwrap(),
        SECRET
    );
}

#[test]
fn test_decrypt_existing_entry() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = Archive::open(&path, OpenFlags::empty()).unwrap();
    archive
        .set_default_password(Some(Password::new("right")))
        .unwrap();
    archive
        .set_encryption_method(0, EncryptionMethod::None, None)
        .unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let entry = archive.entry("secret.txt").unwrap().unwrap();
    assert!(!entry.is_encrypted());
    assert_eq!(read_entry(&archive, "secret.txt", None).unwrap(), SECRET);
}

#[test]
fn test_change_password() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes128, "old");

    let archive = Archive::open_with(
        &path,
        OpenOptions::new().default_password(Password::new("old")),
    )
    .unwrap();
    archive
        .set_encryption_method(0, EncryptionMethod::Aes256, Some(&Password::new("new")))
        .unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    let entry = archive.entry("secret.txt").unwrap().unwrap();
    assert_eq!(entry.encryption_method(), EncryptionMethod::Aes256);
    assert_eq!(
        read_entry(&archive, "secret.txt", Some(&Password::new("new"))).unwrap(),
        SECRET
    );
    assert!(read_entry(&archive, "secret.txt", Some(&Password::new("old"))).is_err());
}

#[test]
fn test_recompressing_encrypted_entry_needs_password() {
    let (_dir, path) = scratch();
    encrypted_archive(&path, EncryptionMethod::Aes256, "right");

    let archive = Archive::open(&path, OpenFlags::empty()).unwrap();
    archive
        .set_compression_method(0, zipsession::CompressionMethod::Store, 0)
        .unwrap();
    assert!(archive.close().is_err());

    // The failed commit left the archive as it was.
    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    assert_eq!(
        read_entry(&archive, "secret.txt", Some(&Password::new("right"))).unwrap(),
        SECRET
    );
}

#[test]
fn test_large_encrypted_entry() {
    let (_dir, path) = scratch();
    let data = repetitive_text(200_000);
    let pw = Password::new("large");

    let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
    let index = archive.add_bytes("big.txt", &data).unwrap();
    archive
        .set_encryption_method(index, EncryptionMethod::Aes256, Some(&pw))
        .unwrap();
    archive.close().unwrap();

    let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
    assert_eq!(read_entry(&archive, "big.txt", Some(&pw)).unwrap(), data);
}
