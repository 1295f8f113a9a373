//! Write and read AES-encrypted entries.
//!
//! This example demonstrates password handling:
//! - Encrypting entries with a per-call password
//! - Reading them back with the session default password
//! - Detecting a wrong password on the first read
//!
//! # Usage
//!
//! ```bash
//! cargo run --example encrypted -- secret.zip "my password"
//! ```

use std::env;
use std::io::Read;
use zipsession::{
    Archive, EncryptionMethod, Error, OpenFlags, OpenOptions, Password, Result,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <output.zip> <password>", args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    let password = Password::new(args[2].as_str());

    // Write: one public and one encrypted entry
    let archive = Archive::open(path, OpenFlags::CREATE | OpenFlags::TRUNCATE)?;
    archive.add_bytes("public.txt", b"Anyone can read this.")?;
    let index = archive.add_bytes("secret.txt", b"Only password holders can read this.")?;
    archive.set_encryption_method(index, EncryptionMethod::Aes256, Some(&password))?;
    archive.close()?;
    println!("Created {} with one AES-256 entry", path);

    // Read back with the session default password
    let options = OpenOptions::new()
        .flags(OpenFlags::READ_ONLY)
        .default_password(password);
    let archive = Archive::open_with(path, options)?;
    for entry in archive.entries() {
        let entry = entry?;
        let mut text = String::new();
        archive.input_stream(&entry, None)?.read_to_string(&mut text)?;
        println!(
            "  {} [{}]: {}",
            entry.name(),
            entry.encryption_method(),
            text
        );
    }

    // A per-call password overrides the default; errors show up on read
    if let Some(entry) = archive.entry("secret.txt")? {
        let wrong = Password::new("not the password");
        let mut stream = archive.input_stream(&entry, Some(&wrong))?;
        let mut buf = [0u8; 16];
        match stream.read_chunk(&mut buf) {
            Err(Error::WrongPassword {
                detection_method, ..
            }) => println!("Wrong password rejected ({})", detection_method),
            Err(e) => return Err(e),
            Ok(_) => println!("Unexpectedly read data with the wrong password"),
        }
    }

    archive.close()?;
    Ok(())
}
