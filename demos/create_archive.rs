//! Create or update a ZIP archive from files.
//!
//! This example demonstrates the basic session workflow:
//! - Opening (or creating) an archive
//! - Staging files from disk and data from memory
//! - Choosing a compression method per entry
//! - Committing everything on close
//!
//! # Usage
//!
//! ```bash
//! cargo run --example create_archive -- output.zip file1.txt file2.txt
//! ```

use std::env;
use zipsession::{Archive, CompressionMethod, OpenFlags, Result};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output.zip> [file1] [file2...]", args[0]);
        eprintln!();
        eprintln!("Adds the specified files to a ZIP archive, creating it if needed.");
        eprintln!("If no files are specified, adds a few demo entries.");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} archive.zip file1.txt file2.txt", args[0]);
        eprintln!("  {} demo.zip  # Creates demo archive", args[0]);
        std::process::exit(1);
    }

    let output_path = &args[1];
    let input_files = &args[2..];

    println!("Opening archive: {}", output_path);
    let archive = Archive::open(output_path, OpenFlags::CREATE)?;
    println!("  Existing entries: {}", archive.len()?);
    println!();

    if input_files.is_empty() {
        println!("Adding demo entries...");

        let readme = b"This archive was created by the zipsession create_archive example.\n";
        archive.add_bytes("README.txt", readme)?;
        println!("  Added: README.txt ({} bytes)", readme.len());

        archive.add_directory("data")?;
        println!("  Added: data/");

        // Repetitive content compresses well
        let table: String = (0..1000)
            .map(|i| format!("row {:04}: {}\n", i, i * i))
            .collect();
        let index = archive.add_bytes("data/table.txt", table.as_bytes())?;
        archive.set_compression_method(index, CompressionMethod::Deflate, 9)?;
        println!("  Added: data/table.txt ({} bytes, deflate level 9)", table.len());

        // Already compressed data is better stored
        let noise: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let index = archive.add_bytes("data/noise.bin", &noise)?;
        archive.set_compression_method(index, CompressionMethod::Store, 0)?;
        println!("  Added: data/noise.bin ({} bytes, stored)", noise.len());
    } else {
        println!("Adding files...");
        for file_path in input_files {
            let name = std::path::Path::new(file_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.clone());
            let index = archive.add_file(&name, file_path, 0, None)?;
            println!("  Added: {} (index {})", name, index);
        }
    }

    println!();
    println!("Pending entries: {}", archive.len()?);

    // Nothing has been written so far
    archive.close()?;

    let reopened = Archive::open(output_path, OpenFlags::READ_ONLY)?;
    println!("Archive written: {}", output_path);
    for entry in reopened.entries() {
        let entry = entry?;
        println!(
            "  {:<24} {:>8} bytes  {:>5.1}% saved  {}",
            entry.name(),
            entry.size(),
            entry.compression_ratio() * 100.0,
            entry.compression_method()
        );
    }
    reopened.close()?;

    Ok(())
}
