//! Monitor commit progress using callbacks.
//!
//! Closing an archive writes every staged change in one pass. This example
//! demonstrates how to observe that pass:
//! - Implementing the `ProgressListener` trait
//! - Using a closure with `progress_fn`
//! - Watching from another thread with `AtomicProgress`
//!
//! # Usage
//!
//! ```bash
//! cargo run --example progress_callback -- output.zip [--simple]
//! ```

use std::env;
use std::io::Write;
use std::thread;
use zipsession::progress::{AtomicProgress, ProgressListener, progress_fn};
use zipsession::{Archive, CompressionMethod, OpenFlags, Result};

/// A listener drawing a text progress bar.
struct ProgressBarListener {
    current_entry: String,
    entries_written: usize,
}

impl ProgressBarListener {
    fn new() -> Self {
        Self {
            current_entry: String::new(),
            entries_written: 0,
        }
    }
}

impl ProgressListener for ProgressBarListener {
    fn on_progress(&mut self, percent: u8) {
        let bar_width = 40;
        let filled = percent as usize * bar_width / 100;
        print!(
            "\r[{}{}] {:>3}% ({} entries) {:<30}",
            "=".repeat(filled),
            " ".repeat(bar_width - filled),
            percent,
            self.entries_written,
            self.current_entry.chars().take(30).collect::<String>()
        );
        std::io::stdout().flush().ok();
    }

    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        self.current_entry = entry_name.to_string();
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        if success {
            self.entries_written += 1;
        }
    }
}

/// Stages `count` compressible entries.
fn stage_entries(archive: &Archive, count: usize) -> Result<()> {
    for i in 0..count {
        let body = format!("entry {} ", i).repeat(2000);
        let index = archive.add_bytes(&format!("file_{:03}.txt", i), body.as_bytes())?;
        archive.set_compression_method(index, CompressionMethod::Deflate, 6)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output.zip> [--simple]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --simple    Print each percentage instead of drawing a bar");
        std::process::exit(1);
    }

    let output_path = &args[1];
    let use_simple = args.get(2).is_some_and(|a| a == "--simple");

    let archive = Archive::open(output_path, OpenFlags::CREATE | OpenFlags::TRUNCATE)?;
    stage_entries(&archive, 100)?;

    if use_simple {
        let mut listener = progress_fn(|percent| println!("  {}%", percent));
        archive.close_with_progress(&mut listener)?;
    } else {
        let mut listener = ProgressBarListener::new();
        archive.close_with_progress(&mut listener)?;
        println!();
    }
    println!("Committed {}", output_path);

    // The same commit, observed from another thread
    let archive = Archive::open(output_path, OpenFlags::empty())?;
    stage_entries(&archive, 50)?;
    let shared = AtomicProgress::shared();
    let mut listener = shared.clone();
    let committer = thread::spawn(move || archive.close_with_progress(&mut listener));
    while !committer.is_finished() {
        thread::sleep(std::time::Duration::from_millis(5));
    }
    match committer.join() {
        Ok(result) => result?,
        Err(_) => eprintln!("commit thread panicked"),
    }
    println!(
        "Second commit: {}% after {} entries",
        shared.percent(),
        shared.entries_written()
    );

    Ok(())
}
