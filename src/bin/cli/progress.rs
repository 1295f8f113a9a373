//! Progress bar for archive commits.

use indicatif::{ProgressBar, ProgressStyle};
use zipsession::ProgressListener;

/// Shows commit progress of a closing archive.
pub struct CommitBar {
    bar: ProgressBar,
}

impl CommitBar {
    /// Creates a progress bar, hidden if `quiet`.
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        };

        Self { bar }
    }

    /// Finishes with a custom message
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.bar.finish_with_message(msg.into());
    }

    /// Removes the bar after a failure
    pub fn abandon(&self) {
        self.bar.abandon_with_message("Failed");
    }
}

impl ProgressListener for CommitBar {
    fn on_progress(&mut self, percent: u8) {
        self.bar.set_position(u64::from(percent));
    }

    fn on_entry_start(&mut self, entry_name: &str, _size: u64) {
        // Truncate long names
        let display_name = match entry_name.char_indices().rev().nth(36) {
            Some((cut, _)) if entry_name.chars().count() > 40 => {
                format!("...{}", &entry_name[cut..])
            }
            _ => entry_name.to_string(),
        };
        self.bar.set_message(display_name);
    }

    fn on_warning(&mut self, message: &str) {
        self.bar.println(format!("warning: {}", message));
    }
}
