//! Commit progress reporting.
//!
//! Closing an archive rewrites it, which can take a while for large
//! archives. A [`ProgressListener`] passed to
//! [`Archive::close_with_progress`](crate::Archive::close_with_progress)
//! receives integer percentages that:
//! - stay within `0..=100`
//! - never decrease
//! - end with exactly one `100` when the commit succeeds
//!
//! Discarding never reports progress.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::progress::progress_fn;
//! use zipsession::{Archive, OpenFlags};
//!
//! let archive = Archive::open("out.zip", OpenFlags::CREATE)?;
//! archive.add_bytes("hello.txt", b"Hello")?;
//! let mut progress = progress_fn(|pct| println!("{}%", pct));
//! archive.close_with_progress(&mut progress)?;
//! # Ok::<(), zipsession::Error>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Smallest percentage step forwarded to listeners, except the final 100.
pub const PROGRESS_STEP: u8 = 2;

/// Receives commit progress.
///
/// All methods have no-op defaults.
pub trait ProgressListener: Send {
    /// Called with the overall completion percentage.
    fn on_progress(&mut self, percent: u8) {
        let _ = percent;
    }

    /// Called when the commit starts writing an entry.
    fn on_entry_start(&mut self, entry_name: &str, size: u64) {
        let _ = (entry_name, size);
    }

    /// Called when an entry has been written (or failed to).
    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        let _ = (entry_name, success);
    }

    /// Called on any warning during the commit.
    fn on_warning(&mut self, message: &str) {
        let _ = message;
    }
}

/// A progress listener that does nothing (null object pattern).
#[derive(Debug, Default, Clone)]
pub struct NoProgress;

impl ProgressListener for NoProgress {}

/// A listener that records everything it receives.
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    /// Percentages in the order received.
    pub percents: Vec<u8>,
    /// Names of completed entries.
    pub completed: Vec<String>,
    /// Names of entries that failed.
    pub failed: Vec<String>,
    /// Warnings collected.
    pub warnings: Vec<String>,
}

impl RecordingProgress {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last percentage received.
    pub fn last(&self) -> Option<u8> {
        self.percents.last().copied()
    }
}

impl ProgressListener for RecordingProgress {
    fn on_progress(&mut self, percent: u8) {
        self.percents.push(percent);
    }

    fn on_entry_complete(&mut self, entry_name: &str, success: bool) {
        if success {
            self.completed.push(entry_name.to_string());
        } else {
            self.failed.push(entry_name.to_string());
        }
    }

    fn on_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}

/// A thread-safe listener using atomics.
///
/// Lets another thread watch a commit running elsewhere.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    percent: AtomicU8,
    entries_written: AtomicUsize,
}

impl AtomicProgress {
    /// Creates a new atomic listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared atomic listener.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the last reported percentage.
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Returns the number of entries written so far.
    pub fn entries_written(&self) -> usize {
        self.entries_written.load(Ordering::Relaxed)
    }

    fn record(&self, percent: u8) {
        self.percent.store(percent, Ordering::Relaxed);
    }

    fn record_entry(&self, success: bool) {
        if success {
            self.entries_written.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl ProgressListener for AtomicProgress {
    fn on_progress(&mut self, percent: u8) {
        self.record(percent);
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        self.record_entry(success);
    }
}

/// Progress listener for shared `Arc<AtomicProgress>`.
impl ProgressListener for Arc<AtomicProgress> {
    fn on_progress(&mut self, percent: u8) {
        self.record(percent);
    }

    fn on_entry_complete(&mut self, _entry_name: &str, success: bool) {
        self.record_entry(success);
    }
}

/// A progress listener that calls a closure.
pub struct ClosureProgress<F> {
    callback: F,
}

impl<F> ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    /// Creates a progress listener from a closure receiving the percentage.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressListener for ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    fn on_progress(&mut self, percent: u8) {
        (self.callback)(percent)
    }
}

/// Creates a closure-based progress listener.
pub fn progress_fn<F>(f: F) -> ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    ClosureProgress::new(f)
}

/// Converts engine completion fractions into listener percentages.
///
/// Engines call [`update`](Self::update) with any fraction they like, in any
/// order; the listener only ever sees non-decreasing percentages in steps of
/// at least [`PROGRESS_STEP`], and [`finish`](Self::finish) delivers the
/// final 100 exactly once.
pub struct CommitProgress<'a> {
    listener: &'a mut dyn ProgressListener,
    last: Option<u8>,
}

impl<'a> CommitProgress<'a> {
    /// Wraps a listener.
    pub fn new(listener: &'a mut dyn ProgressListener) -> Self {
        Self {
            listener,
            last: None,
        }
    }

    /// Reports a completion fraction in `0.0..=1.0`. Out-of-range and NaN
    /// values are clamped.
    pub fn update(&mut self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        // 100 is reserved for finish().
        let percent = ((fraction * 100.0).floor() as u8).min(99);
        let due = match self.last {
            None => true,
            Some(last) => percent >= last.saturating_add(PROGRESS_STEP),
        };
        if due {
            self.emit(percent);
        }
    }

    /// Forwards an entry start event.
    pub fn entry_start(&mut self, entry_name: &str, size: u64) {
        self.listener.on_entry_start(entry_name, size);
    }

    /// Forwards an entry completion event.
    pub fn entry_complete(&mut self, entry_name: &str, success: bool) {
        self.listener.on_entry_complete(entry_name, success);
    }

    /// Forwards a warning and logs it.
    pub fn warning(&mut self, message: &str) {
        log::warn!("{}", message);
        self.listener.on_warning(message);
    }

    /// Reports 100%, once.
    pub fn finish(&mut self) {
        if self.last != Some(100) {
            self.emit(100);
        }
    }

    /// The last percentage delivered to the listener.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    fn emit(&mut self, percent: u8) {
        self.last = Some(percent);
        self.listener.on_progress(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_progress() {
        let mut p = NoProgress;
        p.on_progress(50);
        p.on_entry_complete("a", true);
    }

    #[test]
    fn test_commit_progress_is_monotonic() {
        let mut recorder = RecordingProgress::new();
        {
            let mut progress = CommitProgress::new(&mut recorder);
            for f in [0.0, 0.5, 0.3, 0.51, 0.55, 2.0, f64::NAN, 0.99] {
                progress.update(f);
            }
            progress.finish();
            progress.finish();
        }
        assert_eq!(recorder.percents, vec![0, 50, 55, 99, 100]);
        assert!(recorder.percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_finish_without_updates() {
        let mut recorder = RecordingProgress::new();
        CommitProgress::new(&mut recorder).finish();
        assert_eq!(recorder.percents, vec![100]);
    }

    #[test]
    fn test_recording_entries() {
        let mut recorder = RecordingProgress::new();
        {
            let mut progress = CommitProgress::new(&mut recorder);
            progress.entry_complete("ok.txt", true);
            progress.entry_complete("bad.txt", false);
            progress.warning("careful");
        }
        assert_eq!(recorder.completed, vec!["ok.txt"]);
        assert_eq!(recorder.failed, vec!["bad.txt"]);
        assert_eq!(recorder.warnings, vec!["careful"]);
    }

    #[test]
    fn test_atomic_progress_shared() {
        let shared = AtomicProgress::shared();
        let mut listener = Arc::clone(&shared);
        listener.on_progress(42);
        listener.on_entry_complete("a", true);
        listener.on_entry_complete("b", false);
        assert_eq!(shared.percent(), 42);
        assert_eq!(shared.entries_written(), 1);
    }

    #[test]
    fn test_progress_fn() {
        let mut seen = Vec::new();
        {
            let mut listener = progress_fn(|p| seen.push(p));
            listener.on_progress(7);
        }
        assert_eq!(seen, vec![7]);
    }
}
