//! Exit codes for the CLI tool.

use zipsession::{Error, OpenFailure};

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Operation completed with warnings
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// Wrong password
pub const WRONG_PASSWORD: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadArchive,
    WrongPassword,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::WrongPassword => WRONG_PASSWORD,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a library error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) => ExitCode::IoError,
        Error::Open { reason, .. } => match reason {
            OpenFailure::NotFound | OpenFailure::Io(_) => ExitCode::IoError,
            OpenFailure::NotAnArchive(_) | OpenFailure::Inconsistent(_) => ExitCode::BadArchive,
            OpenFailure::AlreadyExists | OpenFailure::ConflictingFlags(_) => ExitCode::BadArgs,
            _ => ExitCode::FatalError,
        },
        Error::WrongPassword { .. } => ExitCode::WrongPassword,
        Error::InvalidFormat(_) | Error::CrcMismatch { .. } => ExitCode::BadArchive,
        e if e.is_unsupported() => ExitCode::BadArchive,
        e if e.is_invalid_argument() => ExitCode::BadArgs,
        Error::EntryNotFound { .. } => ExitCode::BadArgs,
        // Closed, ReadOnly, engine failures and future variants
        _ => ExitCode::FatalError,
    }
}
