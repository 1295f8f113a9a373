//! Password handling for CLI operations.

use rpassword::prompt_password;
use zipsession::{Entry, Password};

/// Password for reading `entries`: the one given on the command line, or a
/// prompt if any of them is encrypted.
pub fn read_password<'a>(
    provided: Option<String>,
    mut entries: impl Iterator<Item = &'a Entry>,
) -> Option<Password> {
    if let Some(pwd) = provided {
        return Some(Password::new(pwd));
    }

    // No prompt for archives without encrypted entries
    if !entries.any(Entry::is_encrypted) {
        return None;
    }

    match prompt_password("Enter password: ") {
        Ok(pwd) if !pwd.is_empty() => Some(Password::new(pwd)),
        _ => None,
    }
}

/// Password for encrypting new entries, confirmed when prompted.
pub fn new_password(provided: Option<String>) -> Option<Password> {
    if let Some(pwd) = provided {
        return Some(Password::new(pwd));
    }

    let first = prompt_password("New password: ").ok()?;
    if first.is_empty() {
        eprintln!("Password cannot be empty");
        return None;
    }

    let second = prompt_password("Confirm password: ").ok()?;
    if first == second {
        Some(Password::new(first))
    } else {
        eprintln!("Passwords do not match");
        None
    }
}
