//! Command implementations for the CLI tool.

use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;
use zipsession::{Archive, Entry, Error, OpenFlags, OpenOptions, Result};

use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::{ArchiveSummary, TestSummary, create_formatter};
use crate::password::{new_password, read_password};
use crate::progress::CommitBar;
use crate::{CompressionMethod, EncryptionMethod, OutputFormat};

/// Options shared by every command.
pub struct Global<'a> {
    pub format: OutputFormat,
    pub quiet: bool,
    pub charset: Option<&'a str>,
}

/// Configuration for the add command.
pub struct AddConfig<'a> {
    pub archive_path: &'a Path,
    pub files: &'a [PathBuf],
    pub prefix: Option<&'a str>,
    pub method: CompressionMethod,
    pub level: u32,
    pub encrypt: Option<EncryptionMethod>,
    pub password: Option<String>,
}

/// Runs a command body, printing any error.
fn run(body: impl FnOnce() -> Result<ExitCode>) -> ExitCode {
    body().unwrap_or_else(|e| report(&e))
}

fn report(error: &Error) -> ExitCode {
    eprintln!("Error: {}", error);
    error_to_exit_code(error)
}

/// Maps an I/O error from a stream read back to the library error inside.
fn unwrap_io(error: io::Error) -> Error {
    if Error::downcast_io(&error).is_none() {
        return Error::Io(error);
    }
    match error.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(inner)) => *inner,
        _ => Error::Engine("stream read failed".into()),
    }
}

fn open_archive(global: &Global<'_>, path: &Path, flags: OpenFlags) -> Result<Archive> {
    let mut options = OpenOptions::new().flags(flags);
    if let Some(label) = global.charset {
        options = options.charset(label)?;
    }
    Archive::open_with(path, options)
}

/// Opens an archive for editing. Committing re-encrypts the entries that are
/// already encrypted, so their password is asked for up front.
fn open_for_update(global: &Global<'_>, path: &Path, flags: OpenFlags) -> Result<Archive> {
    let archive = open_archive(global, path, flags)?;
    let entries = collect_entries(&archive)?;
    if let Some(password) = read_password(None, entries.iter()) {
        archive.set_default_password(Some(password))?;
    }
    Ok(archive)
}

fn close_archive(global: &Global<'_>, archive: &Archive) -> Result<()> {
    let pending = archive.has_pending_changes()?;
    let mut bar = CommitBar::new(global.quiet || !pending);
    match archive.close_with_progress(&mut bar) {
        Ok(()) => {
            bar.finish_with_message("Saved");
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e)
        }
    }
}

fn collect_entries(archive: &Archive) -> Result<Vec<Entry>> {
    archive.entries().collect()
}

/// List command implementation
pub fn list(global: &Global<'_>, archive_path: &Path, technical: bool) -> ExitCode {
    run(|| {
        let archive = open_archive(global, archive_path, OpenFlags::READ_ONLY)?;
        let entries = collect_entries(&archive)?;
        print!(
            "{}",
            create_formatter(global.format).format_list(&entries, technical)
        );
        archive.close()?;
        Ok(ExitCode::Success)
    })
}

/// Info command implementation
pub fn info(global: &Global<'_>, archive_path: &Path) -> ExitCode {
    run(|| {
        let archive = open_archive(global, archive_path, OpenFlags::READ_ONLY)?;
        let entries = collect_entries(&archive)?;
        let summary = ArchiveSummary::new(
            archive_path.display().to_string(),
            &entries,
            archive.comment()?,
        );
        print!("{}", create_formatter(global.format).format_info(&summary));
        archive.close()?;
        Ok(ExitCode::Success)
    })
}

/// Test command implementation
pub fn test(global: &Global<'_>, archive_path: &Path, password: Option<String>) -> ExitCode {
    run(|| {
        let archive = open_archive(global, archive_path, OpenFlags::READ_ONLY)?;
        let entries = collect_entries(&archive)?;
        let password = read_password(password, entries.iter());

        let mut result = TestSummary::default();
        for entry in entries.iter().filter(|e| !e.is_directory()) {
            result.entries_tested += 1;
            let outcome = archive
                .input_stream(entry, password.as_ref())
                .and_then(|mut stream| io::copy(&mut stream, &mut io::sink()).map_err(unwrap_io));
            match outcome {
                Ok(bytes) => result.bytes_read += bytes,
                Err(e) => result
                    .failures
                    .push((entry.name().to_string(), e.to_string())),
            }
        }
        archive.close()?;

        print!(
            "{}",
            create_formatter(global.format).format_test_result(&result)
        );
        Ok(if result.is_ok() {
            ExitCode::Success
        } else {
            ExitCode::BadArchive
        })
    })
}

/// Cat command implementation
pub fn cat(
    global: &Global<'_>,
    archive_path: &Path,
    name: &str,
    password: Option<String>,
) -> ExitCode {
    run(|| {
        let archive = open_archive(global, archive_path, OpenFlags::READ_ONLY)?;
        let Some(entry) = archive.entry(name)? else {
            eprintln!("Error: no entry named {}", name);
            return Ok(ExitCode::BadArgs);
        };
        let password = read_password(password, std::iter::once(&entry));
        let mut stream = archive.input_stream(&entry, password.as_ref())?;
        io::copy(&mut stream, &mut io::stdout().lock()).map_err(unwrap_io)?;
        drop(stream);
        archive.close()?;
        Ok(ExitCode::Success)
    })
}

/// Archive name of `file` found while walking `root`.
fn archive_name(root: &Path, file: &Path, prefix: Option<&str>) -> String {
    let base = root.parent().unwrap_or(Path::new(""));
    let relative = file.strip_prefix(base).unwrap_or(file);
    let mut name = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if let Some(prefix) = prefix.map(|p| p.trim_end_matches('/')).filter(|p| !p.is_empty()) {
        name = format!("{}/{}", prefix, name);
    }
    name
}

/// Add command implementation
pub fn add(global: &Global<'_>, config: &AddConfig<'_>) -> ExitCode {
    run(|| {
        let password = match config.encrypt {
            Some(_) => match new_password(config.password.clone()) {
                Some(p) => Some(p),
                None => return Ok(ExitCode::BadArgs),
            },
            None => None,
        };

        let archive = open_for_update(global, config.archive_path, OpenFlags::CREATE)?;
        let method = config.method.into();
        let mut added = 0u64;

        for root in config.files {
            for item in WalkDir::new(root).sort_by_file_name() {
                let item = item.map_err(|e| Error::Io(e.into()))?;
                let name = archive_name(root, item.path(), config.prefix);
                if name.is_empty() {
                    continue;
                }
                if item.file_type().is_dir() {
                    archive.add_directory(&name)?;
                    continue;
                }
                let index = archive.add_file(&name, item.path(), 0, None)?;
                if config.method != CompressionMethod::Default || config.level != 0 {
                    archive.set_compression_method(index, method, config.level)?;
                }
                if let (Some(encrypt), Some(password)) = (config.encrypt, password.as_ref()) {
                    archive.set_encryption_method(index, encrypt.into(), Some(password))?;
                }
                added += 1;
            }
        }

        close_archive(global, &archive)?;
        if !global.quiet {
            println!("Added {} files to {}", added, config.archive_path.display());
        }
        Ok(ExitCode::Success)
    })
}

/// Mkdir command implementation
pub fn mkdir(global: &Global<'_>, archive_path: &Path, name: &str) -> ExitCode {
    run(|| {
        let archive = open_for_update(global, archive_path, OpenFlags::CREATE)?;
        archive.add_directory(name)?;
        close_archive(global, &archive)?;
        Ok(ExitCode::Success)
    })
}

/// Rm command implementation
pub fn rm(global: &Global<'_>, archive_path: &Path, names: &[String]) -> ExitCode {
    run(|| {
        let archive = open_for_update(global, archive_path, OpenFlags::empty())?;
        let mut missing = 0;
        for name in names {
            if !archive.remove_by_name(name)? {
                eprintln!("warning: no entry named {}", name);
                missing += 1;
            }
        }
        close_archive(global, &archive)?;
        Ok(if missing > 0 {
            ExitCode::Warning
        } else {
            ExitCode::Success
        })
    })
}

/// Mv command implementation
pub fn mv(global: &Global<'_>, archive_path: &Path, from: &str, to: &str) -> ExitCode {
    run(|| {
        let archive = open_for_update(global, archive_path, OpenFlags::empty())?;
        let Some(index) = archive.index_of(from)? else {
            eprintln!("Error: no entry named {}", from);
            archive.discard()?;
            return Ok(ExitCode::BadArgs);
        };
        archive.rename(index, to)?;
        close_archive(global, &archive)?;
        Ok(ExitCode::Success)
    })
}

/// Comment command implementation
pub fn comment(global: &Global<'_>, archive_path: &Path, text: Option<String>) -> ExitCode {
    run(|| match text {
        None => {
            let archive = open_archive(global, archive_path, OpenFlags::READ_ONLY)?;
            println!("{}", archive.comment()?);
            archive.close()?;
            Ok(ExitCode::Success)
        }
        Some(text) => {
            let archive = open_for_update(global, archive_path, OpenFlags::empty())?;
            archive.set_comment(&text)?;
            close_archive(global, &archive)?;
            Ok(ExitCode::Success)
        }
    })
}

/// Encrypt command implementation
pub fn encrypt(
    global: &Global<'_>,
    archive_path: &Path,
    names: &[String],
    method: EncryptionMethod,
    password: Option<String>,
    old_password: Option<String>,
) -> ExitCode {
    run(|| {
        let archive = open_archive(global, archive_path, OpenFlags::empty())?;
        let entries = collect_entries(&archive)?;
        if old_password.is_some() || entries.iter().any(Entry::is_encrypted) {
            // Already encrypted entries are decoded with the default password.
            archive.set_default_password(read_password(old_password, entries.iter()))?;
        }
        let Some(password) = new_password(password) else {
            archive.discard()?;
            return Ok(ExitCode::BadArgs);
        };

        let targets: Vec<&Entry> = if names.is_empty() {
            entries.iter().filter(|e| !e.is_directory()).collect()
        } else {
            entries
                .iter()
                .filter(|e| names.iter().any(|n| n == e.name()))
                .collect()
        };
        if targets.len() < names.len() {
            eprintln!("warning: some names did not match any entry");
        }
        for entry in &targets {
            if let Some(index) = entry.index() {
                archive.set_encryption_method(index, method.into(), Some(&password))?;
            }
        }

        close_archive(global, &archive)?;
        if !global.quiet {
            println!("Encrypted {} entries", targets.len());
        }
        Ok(ExitCode::Success)
    })
}
