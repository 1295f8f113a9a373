//! CLI tool for zipsession archive operations.

mod commands;
mod exit_codes;
mod output;
mod password;
mod progress;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

/// Inspect and edit ZIP archives
#[derive(Parser)]
#[command(name = "zipsession")]
#[command(author, version, about = "Inspect and edit ZIP archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Character set of entry names that are not flagged as UTF-8
    #[arg(long, short = 'c', global = true, env = "ZIPSESSION_CHARSET")]
    charset: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show technical details
        #[arg(long)]
        technical: bool,
    },

    /// Show archive information (alias: i)
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },

    /// Read every entry and verify its checksum (alias: t)
    #[command(alias = "t")]
    Test {
        /// Archive file to test
        archive: PathBuf,

        /// Password (will prompt if needed)
        #[arg(short = 'p', long, env = "ZIPSESSION_PASSWORD")]
        password: Option<String>,
    },

    /// Write one entry to standard output
    Cat {
        /// Archive file to read
        archive: PathBuf,

        /// Entry name
        entry: String,

        /// Password (will prompt if needed)
        #[arg(short = 'p', long, env = "ZIPSESSION_PASSWORD")]
        password: Option<String>,
    },

    /// Add files, creating the archive if needed (alias: a)
    #[command(alias = "a")]
    Add {
        /// Archive file to update
        archive: PathBuf,

        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory inside the archive to add the files under
        #[arg(long)]
        prefix: Option<String>,

        /// Compression method
        #[arg(short = 'm', long, value_enum, default_value = "default")]
        method: CompressionMethod,

        /// Compression level (0-9, 0 = method default)
        #[arg(short = 'l', long, default_value = "0")]
        level: u32,

        /// Encrypt the added entries
        #[arg(short = 'e', long, value_enum)]
        encrypt: Option<EncryptionMethod>,

        /// Password for --encrypt (will prompt if needed)
        #[arg(short = 'p', long, env = "ZIPSESSION_PASSWORD")]
        password: Option<String>,
    },

    /// Add a directory entry
    Mkdir {
        /// Archive file to update
        archive: PathBuf,

        /// Directory name
        name: String,
    },

    /// Remove entries (alias: d)
    #[command(alias = "d")]
    Rm {
        /// Archive file to update
        archive: PathBuf,

        /// Entry names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Rename an entry
    Mv {
        /// Archive file to update
        archive: PathBuf,

        /// Current entry name
        from: String,

        /// New entry name
        to: String,
    },

    /// Show or set the archive comment
    Comment {
        /// Archive file
        archive: PathBuf,

        /// New comment; prints the current one if omitted
        text: Option<String>,
    },

    /// Encrypt existing entries
    Encrypt {
        /// Archive file to update
        archive: PathBuf,

        /// Entries to encrypt (all entries if none are given)
        names: Vec<String>,

        /// Encryption method
        #[arg(short = 'e', long, value_enum, default_value = "aes256")]
        method: EncryptionMethod,

        /// New password (will prompt if not given)
        #[arg(short = 'p', long, env = "ZIPSESSION_PASSWORD")]
        password: Option<String>,

        /// Password of entries that are already encrypted
        #[arg(long)]
        old_password: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CompressionMethod {
    Default,
    Store,
    Deflate,
    Bzip2,
}

impl From<CompressionMethod> for zipsession::CompressionMethod {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Default => zipsession::CompressionMethod::Default,
            CompressionMethod::Store => zipsession::CompressionMethod::Store,
            CompressionMethod::Deflate => zipsession::CompressionMethod::Deflate,
            CompressionMethod::Bzip2 => zipsession::CompressionMethod::Bzip2,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum EncryptionMethod {
    Aes128,
    Aes192,
    Aes256,
}

impl From<EncryptionMethod> for zipsession::EncryptionMethod {
    fn from(method: EncryptionMethod) -> Self {
        match method {
            EncryptionMethod::Aes128 => zipsession::EncryptionMethod::Aes128,
            EncryptionMethod::Aes192 => zipsession::EncryptionMethod::Aes192,
            EncryptionMethod::Aes256 => zipsession::EncryptionMethod::Aes256,
        }
    }
}

fn main() {
    // Staged changes are only written on close, so an interrupted run
    // leaves the archive as it was.
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted");
        std::process::exit(exit_codes::USER_INTERRUPT);
    })
    .ok();

    let cli = Cli::parse();
    let global = commands::Global {
        format: cli.format,
        quiet: cli.quiet,
        charset: cli.charset.as_deref(),
    };

    let exit_code = match cli.command {
        Commands::List { archive, technical } => commands::list(&global, &archive, technical),

        Commands::Info { archive } => commands::info(&global, &archive),

        Commands::Test { archive, password } => commands::test(&global, &archive, password),

        Commands::Cat {
            archive,
            entry,
            password,
        } => commands::cat(&global, &archive, &entry, password),

        Commands::Add {
            archive,
            files,
            prefix,
            method,
            level,
            encrypt,
            password,
        } => commands::add(
            &global,
            &commands::AddConfig {
                archive_path: &archive,
                files: &files,
                prefix: prefix.as_deref(),
                method,
                level,
                encrypt,
                password,
            },
        ),

        Commands::Mkdir { archive, name } => commands::mkdir(&global, &archive, &name),

        Commands::Rm { archive, names } => commands::rm(&global, &archive, &names),

        Commands::Mv { archive, from, to } => commands::mv(&global, &archive, &from, &to),

        Commands::Comment { archive, text } => commands::comment(&global, &archive, text),

        Commands::Encrypt {
            archive,
            names,
            method,
            password,
            old_password,
        } => commands::encrypt(&global, &archive, &names, method, password, old_password),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}
