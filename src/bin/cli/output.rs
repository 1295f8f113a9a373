//! Output formatting for CLI operations.

use serde_json::json;
use zipsession::{CompressionMethod, Entry};

/// Aggregate facts about an archive, for `info`.
pub struct ArchiveSummary {
    pub path: String,
    pub entry_count: u64,
    pub directory_count: u64,
    pub total_size: u64,
    pub packed_size: u64,
    pub encrypted_entries: u64,
    pub methods: Vec<CompressionMethod>,
    pub comment: String,
}

impl ArchiveSummary {
    /// Builds a summary from listed entries.
    pub fn new(path: String, entries: &[Entry], comment: String) -> Self {
        let mut summary = Self {
            path,
            entry_count: entries.len() as u64,
            directory_count: 0,
            total_size: 0,
            packed_size: 0,
            encrypted_entries: 0,
            methods: Vec::new(),
            comment,
        };
        for entry in entries {
            if entry.is_directory() {
                summary.directory_count += 1;
            }
            if entry.is_encrypted() {
                summary.encrypted_entries += 1;
            }
            summary.total_size += entry.size();
            summary.packed_size += entry.compressed_size().unwrap_or(entry.size());
            if !summary.methods.contains(&entry.compression_method()) {
                summary.methods.push(entry.compression_method());
            }
        }
        summary
    }

    /// Space savings ratio (0.0 = none).
    pub fn space_savings(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            1.0 - self.packed_size as f64 / self.total_size as f64
        }
    }
}

/// Outcome of reading back every entry, for `test`.
#[derive(Default)]
pub struct TestSummary {
    pub entries_tested: u64,
    pub bytes_read: u64,
    pub failures: Vec<(String, String)>,
}

impl TestSummary {
    /// True if no entry failed.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats a list of entries
    fn format_list(&self, entries: &[Entry], technical: bool) -> String;

    /// Formats archive information
    fn format_info(&self, info: &ArchiveSummary) -> String;

    /// Formats test results
    fn format_test_result(&self, result: &TestSummary) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, entries: &[Entry], technical: bool) -> String {
        let mut output = String::new();

        if technical {
            output.push_str(&format!(
                "{:>12} {:>12} {:>19} {:>10} {:>8} {}\n",
                "Size", "Packed", "Modified", "CRC", "Method", "Name"
            ));
        } else {
            output.push_str(&format!("{:>12} {:>19} {}\n", "Size", "Modified", "Name"));
        }
        output.push_str(&"-".repeat(70));
        output.push('\n');

        let mut total_size: u64 = 0;
        let mut file_count = 0;
        let mut dir_count = 0;

        for entry in entries {
            if entry.is_directory() {
                dir_count += 1;
            } else {
                file_count += 1;
                total_size += entry.size();
            }

            let size_str = if entry.is_directory() {
                String::new()
            } else {
                humanize_bytes(entry.size())
            };
            let mtime_str = entry
                .modified()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            let lock = if entry.is_encrypted() { "*" } else { "" };

            if technical {
                let packed_str = entry
                    .compressed_size()
                    .map(humanize_bytes)
                    .unwrap_or_else(|| "-".to_string());
                let crc_str = entry
                    .crc32()
                    .map(|c| format!("{:08X}", c))
                    .unwrap_or_else(|| "-".to_string());
                output.push_str(&format!(
                    "{:>12} {:>12} {:>19} {:>10} {:>8} {}{}\n",
                    size_str,
                    packed_str,
                    mtime_str,
                    crc_str,
                    entry.compression_method().name(),
                    entry.name(),
                    lock
                ));
            } else {
                output.push_str(&format!(
                    "{:>12} {:>19} {}{}\n",
                    size_str,
                    mtime_str,
                    entry.name(),
                    lock
                ));
            }
        }

        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} files, {} directories, {} total\n",
            file_count,
            dir_count,
            humanize_bytes(total_size)
        ));

        output
    }

    fn format_info(&self, info: &ArchiveSummary) -> String {
        let mut output = String::new();

        output.push_str(&format!("Archive: {}\n", info.path));
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!("  Entries:        {}\n", info.entry_count));
        output.push_str(&format!("  Directories:    {}\n", info.directory_count));
        output.push_str(&format!(
            "  Total size:     {}\n",
            humanize_bytes(info.total_size)
        ));
        output.push_str(&format!(
            "  Packed size:    {}\n",
            humanize_bytes(info.packed_size)
        ));
        output.push_str(&format!(
            "  Space savings:  {:.1}%\n",
            info.space_savings() * 100.0
        ));
        if !info.methods.is_empty() {
            let methods: Vec<_> = info.methods.iter().map(|m| m.name()).collect();
            output.push_str(&format!("  Methods:        {}\n", methods.join(", ")));
        }
        if info.encrypted_entries > 0 {
            output.push_str(&format!("  Encrypted:      {}\n", info.encrypted_entries));
        }
        if !info.comment.is_empty() {
            output.push_str(&format!("  Comment:        {}\n", info.comment));
        }

        output
    }

    fn format_test_result(&self, result: &TestSummary) -> String {
        let mut output = String::new();

        if result.is_ok() {
            output.push_str(&format!(
                "OK - {} entries tested ({}), all passed\n",
                result.entries_tested,
                humanize_bytes(result.bytes_read)
            ));
        } else {
            output.push_str("Test completed with errors:\n");
            output.push_str(&format!("  Tested: {}\n", result.entries_tested));
            output.push_str(&format!("  Failed: {}\n", result.failures.len()));
            output.push_str("\nFailures:\n");
            for (name, error) in &result.failures {
                output.push_str(&format!("  {}: {}\n", name, error));
            }
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, entries: &[Entry], _technical: bool) -> String {
        let items: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "index": e.index(),
                    "name": e.name(),
                    "size": e.size(),
                    "compressed_size": e.compressed_size(),
                    "modified": e.modified().map(|t| t.as_unix_secs()),
                    "crc32": e.crc32(),
                    "compression": e.compression_method().name(),
                    "encryption": e.encryption_method().name(),
                    "is_directory": e.is_directory(),
                    "comment": e.comment(),
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_info(&self, info: &ArchiveSummary) -> String {
        let obj = json!({
            "path": info.path,
            "entry_count": info.entry_count,
            "directory_count": info.directory_count,
            "total_size": info.total_size,
            "packed_size": info.packed_size,
            "space_savings": info.space_savings(),
            "encrypted_entries": info.encrypted_entries,
            "compression_methods": info.methods.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "comment": info.comment,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_test_result(&self, result: &TestSummary) -> String {
        let obj = json!({
            "success": result.is_ok(),
            "entries_tested": result.entries_tested,
            "bytes_read": result.bytes_read,
            "failures": result.failures.iter().map(|(n, e)| json!({"name": n, "error": e})).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
