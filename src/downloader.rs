use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::roster::RosterEntry;

/// Convert the roster to CSV format
///
/// Produces a header row `name,time` followed by one row per entry. Every
/// field is wrapped in double quotes with embedded quotes doubled, and rows
/// are joined with `\n`.
///
/// # Arguments
/// * `entries` - The (already deduplicated) roster rows
///
/// # Returns
/// * `Option<String>` - The CSV text, or `None` for an empty roster
///   (an empty roster exports nothing)
pub fn to_csv(entries: &[RosterEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut csv_content = String::from("name,time");
    for entry in entries {
        csv_content.push('\n');
        csv_content.push_str(&quote_field(&entry.name));
        csv_content.push(',');
        csv_content.push_str(&quote_field(&entry.time));
    }

    Some(csv_content)
}

/// Build the export filename for the given instant
///
/// Pattern: `sleep-list-<ISO8601 timestamp>.csv`, with `:` and `.` inside the
/// timestamp replaced by `-` so the name is safe on every filesystem.
pub fn export_filename(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("sleep-list-{stamp}.csv")
}

/// Write the roster to a timestamped CSV file under `dir`
///
/// The native counterpart of the browser download: same bytes, same filename
/// pattern. An empty roster writes nothing and returns `Ok(None)`.
///
/// # Arguments
/// * `dir` - Export directory, created if missing
/// * `entries` - The roster rows
/// * `at` - Timestamp baked into the filename
///
/// # Returns
/// * `std::io::Result<Option<PathBuf>>` - Path of the written file, `None`
///   when there was nothing to export
pub fn write_export(
    dir: &Path,
    entries: &[RosterEntry],
    at: DateTime<Utc>,
) -> std::io::Result<Option<PathBuf>> {
    let Some(csv_content) = to_csv(entries) else {
        return Ok(None);
    };

    fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(at));
    fs::write(&path, csv_content)?;

    Ok(Some(path))
}

/// Wrap a field in double quotes, doubling any embedded quotes
fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
