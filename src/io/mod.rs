/// File helpers for extensions
///
/// Output files are written with their parent directories created on demand. CSV
/// input is read with a header row into one payload per record.

use crate::storage::types::{Payload, Value};
use anyhow::{Context as _, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Write a UTF-8 text file, creating parent directories
pub fn write_text(path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
    write_bytes(path, content.as_bytes())
}

/// Write a binary file, creating parent directories
pub fn write_bytes(path: impl AsRef<Path>, content: &[u8]) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!("📝 Wrote {} ({} bytes)", path.display(), content.len());
    Ok(path.to_path_buf())
}

pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read a CSV file with a header row into one payload per record
///
/// Cells are kept as text (trimmed); empty cells are left out so optional fields
/// fall back to their defaults.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Payload>> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    parse_csv(file).with_context(|| format!("failed to parse CSV {}", path.display()))
}

/// Parse CSV from any reader (see `read_csv`)
pub fn parse_csv(input: impl std::io::Read) -> Result<Vec<Payload>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid CSV record {}", index + 1))?;
        let row: Payload = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(header, cell)| (header.to_string(), Value::from(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Replace spaces so a project name can be used as a file or folder name
///
/// Fails for names that would not stay a single entry in the output directory
/// (empty, `.`/`..`, absolute or containing a separator).
pub fn file_stem(name: &str) -> Result<String> {
    let stem = name.trim().replace(' ', "_");
    let mut components = Path::new(&stem).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || stem.contains(|c: char| c == '/' || c == '\\') {
        anyhow::bail!("'{}' cannot be used as a file or folder name", name);
    }
    Ok(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_become_text_payloads_without_empty_cells() {
        let data = "text,style,color\nHello world,bold,\n  Second , ,#112233\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["text"], Value::from("Hello world"));
        assert!(!rows[0].contains_key("color"));
        assert_eq!(rows[1]["text"], Value::from("Second"));
        assert!(!rows[1].contains_key("style"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let data = "a,b\n1,2,3\n";
        assert!(parse_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_text(dir.path().join("deep/nested/out.md"), "# hi").unwrap();
        assert_eq!(read_text(&path).unwrap(), "# hi");
    }

    #[test]
    fn file_stem_replaces_spaces() {
        assert_eq!(file_stem(" Summer Launch ").unwrap(), "Summer_Launch");
    }

    #[test]
    fn file_stem_refuses_names_that_leave_the_directory() {
        for name in ["", "   ", ".", "..", "../escaped", "a/b", "/etc/passwd", "..\\up"] {
            assert!(file_stem(name).is_err(), "{:?} was accepted", name);
        }
        assert_eq!(file_stem("v1.2 final").unwrap(), "v1.2_final");
    }
}
