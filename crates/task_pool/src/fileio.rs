//! Small file helpers for batch pipelines.
//!
//! Sample lists for pool runs are usually line-oriented text files (one
//! sample path or record per line) or JSON; these helpers cover reading and
//! writing both without ceremony. Blank lines are skipped and all lines are
//! trimmed.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Creates the parent directory of `path` if it does not exist. A bare file
/// name is a no-op.
pub fn prepare_dir(path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Reads a file as a list of trimmed, non-blank lines.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut lines = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .with_context(|| format!("error reading line {} of {}", line_num + 1, path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        lines.push(line.to_string());
    }
    Ok(lines)
}

/// Reads a file as a list of records, one per line, split on `sep`
/// (`None` = any whitespace).
pub fn read_records(path: impl AsRef<Path>, sep: Option<&str>) -> Result<Vec<Vec<String>>> {
    let records = read_lines(path)?
        .into_iter()
        .map(|line| match sep {
            Some(sep) => line.split(sep).map(str::to_string).collect(),
            None => line.split_whitespace().map(str::to_string).collect(),
        })
        .collect();
    Ok(records)
}

/// Reads one whitespace-separated field from every line of a file.
pub fn read_field(path: impl AsRef<Path>, field: usize) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut values = Vec::new();
    for (line_num, record) in read_records(path, None)?.into_iter().enumerate() {
        match record.into_iter().nth(field) {
            Some(value) => values.push(value),
            None => bail!(
                "line {} of {} has no field {}",
                line_num + 1,
                path.display(),
                field
            ),
        }
    }
    Ok(values)
}

/// Reads a two-column whitespace-separated file as a map.
pub fn read_map(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let mut map = HashMap::new();
    for (line_num, record) in read_records(path, None)?.into_iter().enumerate() {
        if record.len() != 2 {
            bail!(
                "line {} of {}: expected 2 fields, found {}",
                line_num + 1,
                path.display(),
                record.len()
            );
        }
        let mut fields = record.into_iter();
        if let (Some(key), Some(value)) = (fields.next(), fields.next()) {
            map.insert(key, value);
        }
    }
    Ok(map)
}

/// Reads a JSON file into any deserializable value.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse JSON from {}", path.display()))
}

/// Writes lines to a text file, creating the parent directory if needed.
pub fn write_lines<S: AsRef<str>>(lines: &[S], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    prepare_dir(path)?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line.as_ref())
            .with_context(|| format!("failed to write to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

/// Writes a serializable value to a pretty-printed JSON file, creating the
/// parent directory if needed.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    prepare_dir(path)?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("failed to write JSON to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_lines_skips_blanks_and_trims() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("list.txt");
        fs::write(&path, "a.jpg 0\n\n  b.jpg 1  \n\t\nc.jpg 2\n")?;
        assert_eq!(read_lines(&path)?, vec!["a.jpg 0", "b.jpg 1", "c.jpg 2"]);
        Ok(())
    }

    #[test]
    fn test_read_field_and_map() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("labels.txt");
        fs::write(&path, "a.jpg 0\nb.jpg 1\n")?;
        assert_eq!(read_field(&path, 0)?, vec!["a.jpg", "b.jpg"]);
        assert_eq!(read_field(&path, 1)?, vec!["0", "1"]);

        let map = read_map(&path)?;
        assert_eq!(map.get("a.jpg").map(String::as_str), Some("0"));
        assert_eq!(map.len(), 2);
        Ok(())
    }

    #[test]
    fn test_read_field_out_of_range() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("short.txt");
        fs::write(&path, "only-one-field\n")?;
        assert!(read_field(&path, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_records_with_explicit_separator() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("csvish.txt");
        fs::write(&path, "a,0\nb,1\n")?;
        let records = read_records(&path, Some(","))?;
        assert_eq!(records, vec![vec!["a", "0"], vec!["b", "1"]]);
        Ok(())
    }

    #[test]
    fn test_json_round_trip_creates_directories() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/out/result.json");
        let values = vec![1u64, 2, 3];
        write_json(&values, &path)?;
        let back: Vec<u64> = read_json(&path)?;
        assert_eq!(back, values);
        Ok(())
    }

    #[test]
    fn test_write_lines_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out/list.txt");
        write_lines(&["x", "y"], &path)?;
        assert_eq!(read_lines(&path)?, vec!["x", "y"]);
        Ok(())
    }
}
