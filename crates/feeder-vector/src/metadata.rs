//! Plain-text record store that sits next to the vector index.
//!
//! One record per line, `file_path||text`, line number == record id. Backslash,
//! newline and carriage return are escaped so a chunk never spans lines; the
//! `||` delimiter itself is not escaped.

use anyhow::Result;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use feeder_core::error::Error;
use feeder_core::types::{MetadataRecord, RecordId};

pub const DELIMITER: &str = "||";

#[derive(Debug, Default)]
pub struct RecordStore { slots: Vec<Option<MetadataRecord>> }

impl RecordStore {
    /// Overwrite `path` with `records`. Record `i` must carry id `i`.
    pub fn write(path: &Path, records: &[MetadataRecord]) -> Result<()> {
        Self::stage(path, records)?.commit()
    }

    /// Write `records` to a temp file beside `path`; `path` is untouched until `commit`.
    pub fn stage(path: &Path, records: &[MetadataRecord]) -> Result<StagedRecords> {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) { Some(parent) => parent.to_path_buf(), None => PathBuf::from(".") };
        fs::create_dir_all(&dir)?;
        let file = NamedTempFile::new_in(&dir)?;
        let mut out = BufWriter::new(file.as_file());
        for (pos, record) in records.iter().enumerate() {
            if record.id != pos as RecordId {
                return Err(Error::Operation(format!("record at line {} carries id {}", pos, record.id)).into());
            }
            writeln!(out, "{}{}{}", escape(&record.file_path), DELIMITER, escape(&record.text))?;
        }
        out.flush()?;
        drop(out);
        Ok(StagedRecords { file, target: path.to_path_buf(), count: records.len() })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("metadata file {}", path.display())).into());
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Blank and malformed lines leave a vacant slot so later ids never shift.
    pub fn parse(contents: &str) -> Self {
        let slots = contents
            .lines()
            .enumerate()
            .map(|(line_no, line)| {
                if line.trim().is_empty() { return None; }
                let Some((file_path, text)) = line.split_once(DELIMITER) else {
                    warn!("Skipping malformed metadata line {}: {}", line_no + 1, line);
                    return None;
                };
                Some(MetadataRecord { id: line_no as RecordId, file_path: unescape(file_path), text: unescape(text) })
            })
            .collect();
        Self { slots }
    }

    pub fn get(&self, id: RecordId) -> Option<&MetadataRecord> {
        usize::try_from(id).ok().and_then(|i| self.slots.get(i)).and_then(Option::as_ref)
    }

    /// Number of line slots, vacant ones included.
    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn records(&self) -> impl Iterator<Item = &MetadataRecord> { self.slots.iter().flatten() }
}

/// Metadata written to a temp file, waiting to replace its target.
#[derive(Debug)]
pub struct StagedRecords { file: NamedTempFile, target: PathBuf, count: usize }

impl StagedRecords {
    pub fn target(&self) -> &Path { &self.target }

    /// Rename the temp file over the target. Dropping without commit deletes it.
    pub fn commit(self) -> Result<()> {
        self.file.persist(&self.target).map_err(|e| e.error)?;
        debug!("Wrote {} metadata records to {}", self.count, self.target.display());
        Ok(())
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' { out.push(c); continue; }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: RecordId, file_path: &str, text: &str) -> MetadataRecord {
        MetadataRecord { id, file_path: file_path.into(), text: text.into() }
    }

    #[test]
    fn multiline_text_stays_on_one_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("metadata.txt");
        let records = vec![rec(0, "src/main.rs", "fn main() {\n    println!(\"a\\b\");\r\n}"), rec(1, "b.txt", "plain")];
        RecordStore::write(&path, &records).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
        let store = RecordStore::load(&path).unwrap();
        assert_eq!(store.get(0), Some(&records[0]));
        assert_eq!(store.get(1), Some(&records[1]));
    }

    #[test]
    fn malformed_line_keeps_later_ids_in_place() {
        let store = RecordStore::parse("a.py||one\nno delimiter here\n\nd.py||four\n");
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(0).map(|r| r.text.as_str()), Some("one"));
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_none());
        assert_eq!(store.get(3).map(|r| r.file_path.as_str()), Some("d.py"));
        assert_eq!(store.records().count(), 2);
    }

    #[test]
    fn splits_on_first_delimiter_only() {
        let store = RecordStore::parse("a.rs||x || y\n");
        assert_eq!(store.get(0).map(|r| r.text.as_str()), Some("x || y"));
    }

    #[test]
    fn out_of_range_id_is_none() {
        let store = RecordStore::parse("a.rs||x\n");
        assert!(store.get(1).is_none());
        assert!(store.get(u64::MAX).is_none());
    }

    #[test]
    fn staged_records_leave_target_alone_until_commit() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("metadata.txt");
        fs::write(&path, "old.rs||previous build\n").unwrap();

        let staged = RecordStore::stage(&path, &[rec(0, "new.rs", "next build")]).unwrap();
        assert_eq!(staged.target(), path.as_path());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old.rs||previous build\n");

        staged.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new.rs||next build\n");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1, "no temp file left behind");
    }

    #[test]
    fn dropped_stage_discards_temp_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("metadata.txt");
        drop(RecordStore::stage(&path, &[rec(0, "a.rs", "x")]).unwrap());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_rejects_ids_that_are_not_line_numbers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = RecordStore::write(&tmp.path().join("m.txt"), &[rec(3, "a", "b")]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Operation(_))));
    }
}
