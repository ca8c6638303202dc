//! Persistence of stub lists and datasets.
//!
//! Files are written to a sibling `.tmp` and renamed over the target, so a
//! reader never observes a half-written document and an interrupted run
//! leaves the previous output intact.

use crate::error::{ExtractError, Result};
use crate::model::{Dataset, EntryStub};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes pretty-printed JSON documents atomically.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    stubs_path: PathBuf,
    dataset_path: PathBuf,
}

impl DatasetWriter {
    pub fn new(stubs_path: impl Into<PathBuf>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            stubs_path: stubs_path.into(),
            dataset_path: dataset_path.into(),
        }
    }

    pub fn stubs_path(&self) -> &Path {
        &self.stubs_path
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn write_stubs(&self, stubs: &[EntryStub]) -> Result<()> {
        write_json(&self.stubs_path, &stubs)?;
        info!(path = %self.stubs_path.display(), count = stubs.len(), "wrote stub list");
        Ok(())
    }

    pub fn read_stubs(&self) -> Result<Vec<EntryStub>> {
        read_stubs(&self.stubs_path)
    }

    pub fn write_dataset(&self, dataset: &Dataset) -> Result<()> {
        write_json(&self.dataset_path, dataset)?;
        info!(path = %self.dataset_path.display(), count = dataset.count, "wrote dataset");
        Ok(())
    }
}

/// Load a stub list written by a previous list run.
pub fn read_stubs(path: &Path) -> Result<Vec<EntryStub>> {
    let raw = std::fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|source| ExtractError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `value` and atomically replace `path` with it.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
    }

    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');

    let tmp = tmp_path(path);
    std::fs::write(&tmp, body).map_err(|e| ExtractError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ExtractError::io(path, e)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityDetail, Record};
    use chrono::{TimeZone, Utc};

    fn writer(dir: &Path) -> DatasetWriter {
        DatasetWriter::new(dir.join("officers.json"), dir.join("out/officer_details.json"))
    }

    fn dataset() -> Dataset {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = Record::merge(
            EntryStub::new("1", "/officers/1").with_name("Kirk"),
            EntityDetail::default(),
            "https://stfc.space/officers/1",
            ts,
        );
        Dataset::new("https://stfc.space", ts, vec![record])
    }

    #[test]
    fn test_stub_file_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        w.write_stubs(&[EntryStub::new("1", "/o/1"), EntryStub::new("2", "/o/2")]).unwrap();
        w.write_stubs(&[EntryStub::new("3", "/o/3")]).unwrap();

        let stubs = w.read_stubs().unwrap();
        assert_eq!(stubs, vec![EntryStub::new("3", "/o/3")]);
        assert!(!dir.path().join("officers.json.tmp").exists());
    }

    #[test]
    fn test_dataset_creates_parent_and_ends_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        w.write_dataset(&dataset()).unwrap();

        let raw = std::fs::read_to_string(w.dataset_path()).unwrap();
        assert!(raw.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["officers"][0]["name"], "Kirk");
        assert_eq!(value["lastRun"], "2026-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_identical_input_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        w.write_dataset(&dataset()).unwrap();
        let first = std::fs::read(w.dataset_path()).unwrap();
        w.write_dataset(&dataset()).unwrap();
        let second = std::fs::read(w.dataset_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_and_malformed_stub_files() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        assert!(matches!(w.read_stubs(), Err(ExtractError::Io { .. })));

        std::fs::write(w.stubs_path(), "{not json").unwrap();
        assert!(matches!(w.read_stubs(), Err(ExtractError::Decode { .. })));
    }
}
