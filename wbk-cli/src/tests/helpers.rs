//! Test helpers for writing mapping workspaces to disk.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

pub(super) const SCHOOLS_CSV: &str = "name,district\nColegio A,Los Andes\nColegio B,Los Andes\n";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write file");
}

/// A temporary directory holding a mapping file and its CSV input.
pub(super) struct MappingWorkspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl MappingWorkspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn mapping(&self) -> Utf8PathBuf {
        self.root.join("schools.json")
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("entities.db")
    }

    /// Write a create-only mapping over `data/schools.csv`.
    pub(super) fn write_schools(&self, csv: &str) {
        fs::create_dir_all(self.root.join("data").as_std_path()).expect("create data dir");
        write_utf8(&self.root.join("data/schools.csv"), csv.as_bytes());
        let mapping = serde_json::json!({
            "name": "schools",
            "language": "es",
            "csv_files": [{
                "file_path": "data/schools.csv",
                "mappings": [{
                    "item": {"label": "{name}", "description": "Escuela en {district}"}
                }]
            }]
        });
        write_utf8(&self.mapping(), mapping.to_string().as_bytes());
    }
}
