//! Persist generated files
//!
//! Layout: `<root>/<directory...>/<file_name>`. Directories are created on
//! demand. When a package marker is configured, every directory below the root
//! gets one unless it already exists. Each file is written in one call.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::generator::GeneratedFile;
use crate::{Error, Result};

/// Writes [`GeneratedFile`]s below a target root
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
    package_marker: Option<&'static str>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>, package_marker: Option<&'static str>) -> Self {
        Self {
            root: root.into(),
            package_marker,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one file, returning its path
    pub fn write(&self, file: &GeneratedFile) -> Result<PathBuf> {
        let mut path = self.root.clone();
        create_dir(&path)?;

        for segment in &file.directory {
            path.push(segment);
            create_dir(&path)?;
            if let Some(marker) = self.package_marker {
                let marker = path.join(marker);
                if !marker.exists() {
                    write_file(&marker, "")?;
                }
            }
        }

        path.push(&file.file_name);
        write_file(&path, &file.source)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(directory: &[&str], name: &str, source: &str) -> GeneratedFile {
        GeneratedFile {
            id: name.to_string(),
            directory: directory.iter().map(|s| s.to_string()).collect(),
            file_name: name.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("out"), None);

        let path = writer.write(&file(&["a", "b"], "X.cs", "class X {}")).unwrap();
        assert_eq!(path, dir.path().join("out/a/b/X.cs"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class X {}");
    }

    #[test]
    fn test_marker_kept_when_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/__init__.py"), "VERSION = 1\n").unwrap();

        let writer = OutputWriter::new(dir.path(), Some("__init__.py"));
        writer.write(&file(&["pkg", "sub"], "m.py", "")).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("pkg/__init__.py")).unwrap(), "VERSION = 1\n");
        assert!(dir.path().join("pkg/sub/__init__.py").is_file());
        assert!(!dir.path().join("__init__.py").exists());
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), None);
        writer.write(&file(&[], "a.msg", "old")).unwrap();
        let path = writer.write(&file(&[], "a.msg", "new")).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "new");
    }

    #[test]
    fn test_write_failure_reports_path() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let writer = OutputWriter::new(blocker.path(), None);

        let err = writer.write(&file(&["pkg"], "a.msg", "")).unwrap_err();
        match err {
            Error::Write { path, .. } => assert_eq!(path, blocker.path()),
            other => panic!("unexpected error: {}", other),
        }
    }
}
