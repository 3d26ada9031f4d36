//! Session directory layout.

use std::path::{Path, PathBuf};

use logir_common::types::DictionaryKind;
use logir_common::utils::error::Result;
use logir_core::ir::{ColumnarSinks, files};
use logir_core::storage::ByteSink;

/// File names within a session directory.
///
/// ```text
/// <root>/
///   session.meta
///   logtype.dict   variable.dict
///   ts.bin   logtype.bin   variable.bin     (columnar)
///   ir.stream                               (combined stream)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    root: PathBuf,
}

impl SessionLayout {
    /// Session metadata file name.
    pub const METADATA: &'static str = "session.meta";

    /// Creates a layout rooted at `root` without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the session directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Self::new(root);
        std::fs::create_dir_all(&layout.root)?;
        Ok(layout)
    }

    /// Returns the session directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the stream called `name`.
    #[must_use]
    pub fn stream(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Returns the metadata path.
    #[must_use]
    pub fn metadata(&self) -> PathBuf {
        self.stream(Self::METADATA)
    }

    /// Returns the dictionary path for `kind`.
    #[must_use]
    pub fn dictionary(&self, kind: DictionaryKind) -> PathBuf {
        self.stream(files::dictionary(kind))
    }

    /// Returns the combined stream path.
    #[must_use]
    pub fn combined(&self) -> PathBuf {
        self.stream(files::COMBINED)
    }

    /// Reads a whole stream into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.stream(name))?)
    }

    /// Opens the five columnar sinks through `open`.
    ///
    /// # Errors
    ///
    /// Returns the first error from `open`. Sinks opened before the failure
    /// are dropped.
    pub fn columnar_sinks<F>(&self, mut open: F) -> Result<ColumnarSinks>
    where
        F: FnMut(&Path) -> Result<Box<dyn ByteSink>>,
    {
        Ok(ColumnarSinks {
            logtype_dictionary: open(&self.stream(files::LOGTYPE_DICTIONARY))?,
            variable_dictionary: open(&self.stream(files::VARIABLE_DICTIONARY))?,
            timestamps: open(&self.stream(files::TIMESTAMPS))?,
            logtype_ids: open(&self.stream(files::LOGTYPE_IDS))?,
            variables: open(&self.stream(files::VARIABLES))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BufferedSink;
    use tempfile::tempdir;

    #[test]
    fn test_paths() {
        let layout = SessionLayout::new("/var/log/app/session-1");
        assert_eq!(
            layout.metadata(),
            Path::new("/var/log/app/session-1/session.meta")
        );
        assert_eq!(
            layout.dictionary(DictionaryKind::Variable),
            Path::new("/var/log/app/session-1/variable.dict")
        );
        assert_eq!(layout.combined(), Path::new("/var/log/app/session-1/ir.stream"));
    }

    #[test]
    fn test_columnar_sinks_create_files() {
        let dir = tempdir().unwrap();
        let layout = SessionLayout::create(dir.path().join("nested/session")).unwrap();

        let mut opened = Vec::new();
        let sinks = layout
            .columnar_sinks(|path| {
                opened.push(path.file_name().unwrap().to_string_lossy().into_owned());
                let sink: Box<dyn ByteSink> = Box::new(BufferedSink::create(path, 16)?);
                Ok(sink)
            })
            .unwrap();
        drop(sinks);

        assert_eq!(
            opened,
            ["logtype.dict", "variable.dict", "ts.bin", "logtype.bin", "variable.bin"]
        );
        for name in &opened {
            assert!(layout.stream(name).exists());
        }
        assert_eq!(layout.read("ts.bin").unwrap(), b"");
    }
}
