//! Fixture files: named test data loaded from a fixtures folder.

use crate::result::{ProbeError, ProbeResult};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A file ready to be handed to a file input
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// File name (no directory)
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// File contents
    pub buffer: Vec<u8>,
}

impl fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePayload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.buffer.len())
            .finish()
    }
}

impl FilePayload {
    /// Payload with an explicit MIME type
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, buffer: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            buffer,
        }
    }

    /// Payload with the MIME type guessed from the name's extension
    pub fn from_bytes(name: impl Into<String>, buffer: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            buffer,
        }
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

/// Loads fixtures by name from a directory and from in-memory entries
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    root: Option<PathBuf>,
    inline: BTreeMap<String, Vec<u8>>,
}

impl FixtureStore {
    /// Store reading from a fixtures directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            inline: BTreeMap::new(),
        }
    }

    /// Store with no directory
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Add an in-memory fixture; it shadows a file of the same name
    #[must_use]
    pub fn with_fixture(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.inline.insert(name.into(), bytes.into());
        self
    }

    /// Fixtures directory
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Load a fixture by name, relative to the fixtures directory
    pub fn load(&self, name: &str) -> ProbeResult<FilePayload> {
        let fail = |message: String| ProbeError::Fixture {
            name: name.to_string(),
            message,
        };
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| fail("not a file name".into()))?
            .to_string();

        if let Some(bytes) = self.inline.get(name) {
            return Ok(FilePayload::from_bytes(file_name, bytes.clone()));
        }
        let relative = Path::new(name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(fail("fixture names must stay inside the fixtures folder".into()));
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| fail("no fixtures folder configured".into()))?;
        let path = root.join(relative);
        let buffer = std::fs::read(&path).map_err(|e| fail(format!("{}: {e}", path.display())))?;
        debug!(fixture = name, bytes = buffer.len(), "loaded fixture");
        Ok(FilePayload::from_bytes(file_name, buffer))
    }

    /// Load a file given the way a test wrote it: a fixture name, a path that
    /// ends in a known fixture, or a path on disk
    pub fn load_path(&self, path: &Path) -> ProbeResult<FilePayload> {
        let display = path.to_string_lossy().to_string();
        if let Ok(payload) = self.load(&display) {
            return Ok(payload);
        }
        if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if let Ok(payload) = self.load(file_name) {
                return Ok(payload);
            }
        }
        let buffer = std::fs::read(path).map_err(|e| ProbeError::Fixture {
            name: display.clone(),
            message: format!("not found in fixtures or on disk: {e}"),
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(display.as_str())
            .to_string();
        Ok(FilePayload::from_bytes(file_name, buffer))
    }

    /// Load a fixture and parse it as JSON
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> ProbeResult<T> {
        let payload = self.load(name)?;
        Ok(serde_json::from_slice(&payload.buffer)?)
    }

    /// Names of all available fixtures, sorted
    pub fn list(&self) -> ProbeResult<Vec<String>> {
        let mut names: Vec<String> = self.inline.keys().cloned().collect();
        if let Some(root) = &self.root {
            if root.is_dir() {
                for entry in std::fs::read_dir(root)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        names.push(entry.file_name().to_string_lossy().to_string());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}
