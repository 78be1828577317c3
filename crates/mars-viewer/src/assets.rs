//! Named asset loading: shader text and raw elevation data.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),

    #[error("failed to read asset `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("asset `{0}` is not valid UTF-8")]
    Utf8(String),
}

/// Loads bytes or text by name.
pub trait AssetSource {
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>, AssetError>;

    fn load_text(&self, name: &str) -> Result<String, AssetError> {
        String::from_utf8(self.load_bytes(name)?).map_err(|_| AssetError::Utf8(name.to_owned()))
    }
}

/// Assets below a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssets {
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.root.join(name);
        log::debug!("Loading asset {}", path.display());

        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound(name.to_owned()),
            _ => AssetError::Io {
                name: name.to_owned(),
                source,
            },
        })
    }
}

/// Assets held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl AssetSource for MemoryAssets {
    fn load_bytes(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_owned()))
    }
}
