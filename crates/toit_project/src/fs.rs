// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The filesystem abstraction the core reads through. Concrete transports
//! (local disk, socket, multiplexed stdio, in-memory) are external
//! collaborators; this trait is the seam they plug into.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadError {
    NotFound,
    NotRegularFile,
    FileError,
}

#[derive(Clone, Debug)]
pub struct LoadedFile {
    pub absolute_path: PathBuf,
    pub contents: Arc<str>,
}

/// Abstracts over the four LSP transport variants: local
/// filesystem, TCP socket, multiplexed stdio, and an in-memory map used by
/// tests and the virtual-source package.
pub trait FileSystem {
    fn load_file(&self, absolute_path: &Path) -> Result<LoadedFile, LoadError>;
    fn list_directory(&self, absolute_path: &Path) -> Result<Vec<PathBuf>, LoadError>;
    fn is_regular_file(&self, absolute_path: &Path) -> bool;
    fn is_directory(&self, absolute_path: &Path) -> bool;
}

/// The default, local-disk implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFs;

impl FileSystem for StdFs {
    fn load_file(&self, absolute_path: &Path) -> Result<LoadedFile, LoadError> {
        let metadata = std::fs::metadata(absolute_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound
            } else {
                LoadError::FileError
            }
        })?;
        if !metadata.is_file() {
            return Err(LoadError::NotRegularFile);
        }
        let contents = std::fs::read_to_string(absolute_path).map_err(|_| LoadError::FileError)?;
        Ok(LoadedFile {
            absolute_path: absolute_path.to_path_buf(),
            contents: Arc::from(contents),
        })
    }

    fn list_directory(&self, absolute_path: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let entries = std::fs::read_dir(absolute_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound
            } else {
                LoadError::FileError
            }
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| LoadError::FileError)?;
            paths.push(entry.path());
        }
        Ok(paths)
    }

    fn is_regular_file(&self, absolute_path: &Path) -> bool {
        absolute_path.is_file()
    }

    fn is_directory(&self, absolute_path: &Path) -> bool {
        absolute_path.is_dir()
    }
}

/// An in-memory filesystem for tests and the virtual-source package.
#[derive(Clone, Debug, Default)]
pub struct MemoryFs {
    files: rustc_hash::FxHashMap<PathBuf, Arc<str>>,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Arc<str>>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl FileSystem for MemoryFs {
    fn load_file(&self, absolute_path: &Path) -> Result<LoadedFile, LoadError> {
        self.files
            .get(absolute_path)
            .map(|contents| LoadedFile {
                absolute_path: absolute_path.to_path_buf(),
                contents: contents.clone(),
            })
            .ok_or(LoadError::NotFound)
    }

    fn list_directory(&self, absolute_path: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let children: Vec<_> = self
            .files
            .keys()
            .filter(|p| p.parent() == Some(absolute_path))
            .cloned()
            .collect();
        if children.is_empty() {
            Err(LoadError::NotFound)
        } else {
            Ok(children)
        }
    }

    fn is_regular_file(&self, absolute_path: &Path) -> bool {
        self.files.contains_key(absolute_path)
    }

    fn is_directory(&self, absolute_path: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(absolute_path))
    }
}
