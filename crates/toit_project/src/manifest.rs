// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Manifest discovery and parsing. Package lookup recursively
//! ascends parent directories searching for a manifest file; if a project
//! root is supplied explicitly, only that directory is consulted.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE_NAME: &str = "package.lock.json";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ManifestDependency {
    pub prefix: String,
    /// A path-relative dependency (`is_path_package = true`), mutually
    /// exclusive with a registry reference.
    pub path: Option<String>,
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub name: String,
    /// An SDK version constraint, checked by the orchestrator before
    /// parsing.
    pub sdk: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
}

#[derive(Clone, Debug)]
pub struct Manifest {
    /// Directory containing the manifest file; all relative dependency
    /// paths are resolved against it.
    pub root: PathBuf,
    pub file: ManifestFile,
}

#[derive(Clone, Debug, Diagnostic, Error)]
pub enum ManifestError {
    #[error("could not read manifest at {0}")]
    Io(String),
    #[error("could not parse manifest at {0}: {1}")]
    Parse(String, String),
}

impl Manifest {
    /// Ascends from `start` looking for `package.lock.json`. Returns `Ok(None)`
    /// if none is found anywhere up to the filesystem root.
    pub fn discover(start: &Path) -> Result<Option<Manifest>, ManifestError> {
        let mut dir = if start.is_file() {
            start.parent().map(Path::to_path_buf)
        } else {
            Some(start.to_path_buf())
        };

        while let Some(candidate) = dir {
            let manifest_path = candidate.join(MANIFEST_FILE_NAME);
            if manifest_path.is_file() {
                return Self::load(&candidate).map(Some);
            }
            dir = candidate.parent().map(Path::to_path_buf);
        }

        Ok(None)
    }

    /// Loads a manifest known to live directly in `root`, without ascending
    /// parent directories (used when `project_root` is supplied explicitly).
    pub fn load(root: &Path) -> Result<Manifest, ManifestError> {
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let contents = std::fs::read_to_string(&manifest_path)
            .map_err(|e| ManifestError::Io(format!("{}: {e}", manifest_path.display())))?;
        let file: ManifestFile = serde_json::from_str(&contents)
            .map_err(|e| ManifestError::Parse(manifest_path.display().to_string(), e.to_string()))?;
        Ok(Manifest {
            root: root.to_path_buf(),
            file,
        })
    }
}
