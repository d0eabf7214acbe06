// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Package manifest discovery and the `PackageLock`/`FileSystem`
//! abstractions.

pub mod fs;
pub mod manifest;
pub mod package;

use manifest::{Manifest, ManifestError};
use package::{Package, PackageId, PackageLock, PackageState};
use std::path::{Path, PathBuf};

/// Builds a `PackageLock` for a compilation rooted at `entry_path`, looking
/// for a manifest starting at `entry_path`'s directory, falling back to the
/// single-package default when none is found.
///
/// `project_root`, when given, pins manifest discovery to that directory
/// only rather than ascending.
pub fn load_package_lock(
    entry_path: &Path,
    project_root: Option<&Path>,
    sdk_root: PathBuf,
) -> Result<PackageLock, ManifestError> {
    let manifest = match project_root {
        Some(root) => match Manifest::load(root) {
            Ok(m) => Some(m),
            Err(ManifestError::Io(_)) => None,
            Err(e) => return Err(e),
        },
        None => Manifest::discover(entry_path)?,
    };

    let Some(manifest) = manifest else {
        let entry_dir = entry_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| entry_path.to_path_buf());
        return Ok(PackageLock::default_for(entry_dir, sdk_root));
    };

    build_lock_from_manifest(&manifest, sdk_root)
}

fn build_lock_from_manifest(manifest: &Manifest, sdk_root: PathBuf) -> Result<PackageLock, ManifestError> {
    let mut entry = Package::entry(manifest.root.clone());
    entry.name = manifest.file.name.clone();

    let sdk = Package::sdk(sdk_root.clone());
    let virt = Package::virtual_package();

    let mut packages = vec![entry, sdk, virt];
    let mut roots = vec![(manifest.root.clone(), PackageId::ENTRY), (sdk_root, PackageId::SDK)];

    for (index, dep) in manifest.file.dependencies.iter().enumerate() {
        let id = PackageId::new(u32::try_from(3 + index).expect("too many dependencies"));
        let (absolute_path, is_path_package, state) = match &dep.path {
            Some(path) => (manifest.root.join(path), true, PackageState::Ok),
            None => (PathBuf::new(), false, PackageState::NotFound),
        };

        packages.push(Package {
            id,
            name: dep.prefix.clone(),
            absolute_path: absolute_path.clone(),
            prefix_map: Default::default(),
            state,
            is_path_package,
        });

        if is_path_package {
            roots.push((absolute_path, id));
        }

        packages[0]
            .prefix_map
            .insert(dep.prefix.clone(), id);
    }

    Ok(PackageLock::new(packages, roots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, MemoryFs};

    #[test]
    fn default_lock_for_missing_manifest_has_entry_and_sdk() {
        let lock = load_package_lock(
            Path::new("/work/main.toit"),
            Some(Path::new("/nonexistent")),
            PathBuf::from("/sdk"),
        );
        // project_root points nowhere: Manifest::load fails with Io and we
        // fall back to the single-package default.
        let lock = lock.unwrap();
        assert!(lock.get(PackageId::ENTRY).is_some());
        assert!(lock.get(PackageId::SDK).is_some());
    }

    #[test]
    fn memory_fs_round_trips() {
        let mut fs = MemoryFs::new();
        fs.insert("/work/main.toit", "main:\n  print \"hi\"\n");
        let loaded = fs.load_file(Path::new("/work/main.toit")).unwrap();
        assert!(loaded.contents.contains("print"));
    }
}
