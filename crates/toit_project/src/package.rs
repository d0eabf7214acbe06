// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! `Package`, `PackageId`, and `PackageLock`: the package/manifest model
//! backing source lookup and import-prefix resolution.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// A package identifier. Three sentinels always exist in any lock: the
/// entry package (the package containing the program's entry point), the
/// sdk package (providing the implicitly-imported core library), and the
/// virtual package (owning injected, in-memory sources).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PackageId(u32);

impl PackageId {
    pub const ENTRY: Self = Self(0);
    pub const SDK: Self = Self(1);
    pub const VIRTUAL: Self = Self(2);

    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value)
    }
}

impl From<PackageId> for usize {
    fn from(value: PackageId) -> Self {
        value.0 as usize
    }
}

impl From<usize> for PackageId {
    fn from(value: usize) -> Self {
        Self(u32::try_from(value).expect("package id should fit in u32"))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PackageState {
    Ok,
    Invalid,
    Error,
    NotFound,
}

#[derive(Clone, Debug)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub absolute_path: PathBuf,
    /// Maps an import prefix segment to the package it names, e.g. `http`
    /// in `import http.client` resolving to some dependency package.
    pub prefix_map: FxHashMap<String, PackageId>,
    pub state: PackageState,
    pub is_path_package: bool,
}

impl Package {
    #[must_use]
    pub fn entry(absolute_path: PathBuf) -> Self {
        Self {
            id: PackageId::ENTRY,
            name: String::new(),
            absolute_path,
            prefix_map: FxHashMap::default(),
            state: PackageState::Ok,
            is_path_package: true,
        }
    }

    #[must_use]
    pub fn sdk(absolute_path: PathBuf) -> Self {
        Self {
            id: PackageId::SDK,
            name: "<sdk>".to_string(),
            absolute_path,
            prefix_map: FxHashMap::default(),
            state: PackageState::Ok,
            is_path_package: false,
        }
    }

    #[must_use]
    pub fn virtual_package() -> Self {
        Self {
            id: PackageId::VIRTUAL,
            name: "<virtual>".to_string(),
            absolute_path: PathBuf::new(),
            prefix_map: FxHashMap::default(),
            state: PackageState::Ok,
            is_path_package: false,
        }
    }
}

/// An immutable snapshot derived from a manifest file.
/// Invariant: every non-virtual absolute path maps to exactly one package.
#[derive(Clone, Debug)]
pub struct PackageLock {
    packages: Vec<Package>,
    /// Sorted longest-prefix-first so `package_for` picks the most specific
    /// path-package root that contains a given file.
    roots: Vec<(PathBuf, PackageId)>,
}

impl PackageLock {
    #[must_use]
    pub fn new(packages: Vec<Package>, mut roots: Vec<(PathBuf, PackageId)>) -> Self {
        roots.sort_by_key(|(path, _)| std::cmp::Reverse(path.as_os_str().len()));
        Self { packages, roots }
    }

    /// A default lock used when no manifest is found: a single entry
    /// package rooted at `entry_dir`, with the sdk available as an implicit
    /// fallback.
    #[must_use]
    pub fn default_for(entry_dir: PathBuf, sdk_root: PathBuf) -> Self {
        let entry = Package::entry(entry_dir.clone());
        let sdk = Package::sdk(sdk_root.clone());
        let virt = Package::virtual_package();
        Self::new(
            vec![entry, sdk, virt],
            vec![(entry_dir, PackageId::ENTRY), (sdk_root, PackageId::SDK)],
        )
    }

    #[must_use]
    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn sdk(&self) -> Option<&Package> {
        self.get(PackageId::SDK)
    }

    /// Maps an absolute path to the package that owns it.
    /// Virtual paths (a reserved in-memory prefix) always map to the
    /// virtual package regardless of the roots table.
    #[must_use]
    pub fn package_for(&self, absolute_path: &Path) -> &Package {
        for (root, id) in &self.roots {
            if absolute_path.starts_with(root) {
                if let Some(pkg) = self.get(*id) {
                    return pkg;
                }
            }
        }
        self.get(PackageId::ENTRY)
            .expect("entry package always present")
    }

    /// Resolves an import `prefix` as seen from `pkg`. The sdk package's
    /// prefixes are implicit: a lookup that misses in `pkg` falls back to
    /// the sdk's prefix map before failing.
    #[must_use]
    pub fn resolve_prefix(&self, pkg: &Package, prefix: &str) -> Option<&Package> {
        if let Some(id) = pkg.prefix_map.get(prefix) {
            return self.get(*id);
        }
        if pkg.id != PackageId::SDK {
            if let Some(sdk) = self.sdk() {
                if let Some(id) = sdk.prefix_map.get(prefix) {
                    return self.get(*id);
                }
            }
        }
        None
    }
}
