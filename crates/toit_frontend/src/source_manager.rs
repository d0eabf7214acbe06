// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Source manager and package-lock glue. Maps paths to immutable sources,
//! memoizing by absolute path, and offers the position→(line, column)
//! location service every diagnostic renders through.

use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use toit_data_structures::{
    line_column::{Encoding, Position},
    span::Span,
};
use toit_project::{
    fs::{FileSystem, LoadError},
    package::PackageId,
};

/// A reserved path prefix marking in-memory, injected content rather than a
/// real file on disk.
pub const VIRTUAL_PREFIX: &str = "\u{0}virtual:";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    Ok,
    NotFound,
    NotRegularFile,
    FileError,
}

/// An immutable byte buffer with its owning path, package, and a cheap
/// location service.
#[derive(Clone, Debug)]
pub struct Source {
    pub absolute_path: Arc<str>,
    pub package_id: PackageId,
    pub contents: Arc<str>,
    pub is_virtual: bool,
}

impl Source {
    #[must_use]
    pub fn is_virtual_path(path: &str) -> bool {
        path.starts_with(VIRTUAL_PREFIX)
    }
}

/// The result of `compute_location`: a span's containing source plus its
/// human-facing position.
#[derive(Clone, Debug)]
pub struct Location<'a> {
    pub source: &'a Source,
    /// 1-based line number.
    pub line: u32,
    pub offset_in_line: u32,
    pub offset_in_source: u32,
}

#[derive(Debug, Default)]
pub struct SourceManager {
    sources: FxHashMap<String, Source>,
    /// The SDK/library root used to locate the implicit core module.
    library_root: Option<PathBuf>,
}

impl SourceManager {
    #[must_use]
    pub fn new(library_root: Option<PathBuf>) -> Self {
        Self {
            sources: FxHashMap::default(),
            library_root,
        }
    }

    #[must_use]
    pub fn library_root(&self) -> Option<&Path> {
        self.library_root.as_deref()
    }

    pub fn load_file(
        &mut self,
        fs: &dyn FileSystem,
        absolute_path: &str,
        package_id: PackageId,
    ) -> LoadOutcome {
        if let Some(existing) = self.sources.get(absolute_path) {
            debug_assert_eq!(existing.package_id, package_id);
            return LoadOutcome::Ok;
        }

        let is_virtual = Source::is_virtual_path(absolute_path);
        if is_virtual {
            // Virtual content must already have been `insert_virtual`-ed by
            // the caller; nothing to load from disk.
            return if self.sources.contains_key(absolute_path) {
                LoadOutcome::Ok
            } else {
                LoadOutcome::NotFound
            };
        }

        match fs.load_file(Path::new(absolute_path)) {
            Ok(loaded) => {
                self.sources.insert(
                    absolute_path.to_string(),
                    Source {
                        absolute_path: Arc::from(absolute_path),
                        package_id,
                        contents: loaded.contents,
                        is_virtual: false,
                    },
                );
                LoadOutcome::Ok
            }
            Err(LoadError::NotFound) => LoadOutcome::NotFound,
            Err(LoadError::NotRegularFile) => LoadOutcome::NotRegularFile,
            Err(LoadError::FileError) => LoadOutcome::FileError,
        }
    }

    pub fn insert_virtual(&mut self, absolute_path: String, contents: impl Into<Arc<str>>, package_id: PackageId) {
        self.sources.insert(
            absolute_path.clone(),
            Source {
                absolute_path: Arc::from(absolute_path),
                package_id,
                contents: contents.into(),
                is_virtual: true,
            },
        );
    }

    #[must_use]
    pub fn get(&self, absolute_path: &str) -> Option<&Source> {
        self.sources.get(absolute_path)
    }

    #[must_use]
    pub fn compute_location<'a>(&'a self, absolute_path: &str, span: Span) -> Option<Location<'a>> {
        let source = self.get(absolute_path)?;
        let pos = Position::from_utf8_byte_offset(Encoding::Utf8, &source.contents, span.lo);
        let line_start = source.contents[..span.lo as usize]
            .rfind('\n')
            .map_or(0, |idx| idx + 1);
        Some(Location {
            source,
            line: pos.line + 1,
            offset_in_line: span.lo - u32::try_from(line_start).expect("offset fits u32"),
            offset_in_source: span.lo,
        })
    }
}
