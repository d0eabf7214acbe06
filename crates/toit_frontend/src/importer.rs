// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Unit loader / importer. Transitive parse-and-load driven by `import`
//! nodes, BFS from the entry unit.

use crate::{
    diagnostics::{DiagnosticsBus, Sink},
    source_manager::{LoadOutcome, Source, SourceManager, VIRTUAL_PREFIX},
};
use std::{collections::VecDeque, path::PathBuf};
use toit_ast::ast::{Unit, UnitId};
use toit_project::{fs::FileSystem, package::PackageLock};

/// Parsing concrete syntax into `Unit`/`Declaration`/`Expression` trees is an
/// external collaborator; the loader only needs *something* that turns file
/// contents into a `Unit`, so it is injected as a trait object rather than
/// implemented in this crate.
pub trait UnitParser {
    fn parse(&self, unit_id: UnitId, absolute_path: &str, contents: &str) -> Unit;
}

const TOIT_EXTENSION: &str = "toit";

pub struct Importer<'a> {
    fs: &'a dyn FileSystem,
    parser: &'a dyn UnitParser,
    lock: &'a PackageLock,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, parser: &'a dyn UnitParser, lock: &'a PackageLock) -> Self {
        Self { fs, parser, lock }
    }

    /// Loads `entry_path` and the implicit core library, then transitively
    /// loads every import reachable from them. The core library is always
    /// at unit index 1 regardless of the entry package.
    pub fn load_all<S: Sink>(
        &self,
        sources: &mut SourceManager,
        diagnostics: &mut DiagnosticsBus<S>,
        entry_path: &str,
        core_path: Option<&str>,
    ) -> Vec<Unit> {
        let mut units: Vec<Unit> = Vec::new();
        let mut queue: VecDeque<UnitId> = VecDeque::new();

        let entry_unit = self.load_unit(sources, diagnostics, UnitId::ENTRY, entry_path);
        units.push(entry_unit);
        queue.push_back(UnitId::ENTRY);

        if let Some(core_path) = core_path {
            let core_unit = self.load_unit(sources, diagnostics, UnitId::CORE, core_path);
            units.push(core_unit);
            queue.push_back(UnitId::CORE);
        }

        while let Some(unit_id) = queue.pop_front() {
            let imports = units[usize::from(unit_id)].imports.clone();
            for (import_index, import) in imports.iter().enumerate() {
                if import.resolved_unit.is_some() {
                    continue;
                }

                let unit_path = units[usize::from(unit_id)].source_path.clone();

                if Source::is_virtual_path(&unit_path) && import.is_relative {
                    diagnostics.report_error(
                        Some(import.span),
                        "virtual files cannot use relative imports",
                    );
                    let error_id = UnitId::new(u32::try_from(units.len()).expect("unit count"));
                    units.push(self.synthesize_error_unit(error_id));
                    units[usize::from(unit_id)].imports[import_index].resolved_unit = Some(error_id);
                    continue;
                }

                let Some(target_path) = self.compute_target_path(&unit_path, import) else {
                    diagnostics.report_error(
                        Some(import.span),
                        format!(
                            "dotting out of the package at '{unit_path}' is not allowed",
                        ),
                    );
                    let error_id = UnitId::new(u32::try_from(units.len()).expect("unit count"));
                    units.push(self.synthesize_error_unit(error_id));
                    units[usize::from(unit_id)].imports[import_index].resolved_unit = Some(error_id);
                    continue;
                };

                match self.resolve_and_load(sources, diagnostics, &target_path, units.len()) {
                    Some(unit) => {
                        let unit_id_new = unit.id;
                        units.push(unit);
                        units[usize::from(unit_id)].imports[import_index].resolved_unit = Some(unit_id_new);
                        queue.push_back(unit_id_new);
                    }
                    None => {
                        let error_id = UnitId::new(u32::try_from(units.len()).expect("unit count"));
                        units.push(self.synthesize_error_unit(error_id));
                        units[usize::from(unit_id)].imports[import_index].resolved_unit = Some(error_id);
                    }
                }
            }
        }

        units
    }

    fn load_unit<S: Sink>(
        &self,
        sources: &mut SourceManager,
        diagnostics: &mut DiagnosticsBus<S>,
        unit_id: UnitId,
        absolute_path: &str,
    ) -> Unit {
        match sources.load_file(self.fs, absolute_path, self.lock.package_for(std::path::Path::new(absolute_path)).id) {
            LoadOutcome::Ok => {
                let contents = sources.get(absolute_path).expect("just loaded").contents.clone();
                self.parser.parse(unit_id, absolute_path, &contents)
            }
            _ => {
                diagnostics.report_error(None, format!("cannot load entry file '{absolute_path}'"));
                self.synthesize_error_unit(unit_id)
            }
        }
    }

    fn synthesize_error_unit(&self, unit_id: UnitId) -> Unit {
        Unit {
            id: unit_id,
            source_path: format!("{VIRTUAL_PREFIX}error-unit-{unit_id}").into(),
            imports: vec![],
            exports: vec![],
            declarations: vec![],
            toitdoc: None,
            is_error_unit: true,
        }
    }

    /// Computes the absolute path an import targets, before trying the two
    /// filename expansions.
    fn compute_target_path(&self, unit_path: &str, import: &toit_ast::ast::Import) -> Option<String> {
        if import.is_relative {
            let mut dir = PathBuf::from(unit_path).parent()?.to_path_buf();
            for _ in 0..import.dot_outs {
                dir = dir.parent()?.to_path_buf();
            }
            let owner = self.lock.package_for(std::path::Path::new(unit_path));
            let target = join_segments(&dir, &import.segments);
            if !target.starts_with(&owner.absolute_path) {
                // Dotting out of the owning package.
                return None;
            }
            Some(target.to_string_lossy().into_owned())
        } else {
            let owner = self.lock.package_for(std::path::Path::new(unit_path));
            let mut segments = import.segments.iter();
            let first = segments.next()?;
            let target_package = self
                .lock
                .resolve_prefix(owner, &first.name)
                .unwrap_or(owner);
            let rest: Vec<_> = if self.lock.resolve_prefix(owner, &first.name).is_some() {
                import.segments[1..].to_vec()
            } else {
                import.segments.clone()
            };
            let target = join_segments(&target_package.absolute_path, &rest);
            Some(target.to_string_lossy().into_owned())
        }
    }

    /// Tries `<segments-joined>.toit`, then falls back to
    /// `<segments-joined>/<last-segment>.toit`.
    fn resolve_and_load<S: Sink>(
        &self,
        sources: &mut SourceManager,
        diagnostics: &mut DiagnosticsBus<S>,
        target_base: &str,
        next_index: usize,
    ) -> Option<Unit> {
        let direct = format!("{target_base}.{TOIT_EXTENSION}");
        let package_id = self
            .lock
            .package_for(std::path::Path::new(target_base))
            .id;

        if let LoadOutcome::Ok = sources.load_file(self.fs, &direct, package_id) {
            let unit_id = UnitId::new(u32::try_from(next_index).expect("unit count"));
            let contents = sources.get(&direct).expect("just loaded").contents.clone();
            return Some(self.parser.parse(unit_id, &direct, &contents));
        }

        let last_segment = target_base
            .rsplit(std::path::MAIN_SEPARATOR)
            .next()
            .unwrap_or(target_base);
        let nested = format!("{target_base}{}{last_segment}.{TOIT_EXTENSION}", std::path::MAIN_SEPARATOR);

        if let LoadOutcome::Ok = sources.load_file(self.fs, &nested, package_id) {
            let unit_id = UnitId::new(u32::try_from(next_index).expect("unit count"));
            let contents = sources.get(&nested).expect("just loaded").contents.clone();
            return Some(self.parser.parse(unit_id, &nested, &contents));
        }

        diagnostics.report_error(None, self.missing_import_message(target_base, &direct, &nested));
        None
    }

    /// Walks the segment chain to compute the deepest existing prefix and
    /// produce a precise note.
    fn missing_import_message(&self, target_base: &str, direct: &str, nested: &str) -> String {
        let mut prefix = PathBuf::new();
        let mut deepest_existing = PathBuf::from("/");
        for component in PathBuf::from(target_base).components() {
            prefix.push(component);
            if self.fs.is_directory(&prefix) {
                deepest_existing = prefix.clone();
            }
        }

        if self.fs.is_directory(&deepest_existing) && deepest_existing != PathBuf::from(target_base) {
            let missing_segment = target_base
                .rsplit(std::path::MAIN_SEPARATOR)
                .next()
                .unwrap_or(target_base);
            format!("Folder exists but is missing '{missing_segment}.{TOIT_EXTENSION}'")
        } else {
            format!("Missing library file. Tried {direct} and {nested}")
        }
    }
}

fn join_segments(base: &std::path::Path, segments: &[toit_ast::ast::Ident]) -> PathBuf {
    let mut path = base.to_path_buf();
    for segment in segments {
        path.push(segment.name.as_ref());
    }
    path
}
