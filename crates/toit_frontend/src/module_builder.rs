// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Module and scope builder. Builds per-module scope and resolves
//! `show`/`export` across the unit graph, with cycle detection for export
//! chains.

use crate::diagnostics::{DiagnosticsBus, Sink};
use rustc_hash::FxHashMap;
use toit_ast::ast::{ExportKind, Unit, UnitId};

/// Where a name in a module's top-level scope ultimately comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    /// Declared directly in this module; the index is into that unit's
    /// `declarations`.
    Local(usize),
    /// Bound by an explicit `show X` from some imported module.
    Shown { source: UnitId, name: String },
}

#[derive(Clone, Debug, Default)]
pub struct ModuleTable {
    pub unit_id: UnitId,
    /// Top-level declaration name -> its index, direct from this unit.
    pub declared: FxHashMap<String, usize>,
    /// Explicit `show` bindings, resolved against the showing import's
    /// target module.
    pub shown: FxHashMap<String, Binding>,
    /// `import foo as prefix` bindings: prefix -> imported module.
    pub prefixes: FxHashMap<String, UnitId>,
    /// Modules imported without a prefix; their exported names are visible
    /// unqualified unless ambiguous.
    pub non_prefixed_imports: Vec<UnitId>,
    /// `export X` names declared directly (not `export *`).
    pub export_names: Vec<String>,
    pub export_all: bool,
    /// Filled by `resolve_exports`: name -> binding, after following `show`
    /// and transitive re-export chains.
    pub exported: FxHashMap<String, Binding>,
}

/// First pass: collect declarations, prefixes, and explicit `show` bindings
/// for every module. Detects clashes between declarations, other shows, and
/// existing prefixes.
pub fn build_module_tables<S: Sink>(
    units: &[Unit],
    diagnostics: &mut DiagnosticsBus<S>,
) -> Vec<ModuleTable> {
    let mut tables = vec![ModuleTable::default(); units.len()];

    for (index, unit) in units.iter().enumerate() {
        let table = &mut tables[index];
        table.unit_id = unit.id;

        for (decl_index, decl) in unit.declarations.iter().enumerate() {
            let name = decl.name().name.to_string();
            if table.declared.insert(name.clone(), decl_index).is_some() {
                diagnostics.report_error(
                    Some(decl.span()),
                    format!("'{name}' is already declared in this module"),
                );
            }
        }

        for import in &unit.imports {
            let Some(target) = import.resolved_unit else {
                continue;
            };

            if let Some(prefix) = &import.prefix {
                if table.declared.contains_key(prefix.name.as_ref()) {
                    diagnostics.report_error(
                        Some(prefix.span),
                        format!("prefix '{}' clashes with a declaration", prefix.name),
                    );
                }
                table.prefixes.insert(prefix.name.to_string(), target);
            } else {
                table.non_prefixed_imports.push(target);
            }

            if import.show_all {
                // `show *` binds every exported identifier; resolved lazily
                // once the target module's exports are known (second pass).
                table.non_prefixed_imports.push(target);
            }

            for shown in &import.show_identifiers {
                let name = shown.name.to_string();
                if table.declared.contains_key(&name) {
                    diagnostics.report_error(Some(shown.span), format!("'{name}' is already declared"));
                    continue;
                }
                if let Some(existing) = table.shown.get(&name) {
                    if existing != &(Binding::Shown { source: target, name: name.clone() }) {
                        diagnostics.report_error(Some(shown.span), format!("'{name}' is shown from two different modules"));
                    }
                    continue;
                }
                table.shown.insert(
                    name.clone(),
                    Binding::Shown {
                        source: target,
                        name,
                    },
                );
            }
        }

        for export in &unit.exports {
            match &export.kind {
                ExportKind::Name(ident) => table.export_names.push(ident.name.to_string()),
                ExportKind::All => table.export_all = true,
            }
        }
    }

    tables
}

/// Resolves a single name as visible inside `module`'s scope: declared,
/// then explicit `show`, then transitively through non-prefixed imports
/// (the same order export resolution uses, reused for plain in-module
/// lookup too).
#[must_use]
pub fn resolve_in_module(tables: &[ModuleTable], unit_id: UnitId, name: &str) -> Option<Binding> {
    let table = &tables[usize::from(unit_id)];
    if let Some(&decl_index) = table.declared.get(name) {
        return Some(Binding::Local(decl_index));
    }
    if let Some(binding) = table.shown.get(name) {
        return Some(binding.clone());
    }
    for &imported in &table.non_prefixed_imports {
        if let Some(binding) = resolve_export(tables, imported, name, &mut Vec::new()) {
            return Some(binding);
        }
    }
    None
}

/// Resolves `name` as exported by `unit_id`, following `export X` and
/// `export *` chains. `in_progress` carries the export-cycle DFS stack; a
/// revisit means a cycle, which the caller is expected to have already
/// diagnosed via `check_export_cycles`.
fn resolve_export(
    tables: &[ModuleTable],
    unit_id: UnitId,
    name: &str,
    in_progress: &mut Vec<UnitId>,
) -> Option<Binding> {
    if in_progress.contains(&unit_id) {
        return None;
    }
    in_progress.push(unit_id);

    let table = &tables[usize::from(unit_id)];
    let result = if table.export_names.iter().any(|n| n == name) || table.export_all {
        if let Some(&decl_index) = table.declared.get(name) {
            Some(Binding::Local(decl_index))
        } else if let Some(binding) = table.shown.get(name) {
            Some(binding.clone())
        } else if table.export_all {
            table
                .non_prefixed_imports
                .iter()
                .find_map(|&imported| resolve_export(tables, imported, name, in_progress))
        } else {
            None
        }
    } else {
        None
    };

    in_progress.pop();
    result
}

/// Detects export cycles with a DFS over an in-progress stack, emitting one
/// diagnostic group per cycle so every participating module reports
/// symmetrically.
pub fn check_export_cycles<S: Sink>(tables: &[ModuleTable], diagnostics: &mut DiagnosticsBus<S>) {
    let mut reported: Vec<Vec<UnitId>> = Vec::new();

    for table in tables {
        if !table.export_all {
            continue;
        }
        let mut stack = vec![table.unit_id];
        if let Some(cycle) = find_export_cycle(tables, table.unit_id, &mut stack) {
            let already_reported = reported
                .iter()
                .any(|existing| existing.iter().collect::<std::collections::HashSet<_>>() == cycle.iter().collect());
            if already_reported {
                continue;
            }
            diagnostics.start_group();
            for &member in &cycle {
                diagnostics.report_error(
                    None,
                    format!("module {member} participates in an export cycle"),
                );
            }
            diagnostics.end_group();
            reported.push(cycle);
        }
    }
}

fn find_export_cycle(tables: &[ModuleTable], start: UnitId, stack: &mut Vec<UnitId>) -> Option<Vec<UnitId>> {
    let table = &tables[usize::from(*stack.last().expect("non-empty stack"))];
    if !table.export_all {
        return None;
    }
    for &imported in &table.non_prefixed_imports {
        if imported == start && stack.len() > 1 {
            return Some(stack.clone());
        }
        if stack.contains(&imported) {
            continue;
        }
        stack.push(imported);
        if let Some(cycle) = find_export_cycle(tables, start, stack) {
            return Some(cycle);
        }
        stack.pop();
    }
    None
}

/// Second pass: materializes each module's `exported` map now that show
/// bindings and cross-module exports can both be followed.
pub fn resolve_exports(tables: &mut [ModuleTable]) {
    let snapshot: Vec<ModuleTable> = tables.to_vec();
    for table in tables.iter_mut() {
        let mut exported = FxHashMap::default();

        for name in &table.export_names {
            if let Some(&decl_index) = table.declared.get(name) {
                exported.insert(name.clone(), Binding::Local(decl_index));
            } else if let Some(binding) = table.shown.get(name) {
                exported.insert(name.clone(), binding.clone());
            }
        }

        if table.export_all {
            for name in table.declared.keys() {
                exported
                    .entry(name.clone())
                    .or_insert(Binding::Local(table.declared[name]));
            }
            for (name, binding) in &table.shown {
                exported.entry(name.clone()).or_insert(binding.clone());
            }
            for &imported in &table.non_prefixed_imports {
                let imported_table = &snapshot[usize::from(imported)];
                for (name, binding) in &imported_table.exported {
                    exported.entry(name.clone()).or_insert(binding.clone());
                }
            }
        }

        table.exported = exported;
    }
}
