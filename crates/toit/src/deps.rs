// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Dependency-file writers: a Makefile-style `source: dep1 dep2 …` listing,
//! or the ninja `build ... : phony ...` form build systems prefer when they
//! need a rule they can `touch` without recompiling anything. Neither format
//! is a snapshot or wire concern; both are produced straight off the
//! already-loaded `Unit` graph.

use std::fmt::Write as _;
use toit_ast::ast::Unit;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepFileFormat {
    Plain,
    Ninja,
}

#[must_use]
pub fn render_dependency_file(format: DepFileFormat, units: &[Unit]) -> String {
    match format {
        DepFileFormat::Plain => render_plain(units),
        DepFileFormat::Ninja => render_ninja(units),
    }
}

fn render_plain(units: &[Unit]) -> String {
    let mut out = String::new();
    for unit in units {
        if unit.is_error_unit {
            continue;
        }
        let deps = resolved_import_paths(units, unit);
        if deps.is_empty() {
            continue;
        }
        let _ = write!(out, "{}:", unit.source_path);
        for dep in deps {
            let _ = write!(out, " {dep}");
        }
        out.push('\n');
    }
    out
}

fn render_ninja(units: &[Unit]) -> String {
    let mut out = String::new();
    for unit in units {
        if unit.is_error_unit {
            continue;
        }
        let deps = resolved_import_paths(units, unit);
        if deps.is_empty() {
            continue;
        }
        let _ = write!(out, "build {}: phony", escape_ninja(&unit.source_path));
        for dep in &deps {
            let _ = write!(out, " {}", escape_ninja(dep));
        }
        out.push('\n');
        for dep in &deps {
            let _ = writeln!(out, "build {}: phony", escape_ninja(dep));
        }
    }
    out
}

fn resolved_import_paths<'a>(units: &'a [Unit], unit: &Unit) -> Vec<&'a str> {
    unit.imports
        .iter()
        .filter_map(|import| import.resolved_unit)
        .filter_map(|target| units.get(usize::from(target)))
        .filter(|target| !target.is_error_unit)
        .map(|target| target.source_path.as_ref())
        .collect()
}

/// Ninja treats `$`, `:`, and space as special; each must be escaped with a
/// leading `$` in a path token.
fn escape_ninja(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '$' | ':' | ' ') {
            out.push('$');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use toit_ast::ast::{Import, UnitId};
    use toit_data_structures::span::Span;

    fn unit(id: u32, path: &str, imports: Vec<Import>) -> Unit {
        Unit {
            id: UnitId::new(id),
            source_path: path.into(),
            imports,
            exports: vec![],
            declarations: vec![],
            toitdoc: None,
            is_error_unit: false,
        }
    }

    fn import_to(target: UnitId) -> Import {
        Import {
            id: toit_ast::ast::NodeId::FIRST,
            span: Span::default(),
            segments: vec![],
            prefix: None,
            show_identifiers: vec![],
            show_all: false,
            dot_outs: 0,
            is_relative: false,
            resolved_unit: Some(target),
        }
    }

    #[test]
    fn plain_format_lists_one_line_per_unit_with_dependencies() {
        let units = vec![
            unit(0, "/work/main.toit", vec![import_to(UnitId::new(1))]),
            unit(1, "/sdk/core.toit", vec![]),
        ];
        let rendered = render_dependency_file(DepFileFormat::Plain, &units);
        assert_eq!(rendered, "/work/main.toit: /sdk/core.toit\n");
    }

    #[test]
    fn ninja_format_escapes_spaces_and_emits_phony_stubs() {
        let units = vec![
            unit(0, "/work/main.toit", vec![import_to(UnitId::new(1))]),
            unit(1, "/sdk/has space.toit", vec![]),
        ];
        let rendered = render_dependency_file(DepFileFormat::Ninja, &units);
        assert_eq!(rendered, "build /work/main.toit: phony /sdk/has$ space.toit\nbuild /sdk/has$ space.toit: phony\n");
    }

    #[test]
    fn a_unit_with_no_resolved_imports_produces_no_line() {
        let units = vec![unit(0, "/work/main.toit", vec![])];
        assert_eq!(render_dependency_file(DepFileFormat::Plain, &units), "");
    }
}
