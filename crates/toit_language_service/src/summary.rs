// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The `Summary` LSP response: a module's exported symbols plus each
//! symbol's toitdoc first line, letting an editor render hovers and an
//! outline view without re-resolving anything.

use toit_hir::hir::{Module, Program};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SummaryKind {
    Class,
    Method,
    Global,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymbolSummary {
    pub name: String,
    pub kind: SummaryKind,
    pub toitdoc_summary: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModuleSummary {
    pub exported: Vec<SymbolSummary>,
}

/// Looks each of `module`'s `exported_identifiers` up among the classes,
/// methods, and globals it declares (export is name-based, so a name can
/// only resolve to one of the three kinds at a time in practice) and
/// collects the toitdoc summary line for each.
#[must_use]
pub fn summarize_module(program: &Program, module: &Module) -> ModuleSummary {
    let mut exported = Vec::new();

    for name in &module.exported_identifiers {
        if let Some(class) = module.classes.iter().filter_map(|&id| program.classes.get(id)).find(|class| &class.name == name) {
            exported.push(SymbolSummary {
                name: class.name.clone(),
                kind: SummaryKind::Class,
                toitdoc_summary: first_line(class.toitdoc.as_deref()),
            });
        } else if let Some(method) = module.methods.iter().filter_map(|&id| program.methods.get(id)).find(|method| &method.name == name) {
            exported.push(SymbolSummary {
                name: method.name.clone(),
                kind: SummaryKind::Method,
                toitdoc_summary: first_line(method.toitdoc.as_deref()),
            });
        } else if let Some(global) = module.globals.iter().filter_map(|&id| program.globals.get(id)).find(|global| &global.name == name) {
            exported.push(SymbolSummary {
                name: global.name.clone(),
                kind: SummaryKind::Global,
                toitdoc_summary: first_line(global.toitdoc.as_deref()),
            });
        }
    }

    exported.sort_by(|a, b| a.name.cmp(&b.name));
    ModuleSummary { exported }
}

fn first_line(toitdoc: Option<&str>) -> Option<String> {
    toitdoc
        .and_then(|text| text.lines().next())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toit_data_structures::span::Span;
    use toit_hir::hir::{Class, ClassId, ClassShape, Global, GlobalId, ModuleId};

    fn sample() -> (Program, ModuleId) {
        let mut program = Program::default();
        let class_id = ClassId::new(0);
        let global_id = GlobalId::new(0);

        program.classes.insert(
            class_id,
            Class {
                id: class_id,
                name: "Dog".to_string(),
                span: Span::default(),
                shape: ClassShape::Class,
                is_abstract: false,
                super_class: None,
                interfaces: vec![],
                fields: vec![],
                methods: vec![],
                total_field_count: 0,
                toitdoc: Some(std::rc::Rc::from("A loyal companion.\n\nMore detail below.")),
            },
        );
        program.globals.insert(
            global_id,
            Global {
                id: global_id,
                name: "counter".to_string(),
                span: Span::default(),
                ty: toit_hir::ty::Type::any(),
                initializer: None,
                resolved_id: Some(0),
                is_eager: true,
                toitdoc: None,
            },
        );

        let module_id = ModuleId::new(0);
        program.modules.insert(
            module_id,
            Module {
                id: module_id,
                classes: vec![class_id],
                methods: vec![],
                globals: vec![global_id],
                imported_modules: vec![],
                exported_identifiers: vec!["Dog".to_string(), "counter".to_string(), "not_exported_but_listed".to_string()],
                export_all: false,
            },
        );

        (program, module_id)
    }

    #[test]
    fn exported_symbols_are_summarized_with_first_toitdoc_line() {
        let (program, module_id) = sample();
        let module = program.modules.get(module_id).unwrap();
        let summary = summarize_module(&program, module);

        assert_eq!(summary.exported.len(), 2);
        let dog = summary.exported.iter().find(|s| s.name == "Dog").unwrap();
        assert_eq!(dog.kind, SummaryKind::Class);
        assert_eq!(dog.toitdoc_summary.as_deref(), Some("A loyal companion."));

        let counter = summary.exported.iter().find(|s| s.name == "counter").unwrap();
        assert_eq!(counter.kind, SummaryKind::Global);
        assert_eq!(counter.toitdoc_summary, None);
    }

    #[test]
    fn an_exported_name_with_no_matching_declaration_is_skipped() {
        let (program, module_id) = sample();
        let module = program.modules.get(module_id).unwrap();
        let summary = summarize_module(&program, module);
        assert!(!summary.exported.iter().any(|s| s.name == "not_exported_but_listed"));
    }
}
