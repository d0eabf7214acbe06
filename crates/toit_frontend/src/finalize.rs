// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The orchestrator's last front-end stage: assembles the flat skeleton
//! arenas the class-skeleton and method-resolution passes produced into a
//! single `Program`, then fixes up the two bits of global numbering that
//! can only be done once the whole class tree and global set are known:
//! field indices (must follow inheritance order, not declaration order)
//! and dense global ids.

use crate::{module_builder::ModuleTable, program_builder::ProgramSkeleton};
use std::collections::HashSet;
use toit_ast::ast::UnitId;
use toit_hir::hir::{Class, ClassId, Expression, ExpressionKind, Global, GlobalId, Method, Module, ModuleId, Program};

/// Builds the program arena from the resolved skeleton and the per-unit
/// module tables, then runs the two index-assignment passes that
/// depend on the whole program being present: field offsets in inheritance
/// order, and dense global ids with the "eager" flag.
#[must_use]
pub fn build_program(skeleton: ProgramSkeleton, tables: &[ModuleTable]) -> Program {
    let ProgramSkeleton {
        classes,
        methods,
        globals,
        class_keys,
        top_level_methods,
        globals_map,
        ..
    } = skeleton;

    let mut program = Program::default();
    for class in classes {
        program.classes.insert(class.id, class);
    }
    for method in methods {
        program.methods.insert(method.id, method);
    }
    for global in globals {
        program.globals.insert(global.id, global);
    }

    let sorted = crate::class_builder::sort_classes(&program.classes.values().cloned().collect::<Vec<_>>());
    assign_field_indexes(&mut program.classes, &sorted);
    program.sorted_classes = sorted;

    assign_global_ids(&mut program.globals);
    mark_eager_globals(&mut program.globals);

    for table in tables {
        let unit_id = table.unit_id;
        let module_id = ModuleId::new(usize::from(unit_id) as u32);

        let mut module_classes = Vec::new();
        let mut module_methods = Vec::new();
        let mut module_globals = Vec::new();

        for (&(key_unit, decl_index), &class_id) in &class_keys {
            if key_unit == unit_id {
                module_classes.push((decl_index, class_id));
            }
        }
        module_classes.sort_by_key(|&(index, _)| index);

        for (&(key_unit, decl_index), &method_id) in &top_level_methods {
            if key_unit == unit_id {
                module_methods.push((decl_index, method_id));
            }
        }
        module_methods.sort_by_key(|&(index, _)| index);

        for (&(key_unit, decl_index), &global_id) in &globals_map {
            if key_unit == unit_id {
                module_globals.push((decl_index, global_id));
            }
        }
        module_globals.sort_by_key(|&(index, _)| index);

        let mut imported_modules: Vec<ModuleId> = table
            .non_prefixed_imports
            .iter()
            .map(|&imported| ModuleId::new(usize::from(imported) as u32))
            .collect();
        imported_modules.sort_by_key(|id| usize::from(*id));
        imported_modules.dedup();

        let mut exported_identifiers: Vec<String> = table.exported.keys().cloned().collect();
        exported_identifiers.sort();

        program.modules.insert(
            module_id,
            Module {
                id: module_id,
                classes: module_classes.into_iter().map(|(_, id)| id).collect(),
                methods: module_methods.into_iter().map(|(_, id)| id).collect(),
                globals: module_globals.into_iter().map(|(_, id)| id).collect(),
                imported_modules,
                exported_identifiers,
                export_all: table.export_all,
            },
        );
    }

    program
}

/// Recomputes every field's `resolved_index` and each class's
/// `total_field_count` in `sorted` (inheritance) order, overriding the
/// provisional declaration-order numbering class-skeleton building assigned.
/// A subclass's fields
/// always land after every field its super class (at any depth) declares,
/// which the provisional numbering cannot guarantee when two sibling
/// classes are declared out of dependency order.
fn assign_field_indexes(classes: &mut toit_data_structures::index_map::IndexMap<ClassId, Class>, sorted: &[ClassId]) {
    for &class_id in sorted {
        let super_count = classes
            .get(class_id)
            .and_then(|c| c.super_class)
            .and_then(|super_id| classes.get(super_id))
            .map_or(0, |c| c.total_field_count);

        let Some(class) = classes.get_mut(class_id) else {
            continue;
        };
        let mut next_index = super_count;
        for field in &mut class.fields {
            field.resolved_index = Some(next_index);
            next_index += 1;
        }
        class.total_field_count = next_index;
    }
}

/// Assigns dense `0..#globals` ids in declaration order. `GlobalId` (the
/// arena key) is stable from allocation time; `resolved_id` is the separate,
/// compacted numbering the snapshot emitter actually writes out.
fn assign_global_ids(globals: &mut toit_data_structures::index_map::IndexMap<GlobalId, Global>) {
    let mut ids: Vec<GlobalId> = globals.iter().map(|(id, _)| id).collect();
    ids.sort_by_key(|id| usize::from(*id));
    for (index, id) in ids.into_iter().enumerate() {
        if let Some(global) = globals.get_mut(id) {
            global.resolved_id = Some(u32::try_from(index).expect("global count should fit in u32"));
        }
    }
}

/// A global is eager when its initializer can run with no risk of
/// observable side effects or dependencies on other not-yet-initialized
/// globals: no initializer at all, or a literal/null-producing expression.
/// Anything else (a call, a field load, a reference to another global) is
/// initialized lazily on first read instead.
fn mark_eager_globals(globals: &mut toit_data_structures::index_map::IndexMap<GlobalId, Global>) {
    for global in globals.values_mut() {
        global.is_eager = global.initializer.as_ref().map_or(true, is_eager_initializer);
    }
}

fn is_eager_initializer(expr: &Expression) -> bool {
    match &*expr.kind {
        ExpressionKind::IntLiteral(_)
        | ExpressionKind::FloatLiteral(_)
        | ExpressionKind::BoolLiteral(_)
        | ExpressionKind::StringLiteral(_)
        | ExpressionKind::NullLiteral
        | ExpressionKind::Nop => true,
        ExpressionKind::Not(inner) => is_eager_initializer(inner),
        _ => false,
    }
}

#[must_use]
pub fn unit_ids_to_module_ids(units: &[UnitId]) -> HashSet<ModuleId> {
    units.iter().map(|&id| ModuleId::new(usize::from(id) as u32)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        class_builder::build_class_skeletons,
        diagnostics::{AnalysisSink, DiagnosticsBus, Policy},
        module_builder::{build_module_tables, resolve_exports},
        program_builder::build_program_skeleton,
    };
    use toit_ast::ast::{ClassDecl, ClassShape as AstClassShape, Declaration, FieldDecl, Ident, NodeId, Unit};
    use toit_data_structures::span::Span;
    use toit_hir::assigner::ProgramAssigner;

    fn ident(name: &str) -> Ident {
        Ident {
            id: NodeId::FIRST,
            span: Span::default(),
            name: name.into(),
        }
    }

    fn path(name: &str) -> toit_ast::ast::Path {
        toit_ast::ast::Path {
            id: NodeId::FIRST,
            span: Span::default(),
            segments: vec![ident(name)],
        }
    }

    fn class_decl(name: &str, super_class: Option<&str>, field_names: &[&str]) -> ClassDecl {
        ClassDecl {
            id: NodeId::FIRST,
            span: Span::default(),
            name: ident(name),
            shape: AstClassShape::Class,
            is_abstract: false,
            super_class: super_class.map(path),
            interfaces: vec![],
            fields: field_names
                .iter()
                .map(|field_name| FieldDecl {
                    id: NodeId::FIRST,
                    span: Span::default(),
                    name: ident(field_name),
                    ty: None,
                    is_final: false,
                    default: None,
                })
                .collect(),
            methods: vec![],
            toitdoc: None,
        }
    }

    fn unit_with(decls: Vec<Declaration>) -> Unit {
        Unit {
            id: UnitId::ENTRY,
            source_path: "/work/main.toit".into(),
            imports: vec![],
            exports: vec![],
            declarations: decls,
            toitdoc: None,
            is_error_unit: false,
        }
    }

    #[test]
    fn field_indexes_follow_inheritance_not_declaration_order() {
        // Declared out of dependency order: the subclass appears first.
        let units = vec![unit_with(vec![
            Declaration::Class(class_decl("Dog", Some("Animal"), &["breed"])),
            Declaration::Class(class_decl("Animal", None, &["name"])),
        ])];
        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        let mut tables = build_module_tables(&units, &mut diagnostics);
        resolve_exports(&mut tables);
        let mut assigner = ProgramAssigner::new();
        let skeletons = build_class_skeletons(&units, &tables, &mut assigner, &mut diagnostics);
        let skeleton = build_program_skeleton(&units, &tables, skeletons, &mut assigner);

        let program = build_program(skeleton, &tables);
        assert!(program.is_sorted_by_inheritance());

        let dog = program.classes.values().find(|c| c.name == "Dog").unwrap();
        let animal = program.classes.values().find(|c| c.name == "Animal").unwrap();
        assert_eq!(animal.total_field_count, 1);
        assert_eq!(dog.total_field_count, 2);
        assert_eq!(animal.fields[0].resolved_index, Some(0));
        assert_eq!(dog.fields[0].resolved_index, Some(1));
    }

    #[test]
    fn globals_get_dense_ids_and_no_initializer_is_eager() {
        let units = vec![unit_with(vec![Declaration::Global(toit_ast::ast::GlobalDecl {
            id: NodeId::FIRST,
            span: Span::default(),
            name: ident("counter"),
            ty: None,
            initializer: None,
            toitdoc: None,
        })])];
        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        let mut tables = build_module_tables(&units, &mut diagnostics);
        resolve_exports(&mut tables);
        let mut assigner = ProgramAssigner::new();
        let skeletons = build_class_skeletons(&units, &tables, &mut assigner, &mut diagnostics);
        let skeleton = build_program_skeleton(&units, &tables, skeletons, &mut assigner);

        let program = build_program(skeleton, &tables);
        let global = program.globals.values().next().unwrap();
        assert_eq!(global.resolved_id, Some(0));
        assert!(global.is_eager);
    }
}
