// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Glue between the module/class skeleton-building passes and the body
//! resolver:
//! allocates `Method`/`Global` shells for every top-level function, class
//! method, and global variable, then assembles the per-module `ModuleScope`
//! and per-class `ClassScope` tables the resolver walks bodies against.

use crate::{
    class_builder::{ClassKey, ClassSkeletons},
    module_builder::{Binding, ModuleTable},
    scope::{ClassScope, ModuleScope, Node, OverloadEntry, PrefixScope, ResolutionEntry},
};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use toit_ast::ast::{self, Declaration, MethodKind as AstMethodKind, ParameterKind, Unit, UnitId};
use toit_hir::{
    assigner::ProgramAssigner,
    hir::{Class, ClassId, ClassShape, Global, GlobalId, Method, MethodId, MethodKind},
    ty::{ResolutionShape, Type},
};

pub type TopLevelMethodKey = (UnitId, usize);
pub type GlobalKey = (UnitId, usize);
pub type ClassMethodKey = (UnitId, usize, usize);

/// Everything the body resolver needs to resolve the whole program's
/// method bodies: the
/// class/method/global arenas (still bodiless) plus the lookup tables that
/// map an AST declaration to the HIR id the skeleton pass assigned it.
pub struct ProgramSkeleton {
    pub classes: Vec<Class>,
    pub methods: Vec<Method>,
    pub globals: Vec<Global>,
    pub class_keys: FxHashMap<ClassKey, ClassId>,
    pub top_level_methods: FxHashMap<TopLevelMethodKey, MethodId>,
    pub class_methods: FxHashMap<ClassMethodKey, MethodId>,
    pub globals_map: FxHashMap<GlobalKey, GlobalId>,
    pub module_scopes: Vec<ModuleScope>,
    pub class_scopes: FxHashMap<ClassId, Rc<ClassScope>>,
}

#[must_use]
pub fn resolution_shape_from_params(params: &[ast::Parameter], has_implicit_this: bool) -> ResolutionShape {
    let mut min_positional = 0;
    let mut max_positional = 0;
    let mut named_params = Vec::new();
    let mut block_positions = Vec::new();

    for (index, param) in params.iter().enumerate() {
        match param.kind {
            ParameterKind::Positional => {
                max_positional += 1;
                if !param.is_optional && param.default.is_none() {
                    min_positional += 1;
                }
            }
            ParameterKind::Named => {
                named_params.push((param.name.name.to_string(), !param.is_optional && param.default.is_none()));
            }
            ParameterKind::Block => {
                block_positions.push(index);
            }
        }
    }

    ResolutionShape {
        min_positional,
        max_positional,
        named_params,
        block_positions,
        has_implicit_this,
    }
}

fn ast_method_kind_to_hir(kind: AstMethodKind, class_shape: Option<ClassShape>) -> (MethodKind, bool) {
    match kind {
        AstMethodKind::Constructor => (MethodKind::Constructor, true),
        AstMethodKind::Factory | AstMethodKind::Static => (MethodKind::Factory, false),
        AstMethodKind::Instance => {
            if class_shape == Some(ClassShape::Monitor) {
                (MethodKind::MonitorMethod, true)
            } else {
                (MethodKind::Instance, true)
            }
        }
        AstMethodKind::Global => (MethodKind::Global, false),
    }
}

fn return_type_of(decl: &ast::MethodDecl, owner: Option<ClassId>) -> Type {
    if decl.kind == AstMethodKind::Constructor {
        owner.map_or_else(Type::any, |id| Type::class(id, false))
    } else {
        Type::any()
    }
}

/// Allocates a skeleton `Method`/`Global` for every declaration the class
/// skeleton pass didn't already synthesize (field stubs, default
/// constructors), then builds the module- and class-scope tables the body
/// resolver resolves bodies against.
pub fn build_program_skeleton(units: &[Unit], tables: &[ModuleTable], skeletons: ClassSkeletons, assigner: &mut ProgramAssigner) -> ProgramSkeleton {
    let ClassSkeletons {
        classes: class_keys,
        mut program_classes,
        mut program_methods,
    } = skeletons;

    let mut top_level_methods = FxHashMap::default();
    let mut class_methods = FxHashMap::default();
    let mut globals_map = FxHashMap::default();
    let mut globals = Vec::new();

    let class_shape_of = |id: ClassId, classes: &[Class]| classes.iter().find(|c| c.id == id).map(|c| c.shape);

    for unit in units {
        for (decl_index, decl) in unit.declarations.iter().enumerate() {
            match decl {
                Declaration::Method(method_decl) => {
                    let (kind, implicit_this) = ast_method_kind_to_hir(method_decl.kind, None);
                    let method_id = assigner.next_method();
                    program_methods.push(Method {
                        id: method_id,
                        name: method_decl.name.name.to_string(),
                        span: method_decl.span,
                        owner: None,
                        kind,
                        parameters: vec![],
                        return_type: Type::any(),
                        body: None,
                        is_abstract: method_decl.is_abstract,
                        resolution_shape: resolution_shape_from_params(&method_decl.parameters, implicit_this),
                        toitdoc: method_decl.toitdoc.clone(),
                    });
                    top_level_methods.insert((unit.id, decl_index), method_id);
                }
                Declaration::Global(global_decl) => {
                    let global_id = assigner.next_global();
                    globals.push(Global {
                        id: global_id,
                        name: global_decl.name.name.to_string(),
                        span: global_decl.span,
                        ty: Type::any(),
                        initializer: None,
                        resolved_id: None,
                        is_eager: false,
                        toitdoc: global_decl.toitdoc.clone(),
                    });
                    globals_map.insert((unit.id, decl_index), global_id);
                }
                Declaration::Class(class_decl) => {
                    let class_id = class_keys[&(unit.id, decl_index)];
                    let shape = class_shape_of(class_id, &program_classes);
                    for (method_index, method_decl) in class_decl.methods.iter().enumerate() {
                        let (kind, implicit_this) = ast_method_kind_to_hir(method_decl.kind, shape);
                        let method_id = assigner.next_method();
                        program_methods.push(Method {
                            id: method_id,
                            name: method_decl.name.name.to_string(),
                            span: method_decl.span,
                            owner: Some(class_id),
                            kind,
                            parameters: vec![],
                            return_type: return_type_of(method_decl, Some(class_id)),
                            body: None,
                            is_abstract: method_decl.is_abstract || class_decl.shape == ast::ClassShape::Interface,
                            resolution_shape: resolution_shape_from_params(&method_decl.parameters, implicit_this),
                            toitdoc: method_decl.toitdoc.clone(),
                        });
                        class_methods.insert((unit.id, decl_index, method_index), method_id);
                        if let Some(class) = program_classes.iter_mut().find(|c| c.id == class_id) {
                            class.methods.push(method_id);
                        }
                    }
                }
            }
        }
    }

    let module_scopes = build_module_scopes(units, tables, &class_keys, &top_level_methods, &globals_map);
    let class_scopes = build_class_scopes(&program_classes, &program_methods);

    ProgramSkeleton {
        classes: program_classes,
        methods: program_methods,
        globals,
        class_keys,
        top_level_methods,
        class_methods,
        globals_map,
        module_scopes,
        class_scopes,
    }
}

fn decl_to_node(
    unit_id: UnitId,
    decl_index: usize,
    units: &[Unit],
    class_keys: &FxHashMap<ClassKey, ClassId>,
    top_level_methods: &FxHashMap<TopLevelMethodKey, MethodId>,
    globals_map: &FxHashMap<GlobalKey, GlobalId>,
) -> Option<Node> {
    match &units[usize::from(unit_id)].declarations[decl_index] {
        Declaration::Class(_) => class_keys.get(&(unit_id, decl_index)).copied().map(Node::Class),
        Declaration::Method(_) => top_level_methods.get(&(unit_id, decl_index)).copied().map(Node::Method),
        Declaration::Global(_) => globals_map.get(&(unit_id, decl_index)).copied().map(Node::Global),
    }
}

/// Chases a `show`-chain down to the unit that actually declares `name`,
/// following `Binding::Shown` links with a depth guard against (already
/// separately diagnosed) cycles.
fn resolve_to_declaration(tables: &[ModuleTable], unit_id: UnitId, name: &str) -> Option<(UnitId, usize)> {
    let mut unit_id = unit_id;
    let mut name = name.to_string();
    for _ in 0..tables.len().max(1) * 2 {
        let table = &tables[usize::from(unit_id)];
        if let Some(&idx) = table.declared.get(&name) {
            return Some((unit_id, idx));
        }
        match table.shown.get(&name) {
            Some(Binding::Shown { source, name: shown_name }) => {
                unit_id = *source;
                name = shown_name.clone();
            }
            _ => return None,
        }
    }
    None
}

/// Resolves `name` as visible from `unit_id`'s top-level scope: declared,
/// `show`n, or transitively exported by a non-prefixed import.
fn resolve_visible_node(
    units: &[Unit],
    tables: &[ModuleTable],
    class_keys: &FxHashMap<ClassKey, ClassId>,
    top_level_methods: &FxHashMap<TopLevelMethodKey, MethodId>,
    globals_map: &FxHashMap<GlobalKey, GlobalId>,
    unit_id: UnitId,
    name: &str,
) -> Option<Node> {
    if let Some((decl_unit, decl_index)) = resolve_to_declaration(tables, unit_id, name) {
        return decl_to_node(decl_unit, decl_index, units, class_keys, top_level_methods, globals_map);
    }
    let table = &tables[usize::from(unit_id)];
    for &imported in &table.non_prefixed_imports {
        if let Some(binding) = tables[usize::from(imported)].exported.get(name) {
            let resolved = match binding {
                Binding::Local(idx) => Some((imported, *idx)),
                Binding::Shown { source, name } => resolve_to_declaration(tables, *source, name),
            };
            if let Some((decl_unit, decl_index)) = resolved {
                return decl_to_node(decl_unit, decl_index, units, class_keys, top_level_methods, globals_map);
            }
        }
    }
    None
}

fn build_module_scopes(
    units: &[Unit],
    tables: &[ModuleTable],
    class_keys: &FxHashMap<ClassKey, ClassId>,
    top_level_methods: &FxHashMap<TopLevelMethodKey, MethodId>,
    globals_map: &FxHashMap<GlobalKey, GlobalId>,
) -> Vec<ModuleScope> {
    let mut scopes = Vec::with_capacity(units.len());

    for unit in units {
        let mut module_scope = ModuleScope::default();
        let table = &tables[usize::from(unit.id)];

        let mut names: Vec<String> = table.declared.keys().cloned().collect();
        for name in table.shown.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        for &imported in &table.non_prefixed_imports {
            for name in tables[usize::from(imported)].exported.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        for name in names {
            if let Some(node) = resolve_visible_node(units, tables, class_keys, top_level_methods, globals_map, unit.id, &name) {
                module_scope.entries.entry(name).or_insert_with(|| ResolutionEntry::Nodes(vec![node]));
            }
        }

        for (prefix, target) in &table.prefixes {
            let mut prefix_scope = PrefixScope::default();
            for name in tables[usize::from(*target)].exported.keys() {
                if let Some(node) = resolve_visible_node(units, tables, class_keys, top_level_methods, globals_map, *target, name) {
                    prefix_scope.entries.insert(name.clone(), ResolutionEntry::Nodes(vec![node]));
                }
            }
            module_scope.entries.insert(prefix.clone(), ResolutionEntry::Prefix(Rc::new(prefix_scope)));
        }

        scopes.push(module_scope);
    }

    scopes
}

fn build_class_scopes(classes: &[Class], methods: &[Method]) -> FxHashMap<ClassId, Rc<ClassScope>> {
    let methods_by_id: FxHashMap<MethodId, &Method> = methods.iter().map(|m| (m.id, m)).collect();
    let classes_by_id: FxHashMap<ClassId, &Class> = classes.iter().map(|c| (c.id, c)).collect();
    let mut result = FxHashMap::default();

    for class in classes {
        let mut scope = ClassScope::default();
        let mut chain = Vec::new();
        let mut current = Some(class.id);
        while let Some(id) = current {
            chain.push(id);
            current = classes_by_id.get(&id).and_then(|c| c.super_class);
        }

        let mut names_seen: Vec<String> = Vec::new();
        for &class_id in &chain {
            let Some(owner) = classes_by_id.get(&class_id) else { continue };
            for &method_id in &owner.methods {
                let Some(method) = methods_by_id.get(&method_id) else { continue };
                if !names_seen.contains(&method.name) {
                    names_seen.push(method.name.clone());
                }
            }
        }

        for name in names_seen {
            let mut overloads = Vec::new();
            for (layer_index, &class_id) in chain.iter().enumerate() {
                let Some(owner) = classes_by_id.get(&class_id) else { continue };
                for &method_id in &owner.methods {
                    if methods_by_id.get(&method_id).is_some_and(|m| m.name == name) {
                        overloads.push(OverloadEntry::Method(method_id));
                    }
                }
                // A separator delimits this layer from the next even when
                // this layer declared nothing under `name`, so `own_overloads`
                // correctly reports "not declared here" rather than falling
                // through to an ancestor's overloads.
                if layer_index + 1 < chain.len() {
                    overloads.push(OverloadEntry::SuperSeparator);
                }
            }
            scope.members.insert(name, overloads);
        }

        result.insert(class.id, Rc::new(scope));
    }

    result
}
