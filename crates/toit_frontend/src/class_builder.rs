// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Class skeleton and inheritance building. Resolves `super`/`implements`,
//! detects inheritance cycles, synthesizes field stubs and default
//! constructors, and flattens the interface set.

use crate::{
    diagnostics::{DiagnosticsBus, Sink},
    module_builder::{resolve_in_module, Binding, ModuleTable},
};
use rustc_hash::FxHashMap;
use toit_ast::ast::{ClassShape as AstClassShape, Declaration, Unit, UnitId};
use toit_hir::{
    assigner::ProgramAssigner,
    hir::{Class, ClassId, ClassShape, Field, Method, MethodId, MethodKind, INTERFACE_CLASS, MONITOR_CLASS, OBJECT_CLASS},
    ty::{ResolutionShape, Type},
};

/// Maps an AST class declaration (identified by its owning unit + index) to
/// the `ClassId` the skeleton phase assigned it.
pub type ClassKey = (UnitId, usize);

pub struct ClassSkeletons {
    pub classes: FxHashMap<ClassKey, ClassId>,
    pub program_classes: Vec<Class>,
    pub program_methods: Vec<Method>,
}

/// Builds the built-in roots (`Object`, `Interface_`, `__Monitor__`) that
/// every class ultimately traces back to.
fn builtin_roots() -> Vec<Class> {
    vec![
        Class {
            id: OBJECT_CLASS,
            name: "Object".to_string(),
            span: Default::default(),
            shape: ClassShape::Class,
            is_abstract: false,
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            total_field_count: 0,
            toitdoc: None,
        },
        Class {
            id: INTERFACE_CLASS,
            name: "Interface_".to_string(),
            span: Default::default(),
            shape: ClassShape::Interface,
            is_abstract: true,
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            total_field_count: 0,
            toitdoc: None,
        },
        Class {
            id: MONITOR_CLASS,
            name: "__Monitor__".to_string(),
            span: Default::default(),
            shape: ClassShape::Monitor,
            is_abstract: false,
            super_class: Some(OBJECT_CLASS),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            total_field_count: 0,
            toitdoc: None,
        },
    ]
}

/// Builds class skeletons for every class declaration across all units,
/// then resolves super/implements, detects cycles, and flattens interfaces.
pub fn build_class_skeletons<S: Sink>(
    units: &[Unit],
    tables: &[ModuleTable],
    assigner: &mut ProgramAssigner,
    diagnostics: &mut DiagnosticsBus<S>,
) -> ClassSkeletons {
    let mut program_classes = builtin_roots();
    let mut program_methods = Vec::new();
    let mut classes = FxHashMap::default();

    // The assigner starts counting from 0; reserve the three ids already
    // taken by the built-in roots above before handing out any more.
    for _ in 0..program_classes.len() {
        assigner.next_class();
    }

    // Pass 1: allocate an id and bare skeleton for every declared class.
    for unit in units {
        for (decl_index, decl) in unit.declarations.iter().enumerate() {
            if let Declaration::Class(class_decl) = decl {
                let id = assigner.next_class();
                classes.insert((unit.id, decl_index), id);
                let shape = match class_decl.shape {
                    AstClassShape::Class => ClassShape::Class,
                    AstClassShape::Interface => ClassShape::Interface,
                    AstClassShape::Monitor => ClassShape::Monitor,
                };
                program_classes.push(Class {
                    id,
                    name: class_decl.name.name.to_string(),
                    span: class_decl.span,
                    shape,
                    is_abstract: class_decl.is_abstract || shape == ClassShape::Interface,
                    super_class: None,
                    interfaces: vec![],
                    fields: vec![],
                    methods: vec![],
                    total_field_count: 0,
                    toitdoc: class_decl.toitdoc.clone(),
                });
            }
        }
    }

    // Pass 2: resolve super/implements to the ids allocated above.
    for unit in units {
        for (decl_index, decl) in unit.declarations.iter().enumerate() {
            let Declaration::Class(class_decl) = decl else {
                continue;
            };
            let id = classes[&(unit.id, decl_index)];

            let default_super = match class_decl.shape {
                AstClassShape::Class => Some(OBJECT_CLASS),
                AstClassShape::Interface => Some(INTERFACE_CLASS),
                AstClassShape::Monitor => Some(OBJECT_CLASS),
            };

            if class_decl.shape == AstClassShape::Monitor && class_decl.super_class.is_some() {
                diagnostics.report_error(Some(class_decl.span), "monitors cannot declare an explicit super class");
            }

            let super_class = if class_decl.shape == AstClassShape::Monitor {
                default_super
            } else {
                class_decl
                    .super_class
                    .as_ref()
                    .and_then(|path| resolve_class_path(tables, unit.id, path, &classes))
                    .or(default_super)
            };

            let mut interfaces = Vec::new();
            for iface_path in &class_decl.interfaces {
                if let Some(iface_id) = resolve_class_path(tables, unit.id, iface_path, &classes) {
                    interfaces.push(iface_id);
                }
            }

            let class = find_class_mut(&mut program_classes, id);
            class.super_class = super_class;
            class.interfaces = interfaces;
        }
    }

    // Cycle detection: snap every cycle participant's super back to the
    // default and clear its interfaces.
    detect_and_break_inheritance_cycles(&mut program_classes, diagnostics);

    // Flatten interfaces: transitive closure of declared `implements` plus
    // interfaces inherited via super.
    flatten_interfaces(&mut program_classes);

    // Pass 3: synthesize members (field stubs, default constructor).
    for unit in units {
        for (decl_index, decl) in unit.declarations.iter().enumerate() {
            let Declaration::Class(class_decl) = decl else {
                continue;
            };
            let id = classes[&(unit.id, decl_index)];
            synthesize_members(class_decl, id, assigner, &mut program_classes, &mut program_methods);
        }
    }

    ClassSkeletons {
        classes,
        program_classes,
        program_methods,
    }
}

fn find_class_mut(classes: &mut [Class], id: ClassId) -> &mut Class {
    classes
        .iter_mut()
        .find(|c| c.id == id)
        .expect("class id should exist")
}

fn resolve_class_path(
    tables: &[ModuleTable],
    from_unit: UnitId,
    path: &toit_ast::ast::Path,
    classes: &FxHashMap<ClassKey, ClassId>,
) -> Option<ClassId> {
    let name = &path.last().name;
    let binding = resolve_in_module(tables, from_unit, name)?;
    let decl_index = match &binding {
        Binding::Local(index) => *index,
        Binding::Shown { source, name } => {
            let source_table = &tables[usize::from(*source)];
            *source_table.declared.get(name)?
        }
    };
    let owner_unit = match binding {
        Binding::Local(_) => from_unit,
        Binding::Shown { source, .. } => source,
    };
    classes.get(&(owner_unit, decl_index)).copied()
}

/// Detects inheritance cycles via DFS; on cycle, every participant's super
/// is reset to its class-shape default and its interfaces cleared so later
/// phases remain well-founded.
fn detect_and_break_inheritance_cycles<S: Sink>(classes: &mut [Class], diagnostics: &mut DiagnosticsBus<S>) {
    let ids: Vec<ClassId> = classes.iter().map(|c| c.id).collect();
    let mut broken = Vec::new();

    for &start in &ids {
        let mut stack = vec![start];
        let mut seen = std::collections::HashSet::new();
        seen.insert(start);
        let mut current = start;
        loop {
            let Some(super_id) = classes.iter().find(|c| c.id == current).and_then(|c| c.super_class) else {
                break;
            };
            if super_id == start {
                broken.push(stack.clone());
                break;
            }
            if !seen.insert(super_id) {
                break;
            }
            stack.push(super_id);
            current = super_id;
        }
    }

    if broken.is_empty() {
        return;
    }

    diagnostics.start_group();
    let mut already_reset = std::collections::HashSet::new();
    for cycle in &broken {
        for &id in cycle {
            if !already_reset.insert(id) {
                continue;
            }
            let class = find_class_mut(classes, id);
            diagnostics.report_error(Some(class.span), format!("class '{}' participates in an inheritance cycle", class.name));
            class.super_class = Some(match class.shape {
                ClassShape::Interface => INTERFACE_CLASS,
                _ => OBJECT_CLASS,
            });
            class.interfaces.clear();
        }
    }
    diagnostics.end_group();
}

fn flatten_interfaces(classes: &mut [Class]) {
    let snapshot: Vec<Class> = classes.to_vec();
    let find = |id: ClassId| snapshot.iter().find(|c| c.id == id);

    for class in classes.iter_mut() {
        let mut closure = Vec::new();
        let mut queue = class.interfaces.clone();
        while let Some(iface) = queue.pop() {
            if closure.contains(&iface) {
                continue;
            }
            closure.push(iface);
            if let Some(iface_class) = find(iface) {
                queue.extend(iface_class.interfaces.iter().copied());
            }
        }
        let mut super_id = class.super_class;
        while let Some(sup) = super_id {
            if let Some(sup_class) = find(sup) {
                for &iface in &sup_class.interfaces {
                    if !closure.contains(&iface) {
                        closure.push(iface);
                    }
                }
                super_id = sup_class.super_class;
            } else {
                break;
            }
        }
        class.interfaces = closure;
    }
}

fn synthesize_members(
    class_decl: &toit_ast::ast::ClassDecl,
    class_id: ClassId,
    assigner: &mut ProgramAssigner,
    classes: &mut [Class],
    methods: &mut Vec<Method>,
) {
    let mut method_ids = Vec::new();
    let mut fields = Vec::new();

    for field_decl in &class_decl.fields {
        let field_id = assigner.next_field();
        fields.push(Field {
            id: field_id,
            name: field_decl.name.name.to_string(),
            span: field_decl.span,
            ty: Type::any(),
            is_final: field_decl.is_final,
            resolved_index: None,
        });

        for is_setter in [false, true] {
            if is_setter && field_decl.is_final {
                continue;
            }
            let method_id = assigner.next_method();
            let shape = if is_setter {
                ResolutionShape {
                    min_positional: 1,
                    max_positional: 1,
                    named_params: vec![],
                    block_positions: vec![],
                    has_implicit_this: true,
                }
            } else {
                ResolutionShape {
                    min_positional: 0,
                    max_positional: 0,
                    named_params: vec![],
                    block_positions: vec![],
                    has_implicit_this: true,
                }
            };
            methods.push(Method {
                id: method_id,
                name: field_decl.name.name.to_string(),
                span: field_decl.span,
                owner: Some(class_id),
                kind: MethodKind::FieldStub {
                    field: field_id,
                    is_setter,
                },
                parameters: vec![],
                return_type: Type::any(),
                body: None,
                is_abstract: false,
                resolution_shape: shape,
                toitdoc: None,
            });
            method_ids.push(method_id);
        }
    }

    let has_constructor = class_decl
        .methods
        .iter()
        .any(|m| m.kind == toit_ast::ast::MethodKind::Constructor);

    if !has_constructor && class_decl.shape != AstClassShape::Interface {
        let method_id = assigner.next_method();
        methods.push(Method {
            id: method_id,
            name: class_decl.name.name.to_string(),
            span: class_decl.span,
            owner: Some(class_id),
            kind: MethodKind::Constructor,
            parameters: vec![],
            return_type: Type::class(class_id, false),
            body: Some(toit_hir::hir::Expression::new(
                class_decl.span,
                Type::none(),
                toit_hir::hir::ExpressionKind::Nop,
            )),
            is_abstract: false,
            resolution_shape: ResolutionShape {
                min_positional: 0,
                max_positional: 0,
                named_params: vec![],
                block_positions: vec![],
                has_implicit_this: true,
            },
            toitdoc: None,
        });
        method_ids.push(method_id);
    }

    {
        let class = find_class_mut(classes, class_id);
        class.fields = fields;
        class.methods.extend(method_ids);
    }

    let super_class_id = find_class_mut(classes, class_id).super_class;
    let super_field_count = super_class_id
        .and_then(|id| classes.iter().find(|c| c.id == id))
        .map_or(0, |c| c.total_field_count);
    let class = find_class_mut(classes, class_id);
    let mut next_index = super_field_count;
    for field in &mut class.fields {
        field.resolved_index = Some(next_index);
        next_index += 1;
    }
    class.total_field_count = next_index;
}

/// DFS of the subclass tree producing an ordering where every class appears
/// after its super. Ties among siblings break by declaration order.
#[must_use]
pub fn sort_classes(classes: &[Class]) -> Vec<ClassId> {
    let mut children: FxHashMap<Option<ClassId>, Vec<ClassId>> = FxHashMap::default();
    for class in classes {
        children.entry(class.super_class).or_default().push(class.id);
    }
    for list in children.values_mut() {
        list.sort_by_key(|id| usize::from(*id));
    }

    let mut order = Vec::new();
    let mut stack: Vec<ClassId> = children.get(&None).cloned().unwrap_or_default();
    stack.reverse();
    while let Some(id) = stack.pop() {
        order.push(id);
        if let Some(kids) = children.get(&Some(id)) {
            let mut kids = kids.clone();
            kids.reverse();
            stack.extend(kids);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{AnalysisSink, DiagnosticsBus, Policy};
    use crate::module_builder::build_module_tables;
    use toit_ast::ast::{ClassDecl, FieldDecl, Ident, NodeId};
    use toit_data_structures::span::Span;

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

    fn bus() -> DiagnosticsBus<AnalysisSink> {
        DiagnosticsBus::new(AnalysisSink::default(), Policy::default())
    }

    #[test]
    fn subclass_inherits_super_field_offset() {
        let units = vec![unit_with(vec![
            Declaration::Class(class_decl("Animal", None, &["name"])),
            Declaration::Class(class_decl("Dog", Some("Animal"), &["breed"])),
        ])];
        let mut diagnostics = bus();
        let tables = build_module_tables(&units, &mut diagnostics);
        let mut assigner = ProgramAssigner::new();

        let skeletons = build_class_skeletons(&units, &tables, &mut assigner, &mut diagnostics);
        assert!(!diagnostics.encountered_error());

        let animal_id = skeletons.classes[&(UnitId::ENTRY, 0)];
        let dog_id = skeletons.classes[&(UnitId::ENTRY, 1)];
        let animal = skeletons.program_classes.iter().find(|c| c.id == animal_id).unwrap();
        let dog = skeletons.program_classes.iter().find(|c| c.id == dog_id).unwrap();

        assert_eq!(dog.super_class, Some(animal_id));
        assert_eq!(animal.total_field_count, 1);
        assert_eq!(dog.total_field_count, 2);
        assert_eq!(dog.fields[0].resolved_index, Some(1));
        // Getter + setter per field, plus a synthesized default constructor.
        assert_eq!(dog.methods.len(), 3);
    }

    #[test]
    fn self_inheritance_cycle_resets_to_object_and_is_diagnosed() {
        let units = vec![unit_with(vec![Declaration::Class(class_decl("Loop", Some("Loop"), &[]))])];
        let mut diagnostics = bus();
        let tables = build_module_tables(&units, &mut diagnostics);
        let mut assigner = ProgramAssigner::new();

        let skeletons = build_class_skeletons(&units, &tables, &mut assigner, &mut diagnostics);
        assert!(diagnostics.encountered_error());

        let loop_id = skeletons.classes[&(UnitId::ENTRY, 0)];
        let loop_class = skeletons.program_classes.iter().find(|c| c.id == loop_id).unwrap();
        assert_eq!(loop_class.super_class, Some(OBJECT_CLASS));
        assert!(loop_class.interfaces.is_empty());
    }

    #[test]
    fn sort_classes_places_every_class_after_its_super() {
        let classes = vec![
            Class {
                id: OBJECT_CLASS,
                name: "Object".into(),
                span: Span::default(),
                shape: ClassShape::Class,
                is_abstract: false,
                super_class: None,
                interfaces: vec![],
                fields: vec![],
                methods: vec![],
                total_field_count: 0,
                toitdoc: None,
            },
            Class {
                id: ClassId::new(1),
                name: "Dog".into(),
                span: Span::default(),
                shape: ClassShape::Class,
                is_abstract: false,
                super_class: Some(OBJECT_CLASS),
                interfaces: vec![],
                fields: vec![],
                methods: vec![],
                total_field_count: 0,
                toitdoc: None,
            },
        ];
        let order = sort_classes(&classes);
        let object_pos = order.iter().position(|&id| id == OBJECT_CLASS).unwrap();
        let dog_pos = order.iter().position(|&id| id == ClassId::new(1)).unwrap();
        assert!(object_pos < dog_pos);
    }
}
