// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Turns a resolver-captured `Selection` into the two shapes the
//! orchestrator's LSP modes answer with — a completion list or a
//! goto-definition location list — and derives semantic tokens directly
//! from a resolved program's entry module, which needs no selection at all
//! (the resolver aborts right after the entry module resolves in that
//! mode).

use toit_data_structures::{
    line_column::{Encoding, Range},
    span::Span,
};
use toit_frontend::{method_resolver::Selection, scope::Node};
use toit_hir::hir::{Method, ModuleId, Program};

/// What kind of symbol a completion, definition, or semantic-token entry
/// names.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    Class,
    Method,
    Field,
    Global,
    Local,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: SymbolKind,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionLocation {
    pub absolute_path: String,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DispatchResponse {
    Completions(Vec<CompletionItem>),
    Definitions(Vec<DefinitionLocation>),
}

/// Which CLI mode drove the request: the same captured selection answers
/// either, depending on which one the orchestrator is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestMode {
    Complete,
    GotoDefinition,
}

/// `locate` and `contents_for` decouple this crate from needing direct
/// access to a source manager or module table: the caller supplies a
/// node's owning path/span and a path's contents, the same closure-injected
/// style `Type::is_assignable_to` uses to stay decoupled from the class
/// graph.
pub fn dispatch(
    selection: &Selection,
    mode: RequestMode,
    program: &Program,
    locate: impl Fn(&Node) -> Option<(String, Span)>,
    contents_for: impl Fn(&str) -> Option<&str>,
) -> DispatchResponse {
    match mode {
        RequestMode::Complete => DispatchResponse::Completions(completions_for(selection, program)),
        RequestMode::GotoDefinition => DispatchResponse::Definitions(definitions_for(selection, locate, contents_for)),
    }
}

fn completions_for(selection: &Selection, program: &Program) -> Vec<CompletionItem> {
    selection
        .candidates
        .iter()
        .filter_map(|node| {
            let label = label_for(node, program)?;
            Some(CompletionItem {
                label,
                kind: symbol_kind(node),
                detail: detail_for(node, program),
            })
        })
        .collect()
}

fn definitions_for(
    selection: &Selection,
    locate: impl Fn(&Node) -> Option<(String, Span)>,
    contents_for: impl Fn(&str) -> Option<&str>,
) -> Vec<DefinitionLocation> {
    selection
        .candidates
        .iter()
        .filter_map(|node| {
            let (absolute_path, span) = locate(node)?;
            let contents = contents_for(&absolute_path)?;
            let range = Range::from_span(Encoding::Utf16, contents, &span);
            Some(DefinitionLocation { absolute_path, range })
        })
        .collect()
}

fn symbol_kind(node: &Node) -> SymbolKind {
    match node {
        Node::Class(_) => SymbolKind::Class,
        Node::Method(_) => SymbolKind::Method,
        Node::Global(_) => SymbolKind::Global,
        Node::Local(_) => SymbolKind::Local,
    }
}

/// `None` for a local: a bare `LocalId` carries no name by itself, and
/// without the owning method's parameter/body context there's nothing to
/// offer as a completion label, so local candidates are silently skipped
/// rather than labeled with a placeholder.
fn label_for(node: &Node, program: &Program) -> Option<String> {
    match node {
        Node::Class(id) => program.classes.get(*id).map(|class| class.name.clone()),
        Node::Method(id) => program.methods.get(*id).map(|method| method.name.clone()),
        Node::Global(id) => program.globals.get(*id).map(|global| global.name.clone()),
        Node::Local(_) => None,
    }
}

fn detail_for(node: &Node, program: &Program) -> String {
    match node {
        Node::Class(id) => program
            .classes
            .get(*id)
            .map_or_else(String::new, |class| format!("{} {}", class.shape, class.name)),
        Node::Method(id) => program.methods.get(*id).map_or_else(String::new, format_method_signature),
        Node::Global(id) => program
            .globals
            .get(*id)
            .map_or_else(String::new, |global| format!("{}: {}", global.name, global.ty)),
        Node::Local(_) => String::new(),
    }
}

fn format_method_signature(method: &Method) -> String {
    let params: Vec<&str> = method.parameters.iter().map(|p| p.name.as_str()).collect();
    if params.is_empty() {
        format!("{} -> {}", method.name, method.return_type)
    } else {
        format!("{} {} -> {}", method.name, params.join(" "), method.return_type)
    }
}

/// One declaration's semantic-token span and kind.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticToken {
    pub range: Range,
    pub kind: SymbolKind,
}

/// Every class/method/field/global declared directly in `entry_module`,
/// in source order. `contents` is the entry unit's source text, needed to
/// translate byte spans into the UTF-16 ranges the LSP wire format uses.
#[must_use]
pub fn semantic_tokens_for_entry_module(program: &Program, entry_module: ModuleId, contents: &str) -> Vec<SemanticToken> {
    let Some(module) = program.modules.get(entry_module) else {
        return Vec::new();
    };

    let mut tokens = Vec::new();
    let token = |span: Span, kind: SymbolKind| SemanticToken {
        range: Range::from_span(Encoding::Utf16, contents, &span),
        kind,
    };

    for &class_id in &module.classes {
        let Some(class) = program.classes.get(class_id) else { continue };
        tokens.push(token(class.span, SymbolKind::Class));
        for field in &class.fields {
            tokens.push(token(field.span, SymbolKind::Field));
        }
        for &method_id in &class.methods {
            if let Some(method) = program.methods.get(method_id) {
                tokens.push(token(method.span, SymbolKind::Method));
            }
        }
    }
    for &method_id in &module.methods {
        if let Some(method) = program.methods.get(method_id) {
            tokens.push(token(method.span, SymbolKind::Method));
        }
    }
    for &global_id in &module.globals {
        if let Some(global) = program.globals.get(global_id) {
            tokens.push(token(global.span, SymbolKind::Global));
        }
    }

    tokens.sort_by_key(|t| (t.range.start.line, t.range.start.column));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use toit_data_structures::span::Span;
    use toit_frontend::method_resolver::SelectionKind;
    use toit_hir::hir::{Class, ClassId, ClassShape, Module};
    use toit_hir::hir::{Field, FieldId, Global, GlobalId, MethodId, MethodKind};
    use toit_hir::ty::{ResolutionShape, Type};

    fn shape() -> ResolutionShape {
        ResolutionShape {
            min_positional: 0,
            max_positional: 0,
            named_params: vec![],
            block_positions: vec![],
            has_implicit_this: true,
        }
    }

    fn sample_program() -> (Program, ClassId, MethodId, GlobalId) {
        let mut program = Program::default();
        let class_id = ClassId::new(10);
        let method_id = MethodId::new(20);
        let global_id = GlobalId::new(30);

        program.classes.insert(
            class_id,
            Class {
                id: class_id,
                name: "Dog".to_string(),
                span: Span::new(0, 3),
                shape: ClassShape::Class,
                is_abstract: false,
                super_class: None,
                interfaces: vec![],
                fields: vec![Field {
                    id: FieldId::new(0),
                    name: "breed".to_string(),
                    span: Span::new(4, 9),
                    ty: Type::any(),
                    is_final: false,
                    resolved_index: Some(0),
                }],
                methods: vec![method_id],
                total_field_count: 1,
                toitdoc: None,
            },
        );
        program.methods.insert(
            method_id,
            Method {
                id: method_id,
                name: "speak".to_string(),
                span: Span::new(10, 15),
                owner: Some(class_id),
                kind: MethodKind::Instance,
                parameters: vec![],
                return_type: Type::any(),
                body: None,
                is_abstract: false,
                resolution_shape: shape(),
                toitdoc: None,
            },
        );
        program.globals.insert(
            global_id,
            Global {
                id: global_id,
                name: "counter".to_string(),
                span: Span::new(16, 23),
                ty: Type::any(),
                initializer: None,
                resolved_id: Some(0),
                is_eager: true,
                toitdoc: None,
            },
        );

        (program, class_id, method_id, global_id)
    }

    #[test]
    fn completions_label_kind_and_detail_from_program() {
        let (program, class_id, method_id, global_id) = sample_program();
        let selection = Selection {
            kind: SelectionKind::CallVirtual,
            span: Span::default(),
            candidates: vec![Node::Class(class_id), Node::Method(method_id), Node::Global(global_id)],
        };

        let response = dispatch(&selection, RequestMode::Complete, &program, |_| None, |_| None);
        let DispatchResponse::Completions(items) = response else {
            panic!("expected completions");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].label, "Dog");
        assert_eq!(items[0].kind, SymbolKind::Class);
        assert_eq!(items[0].detail, "class Dog");
        assert_eq!(items[1].label, "speak");
        assert_eq!(items[1].kind, SymbolKind::Method);
        assert_eq!(items[2].label, "counter");
        assert_eq!(items[2].kind, SymbolKind::Global);
    }

    #[test]
    fn local_candidates_are_skipped_in_completions() {
        let (program, _, _, _) = sample_program();
        let selection = Selection {
            kind: SelectionKind::ThisRef,
            span: Span::default(),
            candidates: vec![Node::Local(toit_hir::hir::LocalId::new(0))],
        };
        let response = dispatch(&selection, RequestMode::Complete, &program, |_| None, |_| None);
        let DispatchResponse::Completions(items) = response else {
            panic!("expected completions");
        };
        assert!(items.is_empty());
    }

    #[test]
    fn goto_definition_resolves_through_locate_and_contents_for() {
        let (program, class_id, _, _) = sample_program();
        let selection = Selection {
            kind: SelectionKind::Type,
            span: Span::default(),
            candidates: vec![Node::Class(class_id)],
        };
        let contents = "class Dog:\n  breed\n";
        let response = dispatch(
            &selection,
            RequestMode::GotoDefinition,
            &program,
            |node| match node {
                Node::Class(id) if *id == class_id => Some(("/work/main.toit".to_string(), Span::new(0, 3))),
                _ => None,
            },
            |path| if path == "/work/main.toit" { Some(contents) } else { None },
        );
        let DispatchResponse::Definitions(defs) = response else {
            panic!("expected definitions");
        };
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].absolute_path, "/work/main.toit");
        assert!(!defs[0].range.is_empty());
    }

    #[test]
    fn semantic_tokens_cover_class_field_method_and_global_in_source_order() {
        let (mut program, class_id, _method_id, global_id) = sample_program();
        let module_id = ModuleId::new(0);
        program.modules.insert(
            module_id,
            Module {
                id: module_id,
                classes: vec![class_id],
                methods: vec![],
                globals: vec![global_id],
                imported_modules: vec![],
                exported_identifiers: vec!["Dog".to_string(), "counter".to_string()],
                export_all: false,
            },
        );

        let contents = "class Dog breed speak counter\n";
        let tokens = semantic_tokens_for_entry_module(&program, module_id, contents);
        let kinds: Vec<SymbolKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![SymbolKind::Class, SymbolKind::Field, SymbolKind::Method, SymbolKind::Global]);
    }
}
