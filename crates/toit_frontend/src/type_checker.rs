// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Type and deprecation checker. Walks every resolved method body and
//! global initializer bottom-up, propagating a nominal type per
//! sub-expression and enforcing `value_type ⊑ expected` at call-argument,
//! assignment, field-store, and return sites. Deprecation warnings piggy-back
//! on the same walk: any reference to a declaration whose toitdoc opens with
//! `Deprecated.`/`Deprecated:`, taken from outside that declaration, emits
//! one warning.

use crate::{
    diagnostics::{DiagnosticsBus, Sink},
    toitdoc::deprecation_message,
};
use rustc_hash::FxHashMap;
use toit_data_structures::span::Span;
use toit_hir::{
    hir::{CallKind, ClassId, Expression, ExpressionKind, LocalId, MethodId, MethodKind, Program},
    ty::{CallShape, ResolutionShape, TyKind, Type},
};

const ARITHMETIC_OPS: [&str; 5] = ["+", "-", "*", "/", "%"];

/// Which declaration (if any) the method body currently being walked
/// belongs to; a reference to a deprecated declaration from inside its own
/// declaration is not warned about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Enclosing {
    Method(MethodId),
    Class(ClassId),
    None,
}

pub struct TypeChecker<'a> {
    program: &'a Program,
    int_class: Option<ClassId>,
    float_class: Option<ClassId>,
}

impl<'a> TypeChecker<'a> {
    #[must_use]
    pub fn new(program: &'a Program) -> Self {
        let by_name = |name: &str| program.classes.values().find(|c| c.name == name).map(|c| c.id);
        Self {
            program,
            int_class: by_name("int"),
            float_class: by_name("float"),
        }
    }

    /// Entry point: checks every method body and global initializer in the
    /// program, reporting type mismatches and deprecation references.
    pub fn check_program<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>) {
        for (method_id, method) in self.program.methods.iter() {
            let Some(body) = &method.body else { continue };
            let mut locals = FxHashMap::default();
            for param in &method.parameters {
                locals.insert(param.id, param.ty);
            }
            let enclosing = Enclosing::Method(method_id);
            let actual = self.infer(diagnostics, body, &mut locals, enclosing);
            if !matches!(method.return_type.kind, TyKind::Any) {
                self.check_assignable(diagnostics, actual, method.return_type, body.span, "method body");
            }
        }
        for (_, global) in self.program.globals.iter() {
            let Some(initializer) = &global.initializer else { continue };
            let mut locals = FxHashMap::default();
            let actual = self.infer(diagnostics, initializer, &mut locals, Enclosing::None);
            self.check_assignable(diagnostics, actual, global.ty, initializer.span, "global initializer");
        }
    }

    fn is_subclass_or_interface(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(id) = current {
            if id == sup {
                return true;
            }
            let Some(class) = self.program.classes.get(id) else {
                break;
            };
            if class.interfaces.contains(&sup) {
                return true;
            }
            current = class.super_class;
        }
        false
    }

    fn assignable(&self, value: Type, expected: Type) -> bool {
        value.is_assignable_to(expected, |sub, sup| self.is_subclass_or_interface(sub, sup))
    }

    fn check_assignable<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, value: Type, expected: Type, span: Span, context: &str) {
        if !self.assignable(value, expected) {
            diagnostics.report_warning(Some(span), format!("type mismatch in {context}: expected {expected}, got {value}"));
        }
    }

    fn is_int(&self, ty: Type) -> bool {
        self.int_class.is_some_and(|id| matches!(ty.kind, TyKind::Class(c) if c == id))
    }

    fn is_float(&self, ty: Type) -> bool {
        self.float_class.is_some_and(|id| matches!(ty.kind, TyKind::Class(c) if c == id))
    }

    fn numeric_result(&self, lhs: Type, rhs: Type) -> Type {
        let int_ty = self.int_class.map_or_else(Type::any, |id| Type::class(id, false));
        let float_ty = self.float_class.map_or_else(Type::any, |id| Type::class(id, false));
        if self.is_int(lhs) && self.is_int(rhs) {
            int_ty
        } else if (self.is_int(lhs) && self.is_float(rhs)) || (self.is_float(lhs) && self.is_int(rhs)) || (self.is_float(lhs) && self.is_float(rhs)) {
            float_ty
        } else {
            Type::any()
        }
    }

    /// Emits one deprecation warning if `referenced` carries a `Deprecated.`
    /// message and `from` is outside its own declaration.
    fn check_deprecation<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, toitdoc: Option<&str>, from: Enclosing, self_class: Option<ClassId>, self_method: Option<MethodId>, span: Span) {
        let Some(message) = toitdoc.and_then(deprecation_message) else {
            return;
        };
        let is_self_reference = match from {
            Enclosing::Method(id) => self_method == Some(id),
            Enclosing::Class(id) => self_class == Some(id),
            Enclosing::None => false,
        };
        if !is_self_reference {
            diagnostics.report_warning(Some(span), format!("use of deprecated declaration: {message}"));
        }
    }

    fn check_method_reference<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, method_id: MethodId, enclosing: Enclosing, span: Span) {
        let Some(method) = self.program.methods.get(method_id) else {
            return;
        };
        // Constructors of a deprecated class prefer the class's message over
        // the constructor's own.
        if method.kind == MethodKind::Constructor {
            let class_toitdoc = method.owner.and_then(|id| self.program.classes.get(id)).and_then(|c| c.toitdoc.as_deref());
            if class_toitdoc.and_then(deprecation_message).is_some() {
                self.check_deprecation(diagnostics, class_toitdoc, enclosing, method.owner, None, span);
                return;
            }
        }
        self.check_deprecation(diagnostics, method.toitdoc.as_deref(), enclosing, None, Some(method_id), span);
    }

    fn check_class_reference<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, class_id: ClassId, enclosing: Enclosing, span: Span) {
        let Some(class) = self.program.classes.get(class_id) else {
            return;
        };
        self.check_deprecation(diagnostics, class.toitdoc.as_deref(), enclosing, Some(class_id), None, span);
    }

    /// Picks the constructor overload a `Call{kind: Constructor, target:
    /// ReferenceClass(id)}` site actually invokes: the one whose shape
    /// accepts the call's positional arity, same tie-break as the resolver.
    fn pick_constructor(&self, class_id: ClassId, arity: usize) -> Option<MethodId> {
        let class = self.program.classes.get(class_id)?;
        let call = CallShape {
            arity,
            named_arg_names: vec![],
            block_positions: vec![],
        };
        class
            .methods
            .iter()
            .copied()
            .find(|&id| self.program.methods.get(id).is_some_and(|m| m.kind == MethodKind::Constructor && m.resolution_shape.accepts(&call)))
    }

    fn infer<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, expr: &Expression, locals: &mut FxHashMap<LocalId, Type>, enclosing: Enclosing) -> Type {
        match expr.kind.as_ref() {
            ExpressionKind::Nop | ExpressionKind::LoopBranch { .. } => Type::none(),
            ExpressionKind::IntLiteral(_) => self.int_class.map_or_else(Type::any, |id| Type::class(id, false)),
            ExpressionKind::FloatLiteral(_) => self.float_class.map_or_else(Type::any, |id| Type::class(id, false)),
            ExpressionKind::BoolLiteral(_) | ExpressionKind::StringLiteral(_) => expr.ty,
            ExpressionKind::StringInterpolation(_, parts) => {
                for part in parts {
                    if let Some(e) = &part.expr {
                        self.infer(diagnostics, e, locals, enclosing);
                    }
                }
                expr.ty
            }
            ExpressionKind::NullLiteral => Type::any().nullable(),
            ExpressionKind::Local(id) => locals.get(id).copied().unwrap_or_else(Type::any),
            ExpressionKind::Parameter(id) => locals.get(id).copied().unwrap_or_else(Type::any),
            ExpressionKind::Block(stmts) | ExpressionKind::Sequence(stmts) => {
                let mut last = Type::none();
                for stmt in stmts {
                    last = self.infer(diagnostics, stmt, locals, enclosing);
                }
                last
            }
            ExpressionKind::If { condition, then_branch, else_branch } => {
                self.infer(diagnostics, condition, locals, enclosing);
                let then_ty = self.infer(diagnostics, then_branch, locals, enclosing);
                let else_ty = else_branch.as_ref().map_or_else(|| Type::any().nullable(), |e| self.infer(diagnostics, e, locals, enclosing));
                if matches!(then_ty.kind, TyKind::None) {
                    else_ty
                } else if matches!(else_ty.kind, TyKind::None) {
                    then_ty
                } else {
                    Type::any()
                }
            }
            ExpressionKind::While { condition, body } => {
                self.infer(diagnostics, condition, locals, enclosing);
                self.infer(diagnostics, body, locals, enclosing);
                Type::none()
            }
            ExpressionKind::TryFinally { body, finally } => {
                let result = self.infer(diagnostics, body, locals, enclosing);
                self.infer(diagnostics, finally, locals, enclosing);
                result
            }
            ExpressionKind::LogicalBinary { lhs, rhs, .. } => {
                self.infer(diagnostics, lhs, locals, enclosing);
                self.infer(diagnostics, rhs, locals, enclosing);
                expr.ty
            }
            ExpressionKind::Not(inner) => {
                self.infer(diagnostics, inner, locals, enclosing);
                expr.ty
            }
            ExpressionKind::Return(value) => {
                if let Some(value) = value {
                    self.infer(diagnostics, value, locals, enclosing);
                }
                Type::none()
            }
            ExpressionKind::Code(inner) => self.infer(diagnostics, inner, locals, enclosing),
            ExpressionKind::Lambda { parameters, body, .. } => {
                let mut inner_locals = locals.clone();
                for param in parameters {
                    inner_locals.insert(param.id, param.ty);
                }
                self.infer(diagnostics, body, &mut inner_locals, enclosing);
                Type::any()
            }
            ExpressionKind::FieldLoad { receiver, field } => {
                let receiver_ty = self.infer(diagnostics, receiver, locals, enclosing);
                self.field_type(receiver_ty, *field).unwrap_or_else(Type::any)
            }
            ExpressionKind::FieldStore { receiver, field, value } => {
                let receiver_ty = self.infer(diagnostics, receiver, locals, enclosing);
                let value_ty = self.infer(diagnostics, value, locals, enclosing);
                if let Some(expected) = self.field_type(receiver_ty, *field) {
                    self.check_assignable(diagnostics, value_ty, expected, expr.span, "field store");
                }
                value_ty
            }
            ExpressionKind::Dot { receiver, method } | ExpressionKind::LspSelectionDot { receiver, method } => {
                self.infer(diagnostics, receiver, locals, enclosing);
                self.check_method_reference(diagnostics, *method, enclosing, expr.span);
                self.program.methods.get(*method).map_or_else(Type::any, |m| m.return_type)
            }
            ExpressionKind::Super(inner) => self.infer(diagnostics, inner, locals, enclosing),
            ExpressionKind::ReferenceLocal(id) | ExpressionKind::ReferenceBlock(id) => locals.get(id).copied().unwrap_or_else(Type::any),
            ExpressionKind::ReferenceMethod(id) => {
                self.check_method_reference(diagnostics, *id, enclosing, expr.span);
                Type::any()
            }
            ExpressionKind::ReferenceGlobal(id) => self.program.globals.get(*id).map_or_else(Type::any, |g| g.ty),
            ExpressionKind::ReferenceClass(id) => {
                self.check_class_reference(diagnostics, *id, enclosing, expr.span);
                Type::class(*id, false)
            }
            ExpressionKind::Call { kind, target, args } => self.infer_call(diagnostics, *kind, target, args, expr.span, locals, enclosing),
            ExpressionKind::Assignment { kind, target, value } => self.infer_assignment(diagnostics, *kind, target, value, locals, enclosing),
            ExpressionKind::Typecheck { expr: inner, ty, is_as } => {
                let inner_ty = self.infer(diagnostics, inner, locals, enclosing);
                if *is_as {
                    *ty
                } else {
                    inner_ty
                }
            }
            ExpressionKind::PrimitiveInvocation { name, args, .. } => {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.infer(diagnostics, &arg.value, locals, enclosing));
                }
                if ARITHMETIC_OPS.contains(&name.as_str()) && arg_types.len() == 2 {
                    self.numeric_result(arg_types[0], arg_types[1])
                } else {
                    Type::any()
                }
            }
            ExpressionKind::Error(nested) => {
                for e in nested {
                    self.infer(diagnostics, e, locals, enclosing);
                }
                Type::any()
            }
        }
    }

    fn field_type(&self, receiver_ty: Type, field: toit_hir::hir::FieldId) -> Option<Type> {
        let TyKind::Class(class_id) = receiver_ty.kind else {
            return None;
        };
        let mut current = Some(class_id);
        while let Some(id) = current {
            let class = self.program.classes.get(id)?;
            if let Some(f) = class.fields.iter().find(|f| f.id == field) {
                return Some(f.ty);
            }
            current = class.super_class;
        }
        None
    }

    fn infer_call<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, kind: CallKind, target: &Expression, args: &[toit_hir::hir::Argument], span: Span, locals: &mut FxHashMap<LocalId, Type>, enclosing: Enclosing) -> Type {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.infer(diagnostics, &arg.value, locals, enclosing));
        }

        let method_id = match (kind, target.kind.as_ref()) {
            (_, ExpressionKind::ReferenceMethod(id)) => {
                self.check_method_reference(diagnostics, *id, enclosing, target.span);
                Some(*id)
            }
            (CallKind::Constructor, ExpressionKind::ReferenceClass(class_id)) => {
                self.check_class_reference(diagnostics, *class_id, enclosing, target.span);
                self.pick_constructor(*class_id, arg_types.len())
            }
            _ => {
                self.infer(diagnostics, target, locals, enclosing);
                None
            }
        };

        let Some(method) = method_id.and_then(|id| self.program.methods.get(id)) else {
            return Type::any();
        };
        for (param, &arg_ty) in method.parameters.iter().zip(arg_types.iter()) {
            self.check_assignable(diagnostics, arg_ty, param.ty, span, "call argument");
        }
        if matches!(method.return_type.kind, TyKind::None) {
            // The target never returns: nothing downstream can observe a
            // value here, so the call's own type degenerates to bottom.
            Type::none()
        } else {
            method.return_type
        }
    }

    fn infer_assignment<S: Sink>(&self, diagnostics: &mut DiagnosticsBus<S>, kind: toit_hir::hir::AssignmentKind, target: &Expression, value: &Expression, locals: &mut FxHashMap<LocalId, Type>, enclosing: Enclosing) -> Type {
        let value_ty = self.infer(diagnostics, value, locals, enclosing);
        match (kind, target.kind.as_ref()) {
            (toit_hir::hir::AssignmentKind::Define, ExpressionKind::Local(id)) => {
                locals.insert(*id, value_ty);
            }
            (toit_hir::hir::AssignmentKind::Local, ExpressionKind::Local(id)) => {
                if let Some(&declared) = locals.get(id) {
                    self.check_assignable(diagnostics, value_ty, declared, target.span, "assignment");
                } else {
                    locals.insert(*id, value_ty);
                }
            }
            (toit_hir::hir::AssignmentKind::Global, ExpressionKind::ReferenceGlobal(id)) => {
                if let Some(global) = self.program.globals.get(*id) {
                    self.check_assignable(diagnostics, value_ty, global.ty, target.span, "assignment");
                }
            }
            _ => {
                self.infer(diagnostics, target, locals, enclosing);
            }
        }
        value_ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{AnalysisSink, DiagnosticsBus, Policy};
    use std::rc::Rc;
    use toit_data_structures::span::Span;
    use toit_hir::hir::{Class, ClassShape, Field, FieldId, LocalId, Method, MethodKind as HirMethodKind, Parameter};

    fn bus() -> DiagnosticsBus<AnalysisSink> {
        DiagnosticsBus::new(AnalysisSink::default(), Policy::default())
    }

    fn plain_class(id: ClassId, name: &str) -> Class {
        Class {
            id,
            name: name.to_string(),
            span: Span::default(),
            shape: ClassShape::Class,
            is_abstract: false,
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            total_field_count: 0,
            toitdoc: None,
        }
    }

    fn this_parameter(id: LocalId, owner: ClassId) -> Parameter {
        Parameter {
            id,
            name: "this".to_string(),
            span: Span::default(),
            ty: Type::class(owner, false),
            is_block: false,
            is_optional: false,
            default: None,
        }
    }

    #[test]
    fn field_store_type_mismatch_is_warned() {
        let mut program = Program::default();
        let int_id = ClassId::new(0);
        program.classes.insert(int_id, plain_class(int_id, "int"));

        let owner_id = ClassId::new(1);
        let field_id = FieldId::new(0);
        program.classes.insert(
            owner_id,
            Class {
                id: owner_id,
                name: "Box".to_string(),
                span: Span::default(),
                shape: ClassShape::Class,
                is_abstract: false,
                super_class: None,
                interfaces: vec![],
                fields: vec![Field {
                    id: field_id,
                    name: "count".to_string(),
                    span: Span::default(),
                    ty: Type::class(int_id, false),
                    is_final: false,
                    resolved_index: Some(0),
                }],
                methods: vec![],
                total_field_count: 1,
                toitdoc: None,
            },
        );

        let this_local = LocalId::new(0);
        let receiver = Expression::new(Span::default(), Type::class(owner_id, false), ExpressionKind::Local(this_local));
        let value = Expression::new(Span::default(), Type::any().nullable(), ExpressionKind::NullLiteral);
        let body = Expression::new(
            Span::default(),
            Type::none(),
            ExpressionKind::FieldStore {
                receiver: Box::new(receiver),
                field: field_id,
                value: Box::new(value),
            },
        );

        let method_id = MethodId::new(0);
        program.methods.insert(
            method_id,
            Method {
                id: method_id,
                name: "set".to_string(),
                span: Span::default(),
                owner: Some(owner_id),
                kind: HirMethodKind::Instance,
                parameters: vec![this_parameter(this_local, owner_id)],
                return_type: Type::any(),
                body: Some(body),
                is_abstract: false,
                resolution_shape: ResolutionShape::default(),
                toitdoc: None,
            },
        );

        let checker = TypeChecker::new(&program);
        let mut diagnostics = bus();
        checker.check_program(&mut diagnostics);
        assert!(diagnostics.encountered_warning());
    }

    #[test]
    fn deprecated_class_reference_outside_declaration_warns() {
        let mut program = Program::default();
        let deprecated_id = ClassId::new(0);
        program.classes.insert(
            deprecated_id,
            Class {
                toitdoc: Some(Rc::from("Deprecated. Use NewThing instead.")),
                ..plain_class(deprecated_id, "OldThing")
            },
        );

        let body = Expression::new(Span::default(), Type::class(deprecated_id, false), ExpressionKind::ReferenceClass(deprecated_id));
        let method_id = MethodId::new(0);
        program.methods.insert(
            method_id,
            Method {
                id: method_id,
                name: "use_it".to_string(),
                span: Span::default(),
                owner: None,
                kind: HirMethodKind::Global,
                parameters: vec![],
                return_type: Type::any(),
                body: Some(body),
                is_abstract: false,
                resolution_shape: ResolutionShape::default(),
                toitdoc: None,
            },
        );

        let checker = TypeChecker::new(&program);
        let mut diagnostics = bus();
        checker.check_program(&mut diagnostics);
        assert!(diagnostics.encountered_warning());
    }
}
