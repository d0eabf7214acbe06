// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Definite assignment and return-path analysis. Forward, flow-sensitive
//! walks over a method body's `IR`, tracking which locals are not yet
//! guaranteed initialized and whether control is guaranteed to have
//! returned by a given point.

use rustc_hash::FxHashSet;
use toit_frontend::diagnostics::{DiagnosticsBus, Sink};
use toit_hir::hir::{
    AssignmentKind, ClassShape, Expression, ExpressionKind, FieldId, LocalId, MethodKind, Program,
};

/// A local not yet reachable as definite is `Undefined` if no path reaching
/// this point assigns it, or `PartiallyDefined` if some but not all paths
/// do. Both block a read; the distinction is only for wording.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Status {
    Undefined,
    PartiallyDefined,
}

#[derive(Clone, Debug, Default)]
struct FlowState {
    /// Locals absent from this map are definitely assigned.
    pending: rustc_hash::FxHashMap<LocalId, Status>,
    /// Whether control reaching this point has already returned (or
    /// entered a non-terminating `while true` with no `break`), making
    /// everything after it unreachable.
    terminated: bool,
}

impl FlowState {
    /// Joins two branches' states: a local definitely assigned on both
    /// (absent from both maps) stays definitely assigned; one pending on
    /// only one side, or `Undefined` on one and `PartiallyDefined` on the
    /// other, becomes `PartiallyDefined`; `Undefined` on both stays
    /// `Undefined`. Control has terminated after the join only if it
    /// terminated on both branches.
    fn merge(a: &FlowState, b: &FlowState) -> FlowState {
        let mut keys: FxHashSet<LocalId> = FxHashSet::default();
        keys.extend(a.pending.keys().copied());
        keys.extend(b.pending.keys().copied());

        let mut pending = rustc_hash::FxHashMap::default();
        for local in keys {
            let status = match (a.pending.get(&local), b.pending.get(&local)) {
                (Some(Status::Undefined), Some(Status::Undefined)) => Status::Undefined,
                _ => Status::PartiallyDefined,
            };
            pending.insert(local, status);
        }
        FlowState {
            pending,
            terminated: a.terminated && b.terminated,
        }
    }
}

/// Every local a `:=` declares somewhere directly in `expr`, not descending
/// into nested `Lambda` bodies (those get their own independent flow scope
/// and their own pre-scan when the walk reaches them). A declared local
/// starts life `Undefined`; it never re-enters this set once its `Define`
/// has actually been seen, so a given `LocalId` is collected exactly once.
fn collect_declared(expr: &Expression, declared: &mut FxHashSet<LocalId>) {
    if let ExpressionKind::Assignment {
        kind: AssignmentKind::Define,
        target,
        value,
    } = &*expr.kind
    {
        if let ExpressionKind::Local(local) = &*target.kind {
            declared.insert(*local);
        }
        collect_declared(value, declared);
        return;
    }

    match &*expr.kind {
        ExpressionKind::StringInterpolation(_, parts) => {
            for part in parts {
                if let Some(sub) = &part.expr {
                    collect_declared(sub, declared);
                }
            }
        }
        ExpressionKind::Block(items) | ExpressionKind::Sequence(items) | ExpressionKind::Error(items) => {
            for item in items {
                collect_declared(item, declared);
            }
        }
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_declared(condition, declared);
            collect_declared(then_branch, declared);
            if let Some(else_branch) = else_branch {
                collect_declared(else_branch, declared);
            }
        }
        ExpressionKind::While { condition, body } => {
            collect_declared(condition, declared);
            collect_declared(body, declared);
        }
        ExpressionKind::TryFinally { body, finally } => {
            collect_declared(body, declared);
            collect_declared(finally, declared);
        }
        ExpressionKind::LogicalBinary { lhs, rhs, .. } => {
            collect_declared(lhs, declared);
            collect_declared(rhs, declared);
        }
        ExpressionKind::Not(inner) | ExpressionKind::Code(inner) | ExpressionKind::Super(inner) => {
            collect_declared(inner, declared);
        }
        ExpressionKind::Return(Some(value)) => collect_declared(value, declared),
        ExpressionKind::FieldLoad { receiver, .. } | ExpressionKind::Dot { receiver, .. } | ExpressionKind::LspSelectionDot { receiver, .. } => {
            collect_declared(receiver, declared);
        }
        ExpressionKind::FieldStore { receiver, value, .. } => {
            collect_declared(receiver, declared);
            collect_declared(value, declared);
        }
        ExpressionKind::Call { target, args, .. } => {
            collect_declared(target, declared);
            for arg in args {
                collect_declared(&arg.value, declared);
            }
        }
        ExpressionKind::PrimitiveInvocation { args, .. } => {
            for arg in args {
                collect_declared(&arg.value, declared);
            }
        }
        ExpressionKind::Assignment { target, value, .. } => {
            collect_declared(target, declared);
            collect_declared(value, declared);
        }
        ExpressionKind::Typecheck { expr: inner, .. } => collect_declared(inner, declared),
        _ => {}
    }
}

/// Builds the starting flow state for a method (or lambda) body: every
/// local it declares anywhere starts `Undefined`.
fn initial_state_for(body: &Expression) -> FlowState {
    let mut declared = FxHashSet::default();
    collect_declared(body, &mut declared);
    FlowState {
        pending: declared.into_iter().map(|local| (local, Status::Undefined)).collect(),
        terminated: false,
    }
}

struct Analyzer<'a, S: Sink> {
    diagnostics: &'a mut DiagnosticsBus<S>,
    saw_explicit_return: bool,
}

impl<'a, S: Sink> Analyzer<'a, S> {
    /// Visits `expr`, updating `state` in place. `loop_unwind_depth` counts
    /// how many enclosing loops have been entered since the nearest one,
    /// used to recognize a `break` targeting the current loop from a
    /// `LoopBranch` whose `depth` is relative to its own nesting point.
    fn visit(&mut self, expr: &Expression, state: &mut FlowState) {
        match &*expr.kind {
            ExpressionKind::Nop
            | ExpressionKind::IntLiteral(_)
            | ExpressionKind::FloatLiteral(_)
            | ExpressionKind::BoolLiteral(_)
            | ExpressionKind::StringLiteral(_)
            | ExpressionKind::NullLiteral
            | ExpressionKind::ReferenceMethod(_)
            | ExpressionKind::ReferenceGlobal(_)
            | ExpressionKind::ReferenceClass(_)
            | ExpressionKind::Parameter(_) => {}

            ExpressionKind::Local(local) | ExpressionKind::ReferenceLocal(local) | ExpressionKind::ReferenceBlock(local) => {
                if let Some(status) = state.pending.get(local) {
                    let message = match status {
                        Status::Undefined => "local must be initialized before use",
                        Status::PartiallyDefined => "local is not initialized on every path reaching this use",
                    };
                    self.diagnostics.report_error(Some(expr.span), message);
                }
            }

            ExpressionKind::StringInterpolation(_, parts) => {
                for part in parts {
                    if let Some(sub) = &part.expr {
                        self.visit(sub, state);
                    }
                }
            }

            ExpressionKind::Block(items) | ExpressionKind::Sequence(items) => {
                for item in items {
                    self.visit(item, state);
                }
            }

            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit(condition, state);
                let mut then_state = state.clone();
                self.visit(then_branch, &mut then_state);
                let mut else_state = state.clone();
                if let Some(else_branch) = else_branch {
                    self.visit(else_branch, &mut else_state);
                }
                *state = FlowState::merge(&then_state, &else_state);
            }

            ExpressionKind::While { condition, body } => {
                self.visit(condition, state);
                let mut body_state = state.clone();
                self.visit(body, &mut body_state);
                let merged = FlowState::merge(state, &body_state);
                let always_runs_forever = is_literal_true(condition) && !contains_break(body, 0);
                *state = if always_runs_forever {
                    FlowState {
                        pending: merged.pending,
                        terminated: true,
                    }
                } else {
                    merged
                };
            }

            ExpressionKind::TryFinally { body, finally } => {
                self.visit(body, state);
                self.visit(finally, state);
            }

            ExpressionKind::LogicalBinary { lhs, rhs, .. } => {
                self.visit(lhs, state);
                self.visit(rhs, state);
            }

            ExpressionKind::Not(inner) | ExpressionKind::Code(inner) | ExpressionKind::Super(inner) => {
                self.visit(inner, state);
            }

            ExpressionKind::Return(value) => {
                self.saw_explicit_return = true;
                if let Some(value) = value {
                    self.visit(value, state);
                }
                state.terminated = true;
            }

            ExpressionKind::LoopBranch { .. } => {
                state.terminated = true;
            }

            ExpressionKind::Lambda { body, .. } => {
                // A lambda's body is its own flow scope (it may run zero or
                // many times, possibly after the enclosing method already
                // returned), so it's checked independently and never
                // contributes definite-assignment facts back to the
                // enclosing state.
                let mut lambda_state = initial_state_for(body);
                self.visit(body, &mut lambda_state);
            }

            ExpressionKind::FieldLoad { receiver, .. } => {
                self.visit(receiver, state);
            }
            ExpressionKind::FieldStore { receiver, value, .. } => {
                self.visit(value, state);
                self.visit(receiver, state);
            }
            ExpressionKind::Dot { receiver, .. } | ExpressionKind::LspSelectionDot { receiver, .. } => {
                self.visit(receiver, state);
            }

            ExpressionKind::Call { target, args, .. } => {
                self.visit(target, state);
                for arg in args {
                    self.visit(&arg.value, state);
                }
            }

            ExpressionKind::Assignment { kind, target, value } => {
                self.visit(value, state);
                match kind {
                    AssignmentKind::Define | AssignmentKind::Local => {
                        if let ExpressionKind::Local(local) = &*target.kind {
                            state.pending.remove(local);
                            return;
                        }
                        self.visit(target, state);
                    }
                    AssignmentKind::Global => {
                        self.visit(target, state);
                    }
                }
            }

            ExpressionKind::Typecheck { expr: inner, .. } => {
                self.visit(inner, state);
            }

            ExpressionKind::PrimitiveInvocation { args, .. } => {
                for arg in args {
                    self.visit(&arg.value, state);
                }
            }

            ExpressionKind::Error(children) => {
                for child in children {
                    self.visit(child, state);
                }
            }
        }
    }
}

fn is_literal_true(expr: &Expression) -> bool {
    matches!(&*expr.kind, ExpressionKind::BoolLiteral(true))
}

/// Does `expr` contain a `break` that targets the loop it's nested directly
/// in? `depth_offset` is how many loop levels have been entered since the
/// loop being asked about; a nested loop shifts the target depth for any
/// `LoopBranch` found inside it by one.
fn contains_break(expr: &Expression, depth_offset: u32) -> bool {
    match &*expr.kind {
        ExpressionKind::LoopBranch { is_break, depth } => *is_break && *depth == depth_offset,
        ExpressionKind::While { condition, body } => {
            contains_break(condition, depth_offset) || contains_break(body, depth_offset + 1)
        }
        ExpressionKind::Lambda { .. } => false,
        ExpressionKind::Block(items) | ExpressionKind::Sequence(items) | ExpressionKind::Error(items) => {
            items.iter().any(|item| contains_break(item, depth_offset))
        }
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            contains_break(condition, depth_offset)
                || contains_break(then_branch, depth_offset)
                || else_branch.as_ref().is_some_and(|e| contains_break(e, depth_offset))
        }
        ExpressionKind::TryFinally { body, finally } => {
            contains_break(body, depth_offset) || contains_break(finally, depth_offset)
        }
        ExpressionKind::LogicalBinary { lhs, rhs, .. } => contains_break(lhs, depth_offset) || contains_break(rhs, depth_offset),
        ExpressionKind::Not(inner) | ExpressionKind::Code(inner) | ExpressionKind::Super(inner) => contains_break(inner, depth_offset),
        ExpressionKind::Call { target, args, .. } => {
            contains_break(target, depth_offset) || args.iter().any(|a| contains_break(&a.value, depth_offset))
        }
        ExpressionKind::Assignment { target, value, .. } => contains_break(target, depth_offset) || contains_break(value, depth_offset),
        ExpressionKind::FieldStore { receiver, value, .. } => contains_break(receiver, depth_offset) || contains_break(value, depth_offset),
        ExpressionKind::FieldLoad { receiver, .. }
        | ExpressionKind::Dot { receiver, .. }
        | ExpressionKind::LspSelectionDot { receiver, .. } => contains_break(receiver, depth_offset),
        ExpressionKind::Typecheck { expr, .. } => contains_break(expr, depth_offset),
        _ => false,
    }
}

/// Runs the local-variable definite-assignment walk and the return-path
/// check over every method body in `program`.
pub fn check_definite_assignment<S: Sink>(program: &Program, diagnostics: &mut DiagnosticsBus<S>) {
    for method in program.methods.values() {
        let Some(body) = &method.body else {
            continue;
        };
        if matches!(
            method.kind,
            MethodKind::FieldStub { .. } | MethodKind::AdapterStub | MethodKind::IsInterfaceStub
        ) {
            continue;
        }

        let mut analyzer = Analyzer {
            diagnostics,
            saw_explicit_return: false,
        };
        let mut state = initial_state_for(body);
        analyzer.visit(body, &mut state);

        // A method that uses an explicit `return` anywhere is expected to
        // return consistently on every path; one that only ever falls
        // through to its trailing expression value has nothing to check
        // here (the type checker covers the produced value's type).
        if analyzer.saw_explicit_return && !state.terminated {
            diagnostics.report_error(
                Some(method.span),
                format!("method '{}' does not return on every path after an explicit return elsewhere in its body", method.name),
            );
        }
    }
}

/// Scans `expr` sequentially for field stores on `this` and the (optional)
/// explicit `super(...)` call, returning the fields definitely stored
/// before that point and whether the scan actually reached an explicit
/// super call. A conditional only contributes a field to the "definite"
/// set when both branches store it before either reaches super; an
/// `If`/`TryFinally` is considered to reach super only when every branch
/// does.
fn scan_before_super(expr: &Expression, assigned: &mut FxHashSet<FieldId>) -> bool {
    match &*expr.kind {
        ExpressionKind::Super(_) => true,

        ExpressionKind::Block(items) | ExpressionKind::Sequence(items) => {
            for item in items {
                if scan_before_super(item, assigned) {
                    return true;
                }
            }
            false
        }

        ExpressionKind::FieldStore { receiver, field, value } => {
            scan_before_super(value, assigned);
            if is_this_receiver(receiver) {
                assigned.insert(*field);
            }
            false
        }

        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            scan_before_super(condition, assigned);
            let mut then_assigned = assigned.clone();
            let then_reached = scan_before_super(then_branch, &mut then_assigned);
            let mut else_assigned = assigned.clone();
            let else_reached = match else_branch {
                Some(else_branch) => scan_before_super(else_branch, &mut else_assigned),
                None => false,
            };
            *assigned = then_assigned.intersection(&else_assigned).copied().collect();
            then_reached && else_reached
        }

        ExpressionKind::TryFinally { body, finally } => {
            let body_reached = scan_before_super(body, assigned);
            let finally_reached = scan_before_super(finally, assigned);
            body_reached || finally_reached
        }

        _ => false,
    }
}

fn is_this_receiver(expr: &Expression) -> bool {
    matches!(&*expr.kind, ExpressionKind::Local(local) if *local == LocalId::new(0))
}

/// The constructor-specific rule: every non-nullable class-typed field
/// declared directly on a class must have a definite initializer by the
/// point its constructor calls `super` (or, if it never calls `super`
/// explicitly, by the end of the body — the implicit zero-argument super
/// call happens wherever the synthesized one would land, which for a body
/// with no explicit call is effectively nowhere a field store could miss).
pub fn check_constructor_field_initialization<S: Sink>(program: &Program, diagnostics: &mut DiagnosticsBus<S>) {
    for method in program.methods.values() {
        if !matches!(method.kind, MethodKind::Constructor) {
            continue;
        }
        let Some(body) = &method.body else {
            continue;
        };
        let Some(owner) = method.owner else {
            continue;
        };
        let Some(class) = program.classes.get(owner) else {
            continue;
        };
        if matches!(class.shape, ClassShape::Interface) {
            continue;
        }

        let required: Vec<&toit_hir::hir::Field> = class
            .fields
            .iter()
            .filter(|field| !field.ty.nullable && matches!(field.ty.kind, toit_hir::ty::TyKind::Class(_)))
            .collect();
        if required.is_empty() {
            continue;
        }

        let mut assigned = FxHashSet::default();
        scan_before_super(body, &mut assigned);

        for field in required {
            if !assigned.contains(&field.id) {
                diagnostics.report_error(
                    Some(method.span),
                    format!(
                        "constructor for '{}' does not initialize field '{}' before the (implicit or explicit) call to super",
                        class.name, field.name
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toit_data_structures::span::Span;
    use toit_frontend::diagnostics::{AnalysisSink, Policy};
    use toit_hir::hir::{Expression, Method, MethodId};
    use toit_hir::ty::Type;

    fn method_with_body(body: Expression) -> Method {
        Method {
            id: MethodId::new(0),
            name: "m".to_string(),
            span: Span::default(),
            owner: None,
            kind: MethodKind::Instance,
            parameters: vec![],
            return_type: Type::any(),
            body: Some(body),
            is_abstract: false,
            resolution_shape: Default::default(),
            toitdoc: None,
        }
    }

    fn local_read(id: u32) -> Expression {
        Expression::new(Span::default(), Type::any(), ExpressionKind::Local(LocalId::new(id)))
    }

    fn define(id: u32, value: Expression) -> Expression {
        Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::Assignment {
                kind: AssignmentKind::Define,
                target: Box::new(local_read(id)),
                value: Box::new(value),
            },
        )
    }

    fn int_literal(value: i64) -> Expression {
        Expression::new(Span::default(), Type::any(), ExpressionKind::IntLiteral(value))
    }

    #[test]
    fn read_after_only_one_branch_defines_is_an_error() {
        // if cond: x := 1
        // return x
        let body = Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::Sequence(vec![
                Expression::new(
                    Span::default(),
                    Type::any(),
                    ExpressionKind::If {
                        condition: Box::new(Expression::new(Span::default(), Type::any(), ExpressionKind::BoolLiteral(true))),
                        then_branch: Box::new(define(0, int_literal(1))),
                        else_branch: None,
                    },
                ),
                Expression::new(
                    Span::default(),
                    Type::any(),
                    ExpressionKind::Return(Some(Box::new(local_read(0)))),
                ),
            ]),
        );
        let mut program = Program::default();
        let method = method_with_body(body);
        program.methods.insert(method.id, method);

        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        check_definite_assignment(&program, &mut diagnostics);
        assert!(diagnostics.encountered_error());
    }

    #[test]
    fn definition_on_every_path_before_use_is_fine() {
        // x := 1
        // return x
        let body = Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::Sequence(vec![define(0, int_literal(1)), Expression::new(Span::default(), Type::any(), ExpressionKind::Return(Some(Box::new(local_read(0)))))]),
        );
        let mut program = Program::default();
        let method = method_with_body(body);
        program.methods.insert(method.id, method);

        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        check_definite_assignment(&program, &mut diagnostics);
        assert!(!diagnostics.encountered_error());
    }

    #[test]
    fn early_return_in_one_branch_with_no_fallthrough_return_is_reported() {
        // if cond: return 1
        // (falls through with no return)
        let body = Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::If {
                condition: Box::new(Expression::new(Span::default(), Type::any(), ExpressionKind::BoolLiteral(true))),
                then_branch: Box::new(Expression::new(
                    Span::default(),
                    Type::any(),
                    ExpressionKind::Return(Some(Box::new(int_literal(1)))),
                )),
                else_branch: None,
            },
        );
        let mut program = Program::default();
        let method = method_with_body(body);
        program.methods.insert(method.id, method);

        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        check_definite_assignment(&program, &mut diagnostics);
        assert!(diagnostics.encountered_error());
    }

    #[test]
    fn while_true_with_no_break_is_treated_as_always_returning() {
        let body = Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::Sequence(vec![
                Expression::new(
                    Span::default(),
                    Type::any(),
                    ExpressionKind::While {
                        condition: Box::new(Expression::new(Span::default(), Type::any(), ExpressionKind::BoolLiteral(true))),
                        body: Box::new(Expression::new(Span::default(), Type::any(), ExpressionKind::Nop)),
                    },
                ),
                Expression::new(
                    Span::default(),
                    Type::any(),
                    ExpressionKind::Return(Some(Box::new(int_literal(1)))),
                ),
            ]),
        );
        let mut program = Program::default();
        let method = method_with_body(body);
        program.methods.insert(method.id, method);

        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        check_definite_assignment(&program, &mut diagnostics);
        assert!(!diagnostics.encountered_error());
    }

    #[test]
    fn constructor_missing_field_initialization_before_super_is_reported() {
        use toit_hir::hir::{Class, ClassId, Field, FieldId};

        let mut program = Program::default();
        let other = Class {
            id: ClassId::new(5),
            name: "Other".to_string(),
            span: Span::default(),
            shape: ClassShape::Class,
            is_abstract: false,
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            total_field_count: 0,
            toitdoc: None,
        };
        let field = Field {
            id: FieldId::new(0),
            name: "pet".to_string(),
            span: Span::default(),
            ty: Type::class(other.id, false),
            is_final: false,
            resolved_index: Some(0),
        };
        let class = Class {
            id: ClassId::new(0),
            name: "Owner".to_string(),
            span: Span::default(),
            shape: ClassShape::Class,
            is_abstract: false,
            super_class: None,
            interfaces: vec![],
            fields: vec![field],
            methods: vec![],
            total_field_count: 1,
            toitdoc: None,
        };

        let mut ctor = method_with_body(Expression::new(
            Span::default(),
            Type::any(),
            ExpressionKind::Sequence(vec![Expression::new(Span::default(), Type::any(), ExpressionKind::Super(Box::new(Expression::error(Span::default()))))]),
        ));
        ctor.kind = MethodKind::Constructor;
        ctor.owner = Some(class.id);

        program.classes.insert(other.id, other);
        program.classes.insert(class.id, class);
        program.methods.insert(ctor.id, ctor);

        let mut diagnostics = DiagnosticsBus::new(AnalysisSink::default(), Policy::default());
        check_constructor_field_initialization(&program, &mut diagnostics);
        assert!(diagnostics.encountered_error());
    }
}
