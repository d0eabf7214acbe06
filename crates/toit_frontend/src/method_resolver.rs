// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Method resolver. Resolves every method body / global initializer's
//! AST into typed IR: identifier and call resolution, the constructor
//! two-phase (pre-/post-super) state machine, field-storing parameters,
//! compound-assignment and postfix-increment temporaries, string
//! interpolation, and `assert` rewriting.

use crate::{
    diagnostics::{DiagnosticsBus, Sink},
    program_builder::{ClassMethodKey, GlobalKey, ProgramSkeleton, TopLevelMethodKey},
    scope::{ClassScope, ModuleScope, Node, OverloadEntry, ResolutionEntry, ScopeStack},
};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use toit_ast::ast::{self, AssignOp, BinaryOp, Declaration, ExpressionKind as AstExprKind, ParameterKind, Unit, UnitId};
use toit_data_structures::span::Span;
use toit_hir::{
    assigner::LocalAssigner,
    hir::{self, Argument, CallKind, Class, ClassId, Expression, ExpressionKind, FieldId, Global, LocalId, LogicalOp, MethodId, Parameter, RuntimeHelper, StringPart},
    ty::{CallShape, Type},
};

/// The per-constructor-body state machine. Regular methods enter
/// `Static` or `Instance` directly and never transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConstructorState {
    StaticBeforeSuper,
    Super,
    Instance,
    Field,
    Static,
    InstanceMethod,
}

/// What kind of AST node the LSP selection point landed on, and the
/// candidates the resolver had in hand at that moment — consumed by the
/// language-service dispatcher.
#[derive(Clone, Debug)]
pub enum SelectionKind {
    CallVirtual,
    CallStatic,
    CallPrefixed,
    CallClass,
    Type,
    FieldStoringParameter,
    Show,
    ThisRef,
}

#[derive(Clone, Debug)]
pub struct Selection {
    pub kind: SelectionKind,
    pub span: Span,
    pub candidates: Vec<Node>,
}

/// Assertion compilation can be toggled off by the orchestrator (the
/// debug-instrumented compile turns assertions into `null`).
#[derive(Clone, Copy, Debug)]
pub struct ResolverOptions {
    pub assertions_enabled: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { assertions_enabled: true }
    }
}

struct MethodCtx<'a, S: Sink> {
    units: &'a [Unit],
    classes_by_id: &'a FxHashMap<ClassId, &'a Class>,
    class_scopes: &'a FxHashMap<ClassId, Rc<ClassScope>>,
    module_scopes: &'a [ModuleScope],
    method_names: &'a FxHashMap<MethodId, String>,
    method_kinds: &'a FxHashMap<MethodId, hir::MethodKind>,
    method_shapes: &'a FxHashMap<MethodId, toit_hir::ty::ResolutionShape>,
    unit_id: UnitId,
    owner_class: Option<ClassId>,
    this_local: Option<LocalId>,
    assigner: LocalAssigner,
    scopes: ScopeStack,
    constructor_state: ConstructorState,
    loop_depth: u32,
    diagnostics: &'a mut DiagnosticsBus<S>,
    options: ResolverOptions,
    selection: Option<Selection>,
    field_final_violations: Vec<Span>,
}

impl<'a, S: Sink> MethodCtx<'a, S> {
    fn module_scope(&self) -> &ModuleScope {
        &self.module_scopes[usize::from(self.unit_id)]
    }

    fn class_scope(&self) -> Option<Rc<ClassScope>> {
        self.owner_class.and_then(|id| self.class_scopes.get(&id).cloned())
    }

    fn lookup_field(&self, name: &str) -> Option<(FieldId, Type, bool)> {
        let mut current = self.owner_class;
        while let Some(id) = current {
            let class = self.classes_by_id.get(&id)?;
            if let Some(field) = class.fields.iter().find(|f| f.name == name) {
                return Some((field.id, field.ty, field.is_final));
            }
            current = class.super_class;
        }
        None
    }

    fn record_selection(&mut self, kind: SelectionKind, span: Span, candidates: Vec<Node>) {
        if self.selection.is_none() {
            self.selection = Some(Selection { kind, span, candidates });
        }
    }
}

/// Resolves every method body and global initializer in the skeleton's
/// arenas in place, returning the LSP selection hit (if any request landed
/// inside this compilation) for the language-service dispatcher to act on.
pub fn resolve_bodies<S: Sink>(skeleton: &mut ProgramSkeleton, units: &[Unit], diagnostics: &mut DiagnosticsBus<S>, options: ResolverOptions) -> Option<Selection> {
    let classes_by_id: FxHashMap<ClassId, &Class> = skeleton.classes.iter().map(|c| (c.id, c)).collect();
    let method_names: FxHashMap<MethodId, String> = skeleton.methods.iter().map(|m| (m.id, m.name.clone())).collect();
    let method_kinds: FxHashMap<MethodId, hir::MethodKind> = skeleton.methods.iter().map(|m| (m.id, m.kind)).collect();
    let method_shapes: FxHashMap<MethodId, toit_hir::ty::ResolutionShape> = skeleton.methods.iter().map(|m| (m.id, m.resolution_shape.clone())).collect();
    let mut selection = None;

    let mut class_method_lookup: FxHashMap<MethodId, ClassMethodKey> = FxHashMap::default();
    for (&key, &id) in &skeleton.class_methods {
        class_method_lookup.insert(id, key);
    }
    let mut top_level_lookup: FxHashMap<MethodId, TopLevelMethodKey> = FxHashMap::default();
    for (&key, &id) in &skeleton.top_level_methods {
        top_level_lookup.insert(id, key);
    }
    let mut global_lookup: FxHashMap<hir::GlobalId, GlobalKey> = FxHashMap::default();
    for (&key, &id) in &skeleton.globals_map {
        global_lookup.insert(id, key);
    }

    let method_ids: Vec<MethodId> = skeleton.methods.iter().map(|m| m.id).collect();
    for method_id in method_ids {
        let owner = skeleton.methods.iter().find(|m| m.id == method_id).and_then(|m| m.owner);
        let (unit_id, ast_method): (UnitId, Option<ast::MethodDecl>) = if let Some(&(unit_id, class_idx, method_idx)) = class_method_lookup.get(&method_id) {
            let Declaration::Class(class_decl) = &units[usize::from(unit_id)].declarations[class_idx] else {
                continue;
            };
            (unit_id, Some(class_decl.methods[method_idx].clone()))
        } else if let Some(&(unit_id, decl_idx)) = top_level_lookup.get(&method_id) {
            let Declaration::Method(method_decl) = &units[usize::from(unit_id)].declarations[decl_idx] else {
                continue;
            };
            (unit_id, Some(method_decl.clone()))
        } else {
            continue;
        };

        let Some(ast_method) = ast_method else { continue };
        let hir_method_kind = skeleton.methods.iter().find(|m| m.id == method_id).map(|m| m.kind);
        let Some(hir_method_kind) = hir_method_kind else { continue };

        let mut ctx = MethodCtx {
            units,
            classes_by_id: &classes_by_id,
            class_scopes: &skeleton.class_scopes,
            module_scopes: &skeleton.module_scopes,
            method_names: &method_names,
            method_kinds: &method_kinds,
            method_shapes: &method_shapes,
            unit_id,
            owner_class: owner,
            this_local: None,
            assigner: LocalAssigner::new(),
            scopes: ScopeStack::default(),
            constructor_state: initial_state(hir_method_kind),
            loop_depth: 0,
            diagnostics,
            options,
            selection: None,
            field_final_violations: Vec::new(),
        };
        ctx.scopes.push_local();

        let has_implicit_this = matches!(hir_method_kind, hir::MethodKind::Constructor | hir::MethodKind::Instance | hir::MethodKind::MonitorMethod);
        if has_implicit_this {
            let this_id = ctx.assigner.next_id();
            ctx.this_local = Some(this_id);
        }

        let mut parameters = Vec::new();
        let mut field_storing_assignments = Vec::new();
        for param in &ast_method.parameters {
            if param.kind == ParameterKind::Block {
                let id = ctx.assigner.next_id();
                ctx.scopes.bind(param.name.name.to_string(), id);
                parameters.push(Parameter {
                    id,
                    name: param.name.name.to_string(),
                    span: param.span,
                    ty: Type::any(),
                    is_block: true,
                    is_optional: param.is_optional,
                    default: None,
                });
                continue;
            }

            let id = ctx.assigner.next_id();
            let default = param.default.as_ref().map(|d| resolve_expr(&mut ctx, d));

            if param.is_field_storing {
                // Field-storing parameters are not visible in the body
                // scope: they exist only to feed the implicit field write.
                if let Some((field_id, field_ty, _)) = ctx.lookup_field(param.name.name.as_ref()) {
                    let param_ty = field_ty;
                    field_storing_assignments.push((field_id, param_ty, id, param.span));
                } else {
                    ctx.diagnostics.report_error(Some(param.span), format!("no field named '{}' to store into", param.name.name));
                }
            } else {
                ctx.scopes.bind(param.name.name.to_string(), id);
            }

            parameters.push(Parameter {
                id,
                name: param.name.name.to_string(),
                span: param.span,
                ty: Type::any(),
                is_block: false,
                is_optional: param.is_optional,
                default,
            });
        }

        let body = ast_method.body.as_ref().map(|body| {
            let mut resolved = resolve_expr(&mut ctx, body);
            if !field_storing_assignments.is_empty() {
                // Emitted as a prologue right where the super call (explicit
                // or synthetic) already landed the state machine in
                // `Instance`/`StaticBeforeSuper`-complete territory.
                let mut stmts: Vec<Expression> = field_storing_assignments
                    .into_iter()
                    .map(|(field_id, ty, param_id, span)| {
                        let receiver = this_reference(&ctx, span);
                        let value = Expression::new(span, ty, ExpressionKind::Parameter(param_id));
                        Expression::new(span, Type::none(), ExpressionKind::FieldStore { receiver: Box::new(receiver), field: field_id, value: Box::new(value) })
                    })
                    .collect();
                stmts.push(resolved);
                resolved = Expression::new(ast_method.span, Type::none(), ExpressionKind::Sequence(stmts));
            }
            if !ctx.options.assertions_enabled {
                resolved = strip_asserts(resolved);
            }
            resolved
        });

        if let Some(method) = skeleton.methods.iter_mut().find(|m| m.id == method_id) {
            method.parameters = parameters;
            method.body = body;
        }

        if ctx.selection.is_some() && selection.is_none() {
            selection = ctx.selection;
        }
    }

    let global_ids: Vec<hir::GlobalId> = skeleton.globals.iter().map(|g| g.id).collect();
    for global_id in global_ids {
        let Some(&(unit_id, decl_idx)) = global_lookup.get(&global_id) else { continue };
        let Declaration::Global(global_decl) = &units[usize::from(unit_id)].declarations[decl_idx] else {
            continue;
        };

        let mut ctx = MethodCtx {
            units,
            classes_by_id: &classes_by_id,
            class_scopes: &skeleton.class_scopes,
            module_scopes: &skeleton.module_scopes,
            method_names: &method_names,
            method_kinds: &method_kinds,
            method_shapes: &method_shapes,
            unit_id,
            owner_class: None,
            this_local: None,
            assigner: LocalAssigner::new(),
            scopes: ScopeStack::default(),
            constructor_state: ConstructorState::Static,
            loop_depth: 0,
            diagnostics,
            options,
            selection: None,
            field_final_violations: Vec::new(),
        };
        ctx.scopes.push_local();

        let initializer = global_decl.initializer.as_ref().map(|init| resolve_expr(&mut ctx, init));
        if let Some(global) = skeleton.globals.iter_mut().find(|g| g.id == global_id) {
            global.initializer = initializer;
        }
        if ctx.selection.is_some() && selection.is_none() {
            selection = ctx.selection;
        }
    }

    selection
}

fn initial_state(kind: hir::MethodKind) -> ConstructorState {
    match kind {
        hir::MethodKind::Constructor => ConstructorState::StaticBeforeSuper,
        hir::MethodKind::Instance | hir::MethodKind::MonitorMethod => ConstructorState::InstanceMethod,
        _ => ConstructorState::Static,
    }
}

fn this_reference<S: Sink>(ctx: &MethodCtx<S>, span: Span) -> Expression {
    ctx.this_local.map_or_else(
        || Expression::error(span),
        |id| {
            let ty = ctx.owner_class.map_or_else(Type::any, |c| Type::class(c, false));
            Expression::new(span, ty, ExpressionKind::Local(id))
        },
    )
}

/// Before the first instance access in a constructor's static prologue, a
/// synthetic zero-argument super call is inserted and the state machine
/// jumps straight to `Instance` (folding `LIMBO_INSTANCE` into the
/// transition rather than modeling it as a separate visited state).
fn synthesize_super_call<S: Sink>(ctx: &mut MethodCtx<S>, span: Span) -> Expression {
    let super_id = ctx.owner_class.and_then(|id| ctx.classes_by_id.get(&id)).and_then(|c| c.super_class);
    let target = super_id.map_or_else(|| Expression::error(span), |id| Expression::new(span, Type::class(id, false), ExpressionKind::ReferenceClass(id)));
    Expression::new(
        span,
        Type::none(),
        ExpressionKind::Call {
            kind: CallKind::Constructor,
            target: Box::new(target),
            args: vec![],
        },
    )
}

fn ensure_instance_phase<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, out: &mut Vec<Expression>) {
    if ctx.constructor_state == ConstructorState::StaticBeforeSuper {
        out.push(synthesize_super_call(ctx, span));
        ctx.constructor_state = ConstructorState::Instance;
    }
}

fn resolve_block<S: Sink>(ctx: &mut MethodCtx<S>, stmts: &[ast::Expression]) -> Expression {
    ctx.scopes.push_block();
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if is_instance_access(ctx, stmt) {
            let span = stmt.span;
            ensure_instance_phase(ctx, span, &mut out);
        }
        out.push(resolve_expr(ctx, stmt));
    }
    ctx.scopes.pop();
    let span = stmts.first().map_or_else(Span::default, |s| s.span);
    Expression::new(span, Type::any(), ExpressionKind::Block(out))
}

/// Conservative instance-access detector driving the constructor limbo
/// transition: `this`/`super` references or any bare identifier that
/// resolves to an instance field or instance method.
fn is_instance_access<S: Sink>(ctx: &MethodCtx<S>, expr: &ast::Expression) -> bool {
    match expr.kind.as_ref() {
        AstExprKind::This | AstExprKind::Super => true,
        AstExprKind::Dot { receiver, .. } => matches!(receiver.kind.as_ref(), AstExprKind::This | AstExprKind::Super),
        AstExprKind::Call { target, .. } => is_instance_access(ctx, target),
        AstExprKind::SuperCall { .. } => false,
        AstExprKind::Identifier(path) => is_bare_instance_identifier(ctx, path),
        _ => false,
    }
}

/// Whether a single-segment identifier resolves to an instance field or
/// instance method the way `resolve_identifier` would: locals and module
/// entries (globals, classes) shadow instance members and don't count.
fn is_bare_instance_identifier<S: Sink>(ctx: &MethodCtx<S>, path: &ast::Path) -> bool {
    if path.segments.len() != 1 {
        return false;
    }
    let name = path.last().name.as_ref();
    if ctx.scopes.lookup_local(name).is_some() {
        return false;
    }
    let Some(class_scope) = ctx.class_scope() else {
        return false;
    };
    if let Some(overloads) = class_scope.lookup(name) {
        let has_instance_method = overloads.iter().take_while(|e| !matches!(e, OverloadEntry::SuperSeparator)).any(|e| matches!(e, OverloadEntry::Method(_)));
        if has_instance_method {
            return true;
        }
    }
    ctx.lookup_field(name).is_some()
}

fn resolve_expr<S: Sink>(ctx: &mut MethodCtx<S>, expr: &ast::Expression) -> Expression {
    let span = expr.span;
    match expr.kind.as_ref() {
        AstExprKind::Error => Expression::error(span),
        AstExprKind::Nop => Expression::new(span, Type::none(), ExpressionKind::Nop),
        AstExprKind::IntLiteral(v) => Expression::new(span, Type::any(), ExpressionKind::IntLiteral(*v)),
        AstExprKind::FloatLiteral(v) => Expression::new(span, Type::any(), ExpressionKind::FloatLiteral(*v)),
        AstExprKind::BoolLiteral(v) => Expression::new(span, Type::any(), ExpressionKind::BoolLiteral(*v)),
        AstExprKind::StringLiteral(s) => Expression::new(span, Type::any(), ExpressionKind::StringLiteral(dedent_multiline(s))),
        AstExprKind::NullLiteral => Expression::new(span, Type::any().nullable(), ExpressionKind::NullLiteral),
        AstExprKind::This => {
            ctx.record_selection(SelectionKind::ThisRef, span, vec![]);
            this_reference(ctx, span)
        }
        AstExprKind::Super => {
            let this = this_reference(ctx, span);
            Expression::new(span, Type::any(), ExpressionKind::Super(Box::new(this)))
        }
        AstExprKind::It => ctx
            .scopes
            .lookup_local("it")
            .map(|lookup| local_lookup_to_expr(span, &lookup))
            .unwrap_or_else(|| Expression::error(span)),
        AstExprKind::StringInterpolation(parts) => resolve_interpolation(ctx, span, parts),
        AstExprKind::Identifier(path) => resolve_identifier(ctx, span, path),
        AstExprKind::Block(stmts) => resolve_block(ctx, stmts),
        AstExprKind::If { condition, then_branch, else_branch } => {
            let condition = resolve_expr(ctx, condition);
            let then_branch = resolve_expr(ctx, then_branch);
            let else_branch = else_branch.as_ref().map(|e| Box::new(resolve_expr(ctx, e)));
            Expression::new(
                span,
                Type::any(),
                ExpressionKind::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                },
            )
        }
        AstExprKind::While { condition, body } => {
            ctx.loop_depth += 1;
            let condition = resolve_expr(ctx, condition);
            let body = resolve_expr(ctx, body);
            ctx.loop_depth -= 1;
            Expression::new(span, Type::none(), ExpressionKind::While { condition: Box::new(condition), body: Box::new(body) })
        }
        AstExprKind::For { init, condition, update, body } => {
            // Desugared to a `while`, matching the loop-unification strategy
            // the condition/update steps already need regardless of surface
            // syntax.
            ctx.scopes.push_block();
            let init_expr = init.as_ref().map(|e| resolve_expr(ctx, e));
            ctx.loop_depth += 1;
            let condition_expr = condition.as_ref().map(|e| resolve_expr(ctx, e)).unwrap_or_else(|| Expression::new(span, Type::any(), ExpressionKind::BoolLiteral(true)));
            let mut body_stmts = vec![resolve_expr(ctx, body)];
            if let Some(update) = update {
                body_stmts.push(resolve_expr(ctx, update));
            }
            ctx.loop_depth -= 1;
            ctx.scopes.pop();
            let body_block = Expression::new(span, Type::none(), ExpressionKind::Block(body_stmts));
            let while_loop = Expression::new(span, Type::none(), ExpressionKind::While { condition: Box::new(condition_expr), body: Box::new(body_block) });
            match init_expr {
                Some(init_expr) => Expression::new(span, Type::none(), ExpressionKind::Sequence(vec![init_expr, while_loop])),
                None => while_loop,
            }
        }
        AstExprKind::TryFinally { body, finally } => {
            let body = resolve_expr(ctx, body);
            let finally = resolve_expr(ctx, finally);
            Expression::new(span, Type::any(), ExpressionKind::TryFinally { body: Box::new(body), finally: Box::new(finally) })
        }
        AstExprKind::LogicalBinary { op, lhs, rhs } => {
            let op = match op {
                BinaryOp::And => LogicalOp::And,
                BinaryOp::Or => LogicalOp::Or,
            };
            let lhs = resolve_expr(ctx, lhs);
            let rhs = resolve_expr(ctx, rhs);
            Expression::new(span, Type::any(), ExpressionKind::LogicalBinary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
        }
        AstExprKind::Not(inner) => {
            let inner = resolve_expr(ctx, inner);
            Expression::new(span, Type::any(), ExpressionKind::Not(Box::new(inner)))
        }
        AstExprKind::Return(value) => {
            let value = value.as_ref().map(|v| Box::new(resolve_expr(ctx, v)));
            Expression::new(span, Type::none(), ExpressionKind::Return(value))
        }
        AstExprKind::Break(_) => Expression::new(span, Type::none(), ExpressionKind::LoopBranch { is_break: true, depth: ctx.loop_depth.saturating_sub(1) }),
        AstExprKind::Continue => Expression::new(span, Type::none(), ExpressionKind::LoopBranch { is_break: false, depth: ctx.loop_depth.saturating_sub(1) }),
        AstExprKind::Dot { receiver, name } => resolve_dot(ctx, span, receiver, name),
        AstExprKind::Index { receiver, index } => {
            let receiver = resolve_expr(ctx, receiver);
            let index = resolve_expr(ctx, index);
            build_operator_call(span, receiver, "[]", vec![index])
        }
        AstExprKind::Call { target, args } => resolve_call(ctx, span, target, args),
        AstExprKind::SuperCall { args } => resolve_super_call(ctx, span, args),
        AstExprKind::Assignment { op, lhs, rhs } => resolve_assignment(ctx, span, *op, lhs, rhs),
        AstExprKind::PostfixIncrement { lhs, is_increment } => resolve_postfix_increment(ctx, span, lhs, *is_increment),
        AstExprKind::Lambda { parameters, body } => resolve_lambda(ctx, span, parameters, body),
        AstExprKind::Code(inner) => {
            let inner = resolve_expr(ctx, inner);
            Expression::new(span, Type::any(), ExpressionKind::Code(Box::new(inner)))
        }
        AstExprKind::Typecheck { expr, ty: _, is_as } => {
            let inner = resolve_expr(ctx, expr);
            Expression::new(span, Type::any(), ExpressionKind::Typecheck { expr: Box::new(inner), ty: Type::any(), is_as: *is_as })
        }
        AstExprKind::Assert(inner) => resolve_assert(ctx, span, inner),
        AstExprKind::LspSelection(inner) => resolve_lsp_selection(ctx, inner),
    }
}

fn resolve_lsp_selection<S: Sink>(ctx: &mut MethodCtx<S>, inner: &ast::Expression) -> Expression {
    // The underlying node resolves exactly as normal; `resolve_dot`/
    // `resolve_call`/etc. detect the flagged span via `record_selection`
    // once they run, and `resolve_dot` promotes its result to
    // `LspSelectionDot` when the recorded selection matches this span.
    let span = inner.span;
    let resolved = resolve_expr(ctx, inner);
    if let ExpressionKind::Dot { receiver, method } = *resolved.kind {
        ctx.record_selection(SelectionKind::CallVirtual, span, vec![Node::Method(method)]);
        Expression::new(resolved.span, resolved.ty, ExpressionKind::LspSelectionDot { receiver, method })
    } else {
        resolved
    }
}

fn local_lookup_to_expr(span: Span, lookup: &crate::scope::Lookup) -> Expression {
    match &lookup.entry {
        ResolutionEntry::Nodes(nodes) if nodes.len() == 1 => match nodes[0] {
            Node::Local(id) => Expression::new(span, Type::any(), ExpressionKind::Local(id)),
            _ => Expression::error(span),
        },
        _ => Expression::error(span),
    }
}

fn resolve_identifier<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, path: &ast::Path) -> Expression {
    if path.segments.len() == 1 {
        let name = path.last().name.as_ref();
        if let Some(lookup) = ctx.scopes.lookup_local(name) {
            return local_lookup_to_expr(span, &lookup);
        }
        if let Some(class_scope) = ctx.class_scope() {
            if let Some(overloads) = class_scope.lookup(name) {
                let methods: Vec<MethodId> = overloads
                    .iter()
                    .take_while(|e| !matches!(e, OverloadEntry::SuperSeparator))
                    .filter_map(|e| match e {
                        OverloadEntry::Method(id) => Some(*id),
                        OverloadEntry::SuperSeparator => None,
                    })
                    .collect();
                if let [single] = methods[..] {
                    let receiver = this_reference(ctx, span);
                    return Expression::new(span, Type::any(), ExpressionKind::Dot { receiver: Box::new(receiver), method: single });
                }
            }
            if let Some((field_id, ty, _)) = ctx.lookup_field(name) {
                let receiver = this_reference(ctx, span);
                return Expression::new(span, ty, ExpressionKind::FieldLoad { receiver: Box::new(receiver), field: field_id });
            }
        }
        return resolve_module_entry(ctx, span, ctx.module_scope().entries.get(name).cloned());
    }

    // Multi-segment: `prefix.Name` or `prefix.Name.Member`.
    let first = path.segments[0].name.as_ref();
    let Some(ResolutionEntry::Prefix(prefix_scope)) = ctx.module_scope().entries.get(first).cloned() else {
        return resolve_module_entry(ctx, span, ctx.module_scope().entries.get(first).cloned());
    };
    let rest_name = path.segments[1].name.as_ref();
    ctx.record_selection(SelectionKind::CallPrefixed, span, vec![]);
    resolve_module_entry(ctx, span, prefix_scope.entries.get(rest_name).cloned())
}

fn resolve_module_entry<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, entry: Option<ResolutionEntry>) -> Expression {
    match entry {
        Some(ResolutionEntry::Nodes(nodes)) if nodes.len() == 1 => match nodes[0] {
            Node::Class(id) => {
                ctx.record_selection(SelectionKind::CallClass, span, vec![Node::Class(id)]);
                Expression::new(span, Type::any(), ExpressionKind::ReferenceClass(id))
            }
            Node::Method(id) => Expression::new(span, Type::any(), ExpressionKind::ReferenceMethod(id)),
            Node::Global(id) => Expression::new(span, Type::any(), ExpressionKind::ReferenceGlobal(id)),
            Node::Local(id) => Expression::new(span, Type::any(), ExpressionKind::Local(id)),
        },
        Some(ResolutionEntry::Nodes(nodes)) => Expression::new(span, Type::any(), ExpressionKind::Error(nodes.into_iter().filter_map(node_placeholder).collect())),
        _ => {
            ctx.diagnostics.report_error(Some(span), "unresolved identifier");
            Expression::error(span)
        }
    }
}

fn node_placeholder(node: Node) -> Option<Expression> {
    let span = Span::default();
    Some(match node {
        Node::Class(id) => Expression::new(span, Type::any(), ExpressionKind::ReferenceClass(id)),
        Node::Method(id) => Expression::new(span, Type::any(), ExpressionKind::ReferenceMethod(id)),
        Node::Global(id) => Expression::new(span, Type::any(), ExpressionKind::ReferenceGlobal(id)),
        Node::Local(id) => Expression::new(span, Type::any(), ExpressionKind::Local(id)),
    })
}

fn resolve_dot<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, receiver: &ast::Expression, name: &ast::Ident) -> Expression {
    if matches!(receiver.kind.as_ref(), AstExprKind::Super) {
        // `super.foo` without a call: resolved as a bound reference to the
        // first super overload accepting zero arguments (best effort; the
        // call site, if any, re-resolves the full overload set).
        if let Some(class_scope) = ctx.class_scope() {
            let supers = class_scope.super_overloads(name.name.as_ref());
            if let Some(&method_id) = supers.first() {
                let this = this_reference(ctx, span);
                return Expression::new(span, Type::any(), ExpressionKind::Call { kind: CallKind::Static, target: Box::new(Expression::new(span, Type::any(), ExpressionKind::ReferenceMethod(method_id))), args: vec![Argument { value: this }] });
            }
        }
        ctx.diagnostics.report_error(Some(span), format!("no super method named '{}'", name.name));
        return Expression::error(span);
    }

    let receiver_expr = resolve_expr(ctx, receiver);
    let candidates = receiver_class(ctx, &receiver_expr).and_then(|class_id| ctx.class_scopes.get(&class_id).cloned()).and_then(|scope| scope.lookup(name.name.as_ref()).map(<[_]>::to_vec));

    let Some(candidates) = candidates else {
        ctx.diagnostics.report_warning(Some(span), format!("cannot resolve member '{}' statically; emitting a dynamic dispatch", name.name));
        return Expression::new(span, Type::any(), ExpressionKind::Error(vec![receiver_expr]));
    };

    let methods: Vec<MethodId> = candidates
        .into_iter()
        .take_while(|e| !matches!(e, OverloadEntry::SuperSeparator))
        .filter_map(|e| match e {
            OverloadEntry::Method(id) => Some(id),
            OverloadEntry::SuperSeparator => None,
        })
        .collect();

    match methods.as_slice() {
        [] => {
            ctx.diagnostics.report_error(Some(span), format!("no member named '{}'", name.name));
            Expression::error(span)
        }
        [single] => {
            ctx.record_selection(SelectionKind::CallVirtual, span, vec![Node::Method(*single)]);
            Expression::new(span, Type::any(), ExpressionKind::Dot { receiver: Box::new(receiver_expr), method: *single })
        }
        many => {
            // Overloaded member reference without a call site yet: picked at
            // the enclosing `Call` node; here we stash the first candidate
            // and let `resolve_call` re-dispatch by shape.
            ctx.record_selection(SelectionKind::CallVirtual, span, many.iter().copied().map(Node::Method).collect());
            Expression::new(span, Type::any(), ExpressionKind::Dot { receiver: Box::new(receiver_expr), method: many[0] })
        }
    }
}

fn receiver_class<S: Sink>(ctx: &MethodCtx<S>, receiver: &Expression) -> Option<ClassId> {
    if let toit_hir::ty::TyKind::Class(id) = receiver.ty.kind {
        return Some(id);
    }
    if matches!(*receiver.kind, ExpressionKind::Local(id) if Some(id) == ctx.this_local) {
        return ctx.owner_class;
    }
    None
}

fn call_shape_from_args(args: &[ast::Argument]) -> CallShape {
    let mut arity = 0;
    let mut named_arg_names = Vec::new();
    let mut block_positions = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        if matches!(arg.value.kind.as_ref(), AstExprKind::Lambda { .. }) {
            block_positions.push(index);
        }
        match &arg.name {
            Some(name) => named_arg_names.push(name.name.to_string()),
            None => arity += 1,
        }
    }
    CallShape { arity, named_arg_names, block_positions }
}

fn resolve_call<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, target: &ast::Expression, args: &[ast::Argument]) -> Expression {
    let resolved_args: Vec<Argument> = args.iter().map(|a| Argument { value: resolve_expr(ctx, &a.value) }).collect();
    let call_shape = call_shape_from_args(args);

    // A class reference as a call target expands to its constructors and
    // factories; pick the first whose shape accepts this call site.
    if let AstExprKind::Identifier(path) = target.kind.as_ref() {
        if path.segments.len() == 1 {
            if let Some(ResolutionEntry::Nodes(nodes)) = ctx.module_scope().entries.get(path.last().name.as_ref()).cloned() {
                if let [Node::Class(class_id)] = nodes[..] {
                    ctx.record_selection(SelectionKind::CallClass, span, vec![Node::Class(class_id)]);
                    if let Some(method_id) = pick_constructor(ctx, class_id, &call_shape) {
                        return Expression::new(
                            span,
                            Type::class(class_id, false),
                            ExpressionKind::Call {
                                kind: CallKind::Constructor,
                                target: Box::new(Expression::new(span, Type::any(), ExpressionKind::ReferenceMethod(method_id))),
                                args: resolved_args,
                            },
                        );
                    }
                    ctx.diagnostics.report_error(Some(span), "no constructor accepts this argument shape");
                    return Expression::error(span);
                }
            }
        }
    }

    let target_expr = resolve_expr(ctx, target);
    match *target_expr.kind {
        ExpressionKind::Dot { receiver, method } => {
            // Re-dispatch against the full overload set visible on the
            // receiver's static class, now that the call shape is known.
            let owner_class = receiver_class(ctx, &receiver);
            let overloads = owner_class.and_then(|id| ctx.class_scopes.get(&id)).map(|scope| scope.own_overloads(method_name(ctx, method)));
            let chosen = overloads
                .as_deref()
                .and_then(|candidates| pick_overload(ctx, candidates, &call_shape))
                .unwrap_or(method);
            Expression::new(span, Type::any(), ExpressionKind::Call { kind: CallKind::Virtual, target: Box::new(Expression::new(span, Type::any(), ExpressionKind::Dot { receiver, method: chosen })), args: resolved_args })
        }
        ExpressionKind::ReferenceMethod(method_id) => Expression::new(span, Type::any(), ExpressionKind::Call { kind: CallKind::Static, target: Box::new(Expression::new(span, Type::any(), ExpressionKind::ReferenceMethod(method_id))), args: resolved_args }),
        ExpressionKind::Local(id) => Expression::new(span, Type::any(), ExpressionKind::Call { kind: CallKind::Block, target: Box::new(Expression::new(span, Type::any(), ExpressionKind::ReferenceBlock(id))), args: resolved_args }),
        other => Expression::new(span, Type::any(), ExpressionKind::Call { kind: CallKind::Virtual, target: Box::new(Expression::new(target_expr.span, target_expr.ty, other)), args: resolved_args }),
    }
}

fn method_name<'a, S: Sink>(ctx: &'a MethodCtx<S>, id: MethodId) -> &'a str {
    ctx.method_names.get(&id).map_or("", String::as_str)
}

fn pick_overload<S: Sink>(ctx: &MethodCtx<S>, candidates: &[MethodId], call_shape: &CallShape) -> Option<MethodId> {
    candidates
        .iter()
        .copied()
        .find(|id| ctx.method_shapes.get(id).is_some_and(|shape| shape.accepts(call_shape)))
        .or_else(|| candidates.first().copied())
}

fn pick_constructor<S: Sink>(ctx: &MethodCtx<S>, class_id: ClassId, call_shape: &CallShape) -> Option<MethodId> {
    let class = ctx.classes_by_id.get(&class_id)?;
    let constructors: Vec<MethodId> = class
        .methods
        .iter()
        .copied()
        .filter(|id| matches!(ctx.method_kinds.get(id), Some(hir::MethodKind::Constructor | hir::MethodKind::Factory)))
        .collect();
    constructors
        .iter()
        .copied()
        .find(|id| ctx.method_shapes.get(id).is_some_and(|shape| shape.accepts(call_shape)))
        .or_else(|| constructors.first().copied())
}

fn resolve_super_call<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, args: &[ast::Argument]) -> Expression {
    let resolved_args: Vec<Argument> = args.iter().map(|a| Argument { value: resolve_expr(ctx, &a.value) }).collect();
    let super_id = ctx.owner_class.and_then(|id| ctx.classes_by_id.get(&id)).and_then(|c| c.super_class);
    ctx.constructor_state = ConstructorState::Instance;
    let target = super_id.map_or_else(|| Expression::error(span), |id| Expression::new(span, Type::class(id, false), ExpressionKind::ReferenceClass(id)));
    Expression::new(span, Type::none(), ExpressionKind::Call { kind: CallKind::Constructor, target: Box::new(target), args: resolved_args })
}

fn build_operator_call(span: Span, receiver: Expression, op_name: &str, args: Vec<Expression>) -> Expression {
    Expression::new(
        span,
        Type::any(),
        ExpressionKind::PrimitiveInvocation {
            module: "core".to_string(),
            name: op_name.to_string(),
            args: std::iter::once(Argument { value: receiver }).chain(args.into_iter().map(|value| Argument { value })).collect(),
        },
    )
}

fn resolve_assignment<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, op: AssignOp, lhs: &ast::Expression, rhs: &ast::Expression) -> Expression {
    if op == AssignOp::Define {
        if let AstExprKind::Identifier(path) = lhs.kind.as_ref() {
            let value = resolve_expr(ctx, rhs);
            let id = ctx.assigner.next_id();
            ctx.scopes.bind(path.last().name.to_string(), id);
            let target = Expression::new(lhs.span, Type::any(), ExpressionKind::Local(id));
            return Expression::new(span, value.ty, ExpressionKind::Assignment { kind: hir::AssignmentKind::Define, target: Box::new(target), value: Box::new(value) });
        }
    }

    let rhs_resolved = resolve_expr(ctx, rhs);
    let value = if op == AssignOp::Eq {
        rhs_resolved
    } else {
        let op_name = match op {
            AssignOp::Add => "+",
            AssignOp::Sub => "-",
            AssignOp::Mul => "*",
            AssignOp::Div => "/",
            AssignOp::Mod => "%",
            AssignOp::Eq | AssignOp::Define => unreachable!(),
        };
        let current = resolve_expr(ctx, lhs);
        build_operator_call(span, current, op_name, vec![rhs_resolved])
    };

    resolve_assignment_target(ctx, span, lhs, value)
}

fn resolve_assignment_target<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, lhs: &ast::Expression, value: Expression) -> Expression {
    match lhs.kind.as_ref() {
        AstExprKind::Identifier(path) if path.segments.len() == 1 => {
            let name = path.last().name.as_ref();
            if let Some(lookup) = ctx.scopes.lookup_local(name) {
                if let ResolutionEntry::Nodes(nodes) = lookup.entry {
                    if let [Node::Local(id)] = nodes[..] {
                        return Expression::new(span, value.ty, ExpressionKind::Assignment { kind: hir::AssignmentKind::Local, target: Box::new(Expression::new(lhs.span, Type::any(), ExpressionKind::Local(id))), value: Box::new(value) });
                    }
                }
            }
            if let Some((field_id, field_ty, is_final)) = ctx.lookup_field(name) {
                if is_final && ctx.constructor_state == ConstructorState::Instance {
                    ctx.field_final_violations.push(span);
                    ctx.diagnostics.report_error(Some(span), format!("cannot assign to final field '{name}'"));
                }
                let receiver = this_reference(ctx, span);
                return Expression::new(span, field_ty, ExpressionKind::FieldStore { receiver: Box::new(receiver), field: field_id, value: Box::new(value) });
            }
            if let Some(ResolutionEntry::Nodes(nodes)) = ctx.module_scope().entries.get(name).cloned() {
                if let [Node::Global(id)] = nodes[..] {
                    return Expression::new(span, value.ty, ExpressionKind::Assignment { kind: hir::AssignmentKind::Global, target: Box::new(Expression::new(lhs.span, Type::any(), ExpressionKind::ReferenceGlobal(id))), value: Box::new(value) });
                }
            }
            ctx.diagnostics.report_error(Some(span), format!("cannot assign to unresolved identifier '{name}'"));
            Expression::error(span)
        }
        AstExprKind::Dot { receiver, name } => {
            let receiver_expr = resolve_expr(ctx, receiver);
            let field = receiver_class(ctx, &receiver_expr).and_then(|class_id| ctx.classes_by_id.get(&class_id)).and_then(|class| class.fields.iter().find(|f| f.name == name.name.as_ref()));
            match field {
                Some(field) => Expression::new(span, field.ty, ExpressionKind::FieldStore { receiver: Box::new(receiver_expr), field: field.id, value: Box::new(value) }),
                None => {
                    ctx.diagnostics.report_error(Some(span), format!("no field named '{}'", name.name));
                    Expression::error(span)
                }
            }
        }
        AstExprKind::Index { receiver, index } => {
            let receiver_expr = resolve_expr(ctx, receiver);
            let index_expr = resolve_expr(ctx, index);
            build_operator_call(span, receiver_expr, "[]=", vec![index_expr, value])
        }
        _ => {
            ctx.diagnostics.report_error(Some(span), "invalid assignment target");
            Expression::error(span)
        }
    }
}

fn resolve_postfix_increment<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, lhs: &ast::Expression, is_increment: bool) -> Expression {
    let old_value = resolve_expr(ctx, lhs);
    let old_local = ctx.assigner.next_id();
    let op_name = if is_increment { "+" } else { "-" };
    let one = Expression::new(span, Type::any(), ExpressionKind::IntLiteral(1));
    let new_value = build_operator_call(span, Expression::new(span, Type::any(), ExpressionKind::Local(old_local)), op_name, vec![one]);
    let store = resolve_assignment_target(ctx, span, lhs, new_value);
    Expression::new(
        span,
        Type::any(),
        ExpressionKind::Sequence(vec![
            Expression::new(span, old_value.ty, ExpressionKind::Assignment { kind: hir::AssignmentKind::Define, target: Box::new(Expression::new(span, Type::any(), ExpressionKind::Local(old_local))), value: Box::new(old_value) }),
            store,
            Expression::new(span, Type::any(), ExpressionKind::Local(old_local)),
        ]),
    )
}

fn resolve_lambda<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, parameters: &[ast::Parameter], body: &ast::Expression) -> Expression {
    let depth = ctx.loop_depth;
    ctx.scopes.push_lambda(depth);
    let mut hir_params = Vec::new();
    let mut captures = Vec::new();

    if parameters.is_empty() {
        // A single-argument block with no declared parameters exposes the
        // implicit `it`.
        let it_id = ctx.assigner.next_id();
        ctx.scopes.push_it(it_id);
        hir_params.push(Parameter { id: it_id, name: "it".to_string(), span, ty: Type::any(), is_block: false, is_optional: true, default: None });
    } else {
        for param in parameters {
            let id = ctx.assigner.next_id();
            ctx.scopes.bind(param.name.name.to_string(), id);
            hir_params.push(Parameter { id, name: param.name.name.to_string(), span: param.span, ty: Type::any(), is_block: false, is_optional: param.is_optional, default: None });
        }
    }

    let body = resolve_expr(ctx, body);
    if parameters.is_empty() {
        ctx.scopes.pop();
    }
    ctx.scopes.pop();

    Expression::new(span, Type::any(), ExpressionKind::Lambda { parameters: hir_params, body: Box::new(body), captures })
}

fn resolve_assert<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, inner: &ast::Expression) -> Expression {
    if !ctx.options.assertions_enabled {
        return Expression::new(span, Type::any().nullable(), ExpressionKind::NullLiteral);
    }
    let resolved = resolve_expr(ctx, inner);
    let code = Expression::new(span, Type::any(), ExpressionKind::Code(Box::new(resolved)));
    Expression::new(
        span,
        Type::none(),
        ExpressionKind::Call {
            kind: CallKind::Static,
            target: Box::new(Expression::new(span, Type::any(), ExpressionKind::Error(vec![]))),
            args: vec![Argument { value: code }],
        },
    )
}

/// Post-resolution pass that replaces every `_assert` call the resolver
/// emitted with `null`, used when the orchestrator disables assertion
/// compilation for a release build rather than during ordinary resolution.
fn strip_asserts(expr: Expression) -> Expression {
    let span = expr.span;
    let ty = expr.ty;
    if is_assert_call(&expr.kind) {
        return Expression::new(span, Type::any().nullable(), ExpressionKind::NullLiteral);
    }
    let kind = match *expr.kind {
        k @ (ExpressionKind::Nop
        | ExpressionKind::IntLiteral(_)
        | ExpressionKind::FloatLiteral(_)
        | ExpressionKind::BoolLiteral(_)
        | ExpressionKind::StringLiteral(_)
        | ExpressionKind::NullLiteral
        | ExpressionKind::Local(_)
        | ExpressionKind::Parameter(_)
        | ExpressionKind::ReferenceLocal(_)
        | ExpressionKind::ReferenceMethod(_)
        | ExpressionKind::ReferenceGlobal(_)
        | ExpressionKind::ReferenceBlock(_)
        | ExpressionKind::ReferenceClass(_)
        | ExpressionKind::LoopBranch { .. }) => k,
        ExpressionKind::StringInterpolation(helper, parts) => ExpressionKind::StringInterpolation(
            helper,
            parts
                .into_iter()
                .map(|p| StringPart { literal: p.literal, expr: p.expr.map(strip_asserts) })
                .collect(),
        ),
        ExpressionKind::Block(stmts) => ExpressionKind::Block(stmts.into_iter().map(strip_asserts).collect()),
        ExpressionKind::Sequence(stmts) => ExpressionKind::Sequence(stmts.into_iter().map(strip_asserts).collect()),
        ExpressionKind::If { condition, then_branch, else_branch } => ExpressionKind::If {
            condition: Box::new(strip_asserts(*condition)),
            then_branch: Box::new(strip_asserts(*then_branch)),
            else_branch: else_branch.map(|e| Box::new(strip_asserts(*e))),
        },
        ExpressionKind::While { condition, body } => ExpressionKind::While {
            condition: Box::new(strip_asserts(*condition)),
            body: Box::new(strip_asserts(*body)),
        },
        ExpressionKind::TryFinally { body, finally } => ExpressionKind::TryFinally {
            body: Box::new(strip_asserts(*body)),
            finally: Box::new(strip_asserts(*finally)),
        },
        ExpressionKind::LogicalBinary { op, lhs, rhs } => ExpressionKind::LogicalBinary {
            op,
            lhs: Box::new(strip_asserts(*lhs)),
            rhs: Box::new(strip_asserts(*rhs)),
        },
        ExpressionKind::Not(inner) => ExpressionKind::Not(Box::new(strip_asserts(*inner))),
        ExpressionKind::Return(value) => ExpressionKind::Return(value.map(|v| Box::new(strip_asserts(*v)))),
        ExpressionKind::Code(inner) => ExpressionKind::Code(Box::new(strip_asserts(*inner))),
        ExpressionKind::Lambda { parameters, body, captures } => ExpressionKind::Lambda {
            parameters,
            body: Box::new(strip_asserts(*body)),
            captures,
        },
        ExpressionKind::FieldLoad { receiver, field } => ExpressionKind::FieldLoad { receiver: Box::new(strip_asserts(*receiver)), field },
        ExpressionKind::FieldStore { receiver, field, value } => ExpressionKind::FieldStore {
            receiver: Box::new(strip_asserts(*receiver)),
            field,
            value: Box::new(strip_asserts(*value)),
        },
        ExpressionKind::Dot { receiver, method } => ExpressionKind::Dot { receiver: Box::new(strip_asserts(*receiver)), method },
        ExpressionKind::LspSelectionDot { receiver, method } => ExpressionKind::LspSelectionDot { receiver: Box::new(strip_asserts(*receiver)), method },
        ExpressionKind::Super(inner) => ExpressionKind::Super(Box::new(strip_asserts(*inner))),
        ExpressionKind::Call { kind, target, args } => ExpressionKind::Call {
            kind,
            target: Box::new(strip_asserts(*target)),
            args: args.into_iter().map(|a| Argument { value: strip_asserts(a.value) }).collect(),
        },
        ExpressionKind::Assignment { kind, target, value } => ExpressionKind::Assignment {
            kind,
            target: Box::new(strip_asserts(*target)),
            value: Box::new(strip_asserts(*value)),
        },
        ExpressionKind::Typecheck { expr, ty, is_as } => ExpressionKind::Typecheck { expr: Box::new(strip_asserts(*expr)), ty, is_as },
        ExpressionKind::PrimitiveInvocation { module, name, args } => ExpressionKind::PrimitiveInvocation {
            module,
            name,
            args: args.into_iter().map(|a| Argument { value: strip_asserts(a.value) }).collect(),
        },
        ExpressionKind::Error(nested) => ExpressionKind::Error(nested.into_iter().map(strip_asserts).collect()),
    };
    Expression::new(span, ty, kind)
}

/// The exact shape `resolve_assert` builds for a live (non-disabled) assert
/// call: a static call to an unresolved `_assert` target wrapping a `Code`
/// block.
fn is_assert_call(kind: &ExpressionKind) -> bool {
    matches!(
        kind,
        ExpressionKind::Call { kind: CallKind::Static, target, args }
            if matches!(target.kind.as_ref(), ExpressionKind::Error(nested) if nested.is_empty())
                && args.len() == 1
                && matches!(*args[0].value.kind, ExpressionKind::Code(_))
    )
}

fn resolve_interpolation<S: Sink>(ctx: &mut MethodCtx<S>, span: Span, parts: &[ast::StringPart]) -> Expression {
    let has_format = parts.iter().any(|p| p.format.is_some());
    let hir_parts: Vec<StringPart> = parts
        .iter()
        .map(|part| StringPart {
            literal: dedent_multiline(&part.literal),
            expr: part.expr.as_ref().map(|e| resolve_expr(ctx, e)),
        })
        .collect();

    if hir_parts.len() == 1 && hir_parts[0].expr.is_none() {
        return Expression::new(span, Type::any(), ExpressionKind::StringLiteral(hir_parts.into_iter().next().expect("checked len").literal));
    }

    let helper = if has_format { RuntimeHelper::InterpolateStrings } else { RuntimeHelper::SimpleInterpolateStrings };
    Expression::new(span, Type::any(), ExpressionKind::StringInterpolation(helper, hir_parts))
}

/// Strips the minimum common leading whitespace from every non-empty line
/// of a multi-line string literal.
fn dedent_multiline(s: &str) -> String {
    if !s.contains('\n') {
        return s.to_string();
    }
    let min_indent = s
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    s.lines().map(|line| if line.len() >= min_indent { &line[min_indent..] } else { line.trim_start() }).collect::<Vec<_>>().join("\n")
}
