// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

use crate::hir::{Expression, ExpressionKind, Method};

pub trait Visitor<'a>: Sized {
    fn visit_method(&mut self, method: &'a Method) {
        walk_method(self, method);
    }

    fn visit_expr(&mut self, expr: &'a Expression) {
        walk_expr(self, expr);
    }
}

pub fn walk_method<'a>(vis: &mut impl Visitor<'a>, method: &'a Method) {
    if let Some(body) = &method.body {
        vis.visit_expr(body);
    }
    for param in &method.parameters {
        if let Some(default) = &param.default {
            vis.visit_expr(default);
        }
    }
}

pub fn walk_expr<'a>(vis: &mut impl Visitor<'a>, expr: &'a Expression) {
    match expr.kind.as_ref() {
        ExpressionKind::Nop
        | ExpressionKind::IntLiteral(_)
        | ExpressionKind::FloatLiteral(_)
        | ExpressionKind::BoolLiteral(_)
        | ExpressionKind::StringLiteral(_)
        | ExpressionKind::NullLiteral
        | ExpressionKind::Local(_)
        | ExpressionKind::Parameter(_)
        | ExpressionKind::LoopBranch { .. }
        | ExpressionKind::ReferenceLocal(_)
        | ExpressionKind::ReferenceMethod(_)
        | ExpressionKind::ReferenceGlobal(_)
        | ExpressionKind::ReferenceBlock(_)
        | ExpressionKind::ReferenceClass(_) => {}
        ExpressionKind::StringInterpolation(_, parts) => {
            for part in parts {
                if let Some(e) = &part.expr {
                    vis.visit_expr(e);
                }
            }
        }
        ExpressionKind::Block(stmts) | ExpressionKind::Sequence(stmts) | ExpressionKind::Error(stmts) => {
            for stmt in stmts {
                vis.visit_expr(stmt);
            }
        }
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            vis.visit_expr(condition);
            vis.visit_expr(then_branch);
            if let Some(e) = else_branch {
                vis.visit_expr(e);
            }
        }
        ExpressionKind::While { condition, body } => {
            vis.visit_expr(condition);
            vis.visit_expr(body);
        }
        ExpressionKind::TryFinally { body, finally } => {
            vis.visit_expr(body);
            vis.visit_expr(finally);
        }
        ExpressionKind::LogicalBinary { lhs, rhs, .. } => {
            vis.visit_expr(lhs);
            vis.visit_expr(rhs);
        }
        ExpressionKind::Not(e) | ExpressionKind::Code(e) | ExpressionKind::Super(e) => {
            vis.visit_expr(e);
        }
        ExpressionKind::Return(e) => {
            if let Some(e) = e {
                vis.visit_expr(e);
            }
        }
        ExpressionKind::Lambda { body, .. } => vis.visit_expr(body),
        ExpressionKind::FieldLoad { receiver, .. } => vis.visit_expr(receiver),
        ExpressionKind::FieldStore { receiver, value, .. } => {
            vis.visit_expr(receiver);
            vis.visit_expr(value);
        }
        ExpressionKind::Dot { receiver, .. } | ExpressionKind::LspSelectionDot { receiver, .. } => {
            vis.visit_expr(receiver);
        }
        ExpressionKind::Call { target, args, .. } => {
            vis.visit_expr(target);
            for arg in args {
                vis.visit_expr(&arg.value);
            }
        }
        ExpressionKind::Assignment { target, value, .. } => {
            vis.visit_expr(target);
            vis.visit_expr(value);
        }
        ExpressionKind::Typecheck { expr, .. } => vis.visit_expr(expr),
        ExpressionKind::PrimitiveInvocation { args, .. } => {
            for arg in args {
                vis.visit_expr(&arg.value);
            }
        }
    }
}
