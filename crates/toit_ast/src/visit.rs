// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

use crate::ast::{
    ClassDecl, Declaration, Expression, ExpressionKind, FieldDecl, GlobalDecl, MethodDecl, Path,
    Unit,
};

pub trait Visitor<'a>: Sized {
    fn visit_unit(&mut self, unit: &'a Unit) {
        walk_unit(self, unit);
    }

    fn visit_declaration(&mut self, decl: &'a Declaration) {
        walk_declaration(self, decl);
    }

    fn visit_class_decl(&mut self, decl: &'a ClassDecl) {
        walk_class_decl(self, decl);
    }

    fn visit_field_decl(&mut self, decl: &'a FieldDecl) {
        walk_field_decl(self, decl);
    }

    fn visit_method_decl(&mut self, decl: &'a MethodDecl) {
        walk_method_decl(self, decl);
    }

    fn visit_global_decl(&mut self, decl: &'a GlobalDecl) {
        walk_global_decl(self, decl);
    }

    fn visit_path(&mut self, _path: &'a Path) {}

    fn visit_expr(&mut self, expr: &'a Expression) {
        walk_expr(self, expr);
    }
}

pub fn walk_unit<'a>(vis: &mut impl Visitor<'a>, unit: &'a Unit) {
    for decl in &unit.declarations {
        vis.visit_declaration(decl);
    }
}

pub fn walk_declaration<'a>(vis: &mut impl Visitor<'a>, decl: &'a Declaration) {
    match decl {
        Declaration::Class(c) => vis.visit_class_decl(c),
        Declaration::Method(m) => vis.visit_method_decl(m),
        Declaration::Global(g) => vis.visit_global_decl(g),
    }
}

pub fn walk_class_decl<'a>(vis: &mut impl Visitor<'a>, decl: &'a ClassDecl) {
    if let Some(super_class) = &decl.super_class {
        vis.visit_path(super_class);
    }
    for iface in &decl.interfaces {
        vis.visit_path(iface);
    }
    for field in &decl.fields {
        vis.visit_field_decl(field);
    }
    for method in &decl.methods {
        vis.visit_method_decl(method);
    }
}

pub fn walk_field_decl<'a>(vis: &mut impl Visitor<'a>, decl: &'a FieldDecl) {
    if let Some(ty) = &decl.ty {
        vis.visit_path(ty);
    }
    if let Some(default) = &decl.default {
        vis.visit_expr(default);
    }
}

pub fn walk_method_decl<'a>(vis: &mut impl Visitor<'a>, decl: &'a MethodDecl) {
    for param in &decl.parameters {
        if let Some(ty) = &param.ty {
            vis.visit_path(ty);
        }
        if let Some(default) = &param.default {
            vis.visit_expr(default);
        }
    }
    if let Some(ty) = &decl.return_type {
        vis.visit_path(ty);
    }
    if let Some(body) = &decl.body {
        vis.visit_expr(body);
    }
}

pub fn walk_global_decl<'a>(vis: &mut impl Visitor<'a>, decl: &'a GlobalDecl) {
    if let Some(ty) = &decl.ty {
        vis.visit_path(ty);
    }
    if let Some(init) = &decl.initializer {
        vis.visit_expr(init);
    }
}

pub fn walk_expr<'a>(vis: &mut impl Visitor<'a>, expr: &'a Expression) {
    match expr.kind.as_ref() {
        ExpressionKind::Error
        | ExpressionKind::Nop
        | ExpressionKind::IntLiteral(_)
        | ExpressionKind::FloatLiteral(_)
        | ExpressionKind::BoolLiteral(_)
        | ExpressionKind::StringLiteral(_)
        | ExpressionKind::NullLiteral
        | ExpressionKind::This
        | ExpressionKind::Super
        | ExpressionKind::It
        | ExpressionKind::Continue => {}
        ExpressionKind::StringInterpolation(parts) => {
            for part in parts {
                if let Some(e) = &part.expr {
                    vis.visit_expr(e);
                }
            }
        }
        ExpressionKind::Identifier(path) => vis.visit_path(path),
        ExpressionKind::Block(stmts) => {
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
        ExpressionKind::For {
            init,
            condition,
            update,
            body,
        } => {
            if let Some(e) = init {
                vis.visit_expr(e);
            }
            if let Some(e) = condition {
                vis.visit_expr(e);
            }
            if let Some(e) = update {
                vis.visit_expr(e);
            }
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
        ExpressionKind::Not(e) | ExpressionKind::Code(e) | ExpressionKind::Assert(e) => {
            vis.visit_expr(e);
        }
        ExpressionKind::Return(e) | ExpressionKind::Break(e) => {
            if let Some(e) = e {
                vis.visit_expr(e);
            }
        }
        ExpressionKind::Dot { receiver, .. } => vis.visit_expr(receiver),
        ExpressionKind::Index { receiver, index } => {
            vis.visit_expr(receiver);
            vis.visit_expr(index);
        }
        ExpressionKind::Call { target, args } => {
            vis.visit_expr(target);
            for arg in args {
                vis.visit_expr(&arg.value);
            }
        }
        ExpressionKind::SuperCall { args } => {
            for arg in args {
                vis.visit_expr(&arg.value);
            }
        }
        ExpressionKind::Assignment { lhs, rhs, .. } => {
            vis.visit_expr(lhs);
            vis.visit_expr(rhs);
        }
        ExpressionKind::PostfixIncrement { lhs, .. } => vis.visit_expr(lhs),
        ExpressionKind::Lambda { parameters, body } => {
            for param in parameters {
                if let Some(ty) = &param.ty {
                    vis.visit_path(ty);
                }
            }
            vis.visit_expr(body);
        }
        ExpressionKind::Typecheck { expr, ty, .. } => {
            vis.visit_expr(expr);
            vis.visit_path(ty);
        }
        ExpressionKind::LspSelection(e) => vis.visit_expr(e),
    }
}
