// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The concrete tree the core consumes. Lexing and parsing are external
//! collaborators: this module only describes the
//! shape of their output — `Unit`, `Declaration`, `Expression` — that the
//! resolution pipeline walks.

use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    rc::Rc,
};
use toit_data_structures::span::Span;

/// The unique identifier for an AST node, assigned by an external assigner
/// pass before the node reaches the core pipeline.
#[derive(Clone, Copy, Debug)]
pub struct NodeId(u32);

impl NodeId {
    const DEFAULT_VALUE: u32 = u32::MAX;
    pub const FIRST: Self = Self(0);

    #[must_use]
    pub fn successor(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub fn is_default(self) -> bool {
        self.0 == Self::DEFAULT_VALUE
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self(Self::DEFAULT_VALUE)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_default() {
            f.write_str("_id_")
        } else {
            Display::fmt(&self.0, f)
        }
    }
}

impl From<NodeId> for usize {
    fn from(value: NodeId) -> Self {
        assert!(!value.is_default(), "default node ID should be replaced");
        value.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        Self(u32::try_from(value).expect("node id should fit in u32"))
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for NodeId {}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Identifies a source unit within a compilation (stable across stages).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnitId(u32);

impl UnitId {
    /// The entry unit is always index 0; the core library is always index 1
    /// regardless of the entry package.
    pub const ENTRY: Self = Self(0);
    pub const CORE: Self = Self(1);

    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }
}

impl From<UnitId> for usize {
    fn from(value: UnitId) -> Self {
        value.0 as usize
    }
}

impl From<usize> for UnitId {
    fn from(value: usize) -> Self {
        Self(u32::try_from(value).expect("unit id should fit in u32"))
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A single identifier occurrence with its own span and node id.
#[derive(Clone, Debug)]
pub struct Ident {
    pub id: NodeId,
    pub span: Span,
    pub name: Rc<str>,
}

/// A dotted or bare reference, e.g. `foo`, `prefix.Foo`.
#[derive(Clone, Debug)]
pub struct Path {
    pub id: NodeId,
    pub span: Span,
    pub segments: Vec<Ident>,
}

impl Path {
    #[must_use]
    pub fn last(&self) -> &Ident {
        self.segments.last().expect("path should have a segment")
    }
}

/// A whole compilation unit: one parsed source file.
#[derive(Clone, Debug)]
pub struct Unit {
    pub id: UnitId,
    pub source_path: Rc<str>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub declarations: Vec<Declaration>,
    pub toitdoc: Option<Rc<str>>,
    /// Set when this unit is a synthesized placeholder for a failed import;
    /// downstream phases must not double-report on it.
    pub is_error_unit: bool,
}

/// An `import` statement, not yet resolved to a concrete unit.
#[derive(Clone, Debug)]
pub struct Import {
    pub id: NodeId,
    pub span: Span,
    /// Dotted segments, e.g. `["foo", "bar"]` for `import foo.bar`.
    pub segments: Vec<Ident>,
    pub prefix: Option<Ident>,
    pub show_identifiers: Vec<Ident>,
    pub show_all: bool,
    /// Number of leading `..` path segments consumed for a relative import.
    pub dot_outs: u32,
    pub is_relative: bool,
    /// Filled in by the unit loader once the target is located.
    pub resolved_unit: Option<UnitId>,
}

/// An `export` statement.
#[derive(Clone, Debug)]
pub struct Export {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExportKind,
}

#[derive(Clone, Debug)]
pub enum ExportKind {
    Name(Ident),
    All,
}

#[derive(Clone, Debug)]
pub enum Declaration {
    Class(ClassDecl),
    Method(MethodDecl),
    Global(GlobalDecl),
}

impl Declaration {
    #[must_use]
    pub fn name(&self) -> &Ident {
        match self {
            Declaration::Class(c) => &c.name,
            Declaration::Method(m) => &m.name,
            Declaration::Global(g) => &g.name,
        }
    }

    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Declaration::Class(c) => c.span,
            Declaration::Method(m) => m.span,
            Declaration::Global(g) => g.span,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassShape {
    Class,
    Interface,
    Monitor,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub shape: ClassShape,
    pub is_abstract: bool,
    pub super_class: Option<Path>,
    pub interfaces: Vec<Path>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub ty: Option<Path>,
    pub is_final: bool,
    pub default: Option<Expression>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MethodKind {
    Constructor,
    Factory,
    Instance,
    Static,
    Global,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub id: NodeId,
    pub span: Span,
    /// `None` for unnamed constructors/factories.
    pub name: Ident,
    pub kind: MethodKind,
    pub is_abstract: bool,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<Path>,
    pub body: Option<Expression>,
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Debug)]
pub struct GlobalDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub ty: Option<Path>,
    pub initializer: Option<Expression>,
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterKind {
    Positional,
    Named,
    Block,
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub id: NodeId,
    pub span: Span,
    pub name: Ident,
    pub kind: ParameterKind,
    pub ty: Option<Path>,
    /// True for `this.field` constructor/instance-method field-storing
    /// parameters.
    pub is_field_storing: bool,
    pub default: Option<Expression>,
    pub is_optional: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssignOp {
    Eq,
    Define,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Option<Ident>,
    pub value: Expression,
}

#[derive(Clone, Debug)]
pub struct StringPart {
    pub literal: Rc<str>,
    pub expr: Option<Expression>,
    pub format: Option<Rc<str>>,
}

#[derive(Clone, Debug)]
pub struct Expression {
    pub id: NodeId,
    pub span: Span,
    pub kind: Box<ExpressionKind>,
}

#[derive(Clone, Debug)]
pub enum ExpressionKind {
    Error,
    Nop,
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(Rc<str>),
    StringInterpolation(Vec<StringPart>),
    NullLiteral,
    This,
    Super,
    It,
    Identifier(Path),
    Block(Vec<Expression>),
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
    },
    For {
        init: Option<Box<Expression>>,
        condition: Option<Box<Expression>>,
        update: Option<Box<Expression>>,
        body: Box<Expression>,
    },
    TryFinally {
        body: Box<Expression>,
        finally: Box<Expression>,
    },
    LogicalBinary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    Return(Option<Box<Expression>>),
    Break(Option<Box<Expression>>),
    Continue,
    Dot {
        receiver: Box<Expression>,
        name: Ident,
    },
    Index {
        receiver: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        target: Box<Expression>,
        args: Vec<Argument>,
    },
    SuperCall {
        args: Vec<Argument>,
    },
    Assignment {
        op: AssignOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    PostfixIncrement {
        lhs: Box<Expression>,
        is_increment: bool,
    },
    Lambda {
        parameters: Vec<Parameter>,
        body: Box<Expression>,
    },
    Code(Box<Expression>),
    Typecheck {
        expr: Box<Expression>,
        ty: Path,
        is_as: bool,
    },
    Assert(Box<Expression>),
    /// The node flagged by the external parser as the LSP selection point:
    /// the line/column of an LSP request landed here.
    LspSelection(Box<Expression>),
}

impl Expression {
    #[must_use]
    pub fn error(span: Span) -> Self {
        Self {
            id: NodeId::default(),
            span,
            kind: Box::new(ExpressionKind::Error),
        }
    }
}
