// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The typed intermediate representation produced by the skeleton-building
//! and body-resolution passes and consumed by
//! every later stage. IR nodes are owned by the program arena (`Program`)
//! and addressed by small index handles rather than pointers.

use crate::ty::{ResolutionShape, Type};
use indenter::{indented, Format, Indented};
use std::fmt::{self, Display, Formatter, Write};
use std::rc::Rc;
use toit_data_structures::{index_map::IndexMap, span::Span};

fn set_indentation<'a, 'b>(
    indent: Indented<'a, Formatter<'b>>,
    level: usize,
) -> Indented<'a, Formatter<'b>> {
    indent.with_format(Format::Custom {
        inserter: Box::new(move |_, f| {
            for _ in 0..level {
                write!(f, "    ")?;
            }
            Ok(())
        }),
    })
}

macro_rules! index_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $name(u32);

        impl $name {
            #[must_use]
            pub fn new(value: u32) -> Self {
                Self(value)
            }

            #[must_use]
            pub fn successor(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0 as usize
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(u32::try_from(value).expect("id should fit in u32"))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }
    };
}

index_id!(ClassId);
index_id!(MethodId);
index_id!(FieldId);
index_id!(GlobalId);
index_id!(LocalId);
index_id!(ModuleId);

/// The two built-in roots every class ultimately descends from: classes
/// default to `Object`, interfaces to `Interface_`.
pub const OBJECT_CLASS: ClassId = ClassId(0);
pub const INTERFACE_CLASS: ClassId = ClassId(1);
pub const MONITOR_CLASS: ClassId = ClassId(2);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassShape {
    Class,
    Interface,
    Monitor,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub span: Span,
    pub ty: Type,
    pub is_final: bool,
    /// Dense within `[super.total_field_count, self.total_field_count)`;
    /// assigned by the orchestrator's `assign_field_indexes` stage, `None`
    /// until then.
    pub resolved_index: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub span: Span,
    pub shape: ClassShape,
    pub is_abstract: bool,
    /// `None` only for the two roots (`Object`, `Interface_`); every other
    /// class has a default or explicit super.
    pub super_class: Option<ClassId>,
    /// Transitive closure of declared `implements` plus interfaces
    /// inherited via `super`.
    pub interfaces: Vec<ClassId>,
    pub fields: Vec<Field>,
    pub methods: Vec<MethodId>,
    pub total_field_count: u32,
    /// A leading `Deprecated.`/`Deprecated:` toitdoc paragraph, if any.
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MethodKind {
    Constructor,
    Factory,
    Instance,
    MonitorMethod,
    Global,
    FieldStub { field: FieldId, is_setter: bool },
    AdapterStub,
    IsInterfaceStub,
}

#[derive(Clone, Debug)]
pub struct Parameter {
    pub id: LocalId,
    pub name: String,
    pub span: Span,
    pub ty: Type,
    pub is_block: bool,
    pub is_optional: bool,
    pub default: Option<Expression>,
}

#[derive(Clone, Debug)]
pub struct Method {
    pub id: MethodId,
    pub name: String,
    pub span: Span,
    pub owner: Option<ClassId>,
    pub kind: MethodKind,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    /// `None` for abstract/interface/external methods.
    pub body: Option<Expression>,
    pub is_abstract: bool,
    pub resolution_shape: ResolutionShape,
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Debug)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub span: Span,
    pub ty: Type,
    pub initializer: Option<Expression>,
    /// Dense in `[0, #globals)`, assigned last by the orchestrator's final
    /// id-assignment stage.
    pub resolved_id: Option<u32>,
    pub is_eager: bool,
    pub toitdoc: Option<Rc<str>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    Static,
    Virtual,
    Constructor,
    Block,
    Builtin,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssignmentKind {
    Local,
    Global,
    Define,
}

#[derive(Clone, Debug)]
pub struct Argument {
    pub value: Expression,
}

#[derive(Clone, Debug)]
pub struct StringPart {
    pub literal: String,
    pub expr: Option<Expression>,
}

/// Which runtime entry point a lowered interpolation calls: plain
/// concatenation has no format specifiers to apply, so it can skip the
/// formatting machinery `interpolate_strings_` carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuntimeHelper {
    InterpolateStrings,
    SimpleInterpolateStrings,
}

#[derive(Clone, Debug)]
pub struct Expression {
    pub span: Span,
    pub ty: Type,
    pub kind: Box<ExpressionKind>,
}

impl Expression {
    #[must_use]
    pub fn new(span: Span, ty: Type, kind: ExpressionKind) -> Self {
        Self {
            span,
            ty,
            kind: Box::new(kind),
        }
    }

    #[must_use]
    pub fn error(span: Span) -> Self {
        Self::new(span, Type::none(), ExpressionKind::Error(vec![]))
    }
}

#[derive(Clone, Debug)]
pub enum ExpressionKind {
    Nop,
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    StringInterpolation(RuntimeHelper, Vec<StringPart>),
    NullLiteral,
    Local(LocalId),
    Parameter(LocalId),
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
    TryFinally {
        body: Box<Expression>,
        finally: Box<Expression>,
    },
    LogicalBinary {
        op: LogicalOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    Return(Option<Box<Expression>>),
    /// `break`/`continue`, carrying the loop-relative depth to unwind.
    LoopBranch {
        is_break: bool,
        depth: u32,
    },
    Sequence(Vec<Expression>),
    /// A lazily-evaluated code block, e.g. the `_assert`/`_finally` block
    /// argument form.
    Code(Box<Expression>),
    Lambda {
        parameters: Vec<Parameter>,
        body: Box<Expression>,
        captures: Vec<LocalId>,
    },
    FieldLoad {
        receiver: Box<Expression>,
        field: FieldId,
    },
    FieldStore {
        receiver: Box<Expression>,
        field: FieldId,
        value: Box<Expression>,
    },
    Dot {
        receiver: Box<Expression>,
        method: MethodId,
    },
    /// The same shape as `Dot`, but flagged as the LSP selection point:
    /// the resolver invokes the selection handler here instead of (or in
    /// addition to) producing ordinary IR.
    LspSelectionDot {
        receiver: Box<Expression>,
        method: MethodId,
    },
    Super(Box<Expression>),
    ReferenceLocal(LocalId),
    ReferenceMethod(MethodId),
    ReferenceGlobal(GlobalId),
    ReferenceBlock(LocalId),
    ReferenceClass(ClassId),
    Call {
        kind: CallKind,
        target: Box<Expression>,
        args: Vec<Argument>,
    },
    Assignment {
        kind: AssignmentKind,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Typecheck {
        expr: Box<Expression>,
        ty: Type,
        /// `as` coerces (and may fail at runtime); a type guard without
        /// `as` merely narrows.
        is_as: bool,
    },
    PrimitiveInvocation {
        module: String,
        name: String,
        args: Vec<Argument>,
    },
    /// Wraps the nested expressions that could not be resolved so later
    /// stages can still walk them without cascading.
    Error(Vec<Expression>),
}

/// A module: one resolved `Unit` plus everything the module/scope builder
/// computed for it.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub id: ModuleId,
    pub classes: Vec<ClassId>,
    pub methods: Vec<MethodId>,
    pub globals: Vec<GlobalId>,
    pub imported_modules: Vec<ModuleId>,
    pub exported_identifiers: Vec<String>,
    pub export_all: bool,
}

/// The program arena: owns every IR node for the lifetime of the pipeline
/// run.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub classes: IndexMap<ClassId, Class>,
    pub methods: IndexMap<MethodId, Method>,
    pub globals: IndexMap<GlobalId, Global>,
    pub modules: IndexMap<ModuleId, Module>,
    /// Populated by `sort_classes`: a DFS-of-the-subclass-tree ordering
    /// where every class appears after its super.
    pub sorted_classes: Vec<ClassId>,
}

impl Program {
    #[must_use]
    pub fn is_sorted_by_inheritance(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for &id in &self.sorted_classes {
            let Some(class) = self.classes.get(id) else {
                return false;
            };
            if let Some(super_id) = class.super_class {
                if !seen.contains(&super_id) {
                    return false;
                }
            }
            seen.insert(id);
        }
        true
    }
}

impl Display for ClassShape {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ClassShape::Class => write!(f, "class"),
            ClassShape::Interface => write!(f, "interface"),
            ClassShape::Monitor => write!(f, "monitor"),
        }
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Class {} {} {}:", self.id, self.shape, self.name)?;
        let mut indent = set_indentation(indented(f), 1);
        for field in &self.fields {
            write!(indent, "\nField {} {}: {}", field.id, field.name, field.ty)?;
        }
        for method in &self.methods {
            write!(indent, "\nMethod {method}")?;
        }
        Ok(())
    }
}
