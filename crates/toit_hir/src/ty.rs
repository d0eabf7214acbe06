// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The nominal type lattice and the call/resolution shape machinery used
//! by the method resolver and abstract conformance checker to
//! decide whether a candidate accepts a given call site.

use crate::hir::ClassId;
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TyKind {
    /// Accepts and produces anything; the universal supertype.
    Any,
    /// Can never be read; the universal subtype.
    None,
    Class(ClassId),
}

/// `none ⊑ T ⊑ any`; `class(C) ⊑ class(D)` iff `D` is in the transitive
/// super/interface closure of `C`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Type {
    pub kind: TyKind,
    pub nullable: bool,
}

impl Type {
    #[must_use]
    pub fn any() -> Self {
        Self {
            kind: TyKind::Any,
            nullable: true,
        }
    }

    #[must_use]
    pub fn none() -> Self {
        Self {
            kind: TyKind::None,
            nullable: false,
        }
    }

    #[must_use]
    pub fn class(id: ClassId, nullable: bool) -> Self {
        Self {
            kind: TyKind::Class(id),
            nullable,
        }
    }

    #[must_use]
    pub fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Is `self` a subtype of `expected`, given a closure function that
    /// answers "is `sub` in the transitive super/interface closure of
    /// `sup`". The closure is supplied by the caller (typically the class
    /// table built during class-skeleton building) rather than owned by
    /// `Type` itself, since `Type`
    /// has no access to the class graph.
    #[must_use]
    pub fn is_assignable_to(
        self,
        expected: Type,
        is_subclass_or_interface: impl Fn(ClassId, ClassId) -> bool,
    ) -> bool {
        if matches!(expected.kind, TyKind::Any) {
            return true;
        }
        if matches!(self.kind, TyKind::None) {
            // `none` (unreachable code / the bottom type) is assignable to everything.
            return true;
        }
        if self.nullable && !expected.nullable {
            // The `null` literal type is always nullable; only an explicitly
            // nullable expected type accepts it.
            if !matches!(self.kind, TyKind::Any) {
                return false;
            }
        }
        match (self.kind, expected.kind) {
            (TyKind::Any, _) => matches!(expected.kind, TyKind::Any),
            (_, TyKind::None) => matches!(self.kind, TyKind::None),
            (TyKind::Class(sub), TyKind::Class(sup)) => {
                sub == sup || is_subclass_or_interface(sub, sup)
            }
            (TyKind::None, _) => true,
            _ => false,
        }
    }
}

impl Display for TyKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TyKind::Any => write!(f, "any"),
            TyKind::None => write!(f, "none"),
            TyKind::Class(id) => write!(f, "class#{}", usize::from(*id)),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// The argument shape of one concrete call site: how many positional
/// arguments, which named arguments, and which argument positions are block
/// arguments.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CallShape {
    pub arity: usize,
    pub named_arg_names: Vec<String>,
    pub block_positions: Vec<usize>,
}

/// The full declared parameter signature of a candidate method, including
/// optional-parameter ranges and whether an implicit `this` receiver is
/// consumed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolutionShape {
    pub min_positional: usize,
    pub max_positional: usize,
    pub named_params: Vec<(String, bool)>, // (name, required)
    pub block_positions: Vec<usize>,
    pub has_implicit_this: bool,
}

impl ResolutionShape {
    /// Is there a valid argument mapping from `call` onto this signature?
    #[must_use]
    pub fn accepts(&self, call: &CallShape) -> bool {
        if call.arity < self.min_positional || call.arity > self.max_positional {
            return false;
        }
        if call.block_positions != self.block_positions {
            // Block arguments must land exactly where declared; a mismatch
            // means a different overload (or none) should be picked.
            if !self.block_positions.is_empty() || !call.block_positions.is_empty() {
                return false;
            }
        }
        for name in &call.named_arg_names {
            if !self.named_params.iter().any(|(n, _)| n == name) {
                return false;
            }
        }
        for (name, required) in &self.named_params {
            if *required && !call.named_arg_names.iter().any(|n| n == name) {
                return false;
            }
        }
        true
    }

    /// A missing-selector's shape `missing` is "fully shadowed" by the union
    /// of `candidates`' shapes if every valid `missing` call shape is also
    /// accepted by at least one candidate — used by the abstract
    /// conformance checker to distinguish a
    /// wholly-unimplemented abstract from one only partially covered by
    /// optional-argument overloads.
    #[must_use]
    pub fn is_fully_shadowed_by(candidates: &[ResolutionShape], missing: &ResolutionShape) -> bool {
        if candidates.is_empty() {
            return false;
        }
        for arity in missing.min_positional..=missing.max_positional {
            let call = CallShape {
                arity,
                named_arg_names: missing.named_params.iter().map(|(n, _)| n.clone()).collect(),
                block_positions: missing.block_positions.clone(),
            };
            if !candidates.iter().any(|c| c.accepts(&call)) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_shape_accepted_within_optional_range() {
        let shape = ResolutionShape {
            min_positional: 1,
            max_positional: 3,
            named_params: vec![],
            block_positions: vec![],
            has_implicit_this: false,
        };
        assert!(shape.accepts(&CallShape {
            arity: 2,
            named_arg_names: vec![],
            block_positions: vec![],
        }));
        assert!(!shape.accepts(&CallShape {
            arity: 4,
            named_arg_names: vec![],
            block_positions: vec![],
        }));
    }

    #[test]
    fn fully_shadowed_requires_every_arity_covered() {
        let missing = ResolutionShape {
            min_positional: 0,
            max_positional: 1,
            named_params: vec![],
            block_positions: vec![],
            has_implicit_this: true,
        };
        let covers_both = ResolutionShape {
            min_positional: 0,
            max_positional: 1,
            named_params: vec![],
            block_positions: vec![],
            has_implicit_this: true,
        };
        assert!(ResolutionShape::is_fully_shadowed_by(
            &[covers_both],
            &missing
        ));

        let covers_only_one = ResolutionShape {
            min_positional: 1,
            max_positional: 1,
            named_params: vec![],
            block_positions: vec![],
            has_implicit_this: true,
        };
        assert!(!ResolutionShape::is_fully_shadowed_by(
            &[covers_only_one],
            &missing
        ));
    }
}
