// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Monotonic id allocators for the IR. The method resolver uses
//! `LocalAssigner` per method body to hand out ids for parameters, declared
//! locals, and the synthetic temporaries introduced by compound-assignment
//! and string-interpolation lowering.

use crate::hir::{ClassId, FieldId, GlobalId, LocalId, MethodId};

#[derive(Debug, Default)]
pub struct LocalAssigner {
    next: u32,
}

impl LocalAssigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> LocalId {
        let id = LocalId::new(self.next);
        self.next += 1;
        id
    }
}

/// Allocates the program-wide ids for classes, methods, fields, and globals
/// created during class-skeleton and inheritance building.
#[derive(Debug, Default)]
pub struct ProgramAssigner {
    next_class: u32,
    next_method: u32,
    next_field: u32,
    next_global: u32,
}

impl ProgramAssigner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_class(&mut self) -> ClassId {
        let id = ClassId::new(self.next_class);
        self.next_class += 1;
        id
    }

    pub fn next_method(&mut self) -> MethodId {
        let id = MethodId::new(self.next_method);
        self.next_method += 1;
        id
    }

    pub fn next_field(&mut self) -> FieldId {
        let id = FieldId::new(self.next_field);
        self.next_field += 1;
        id
    }

    pub fn next_global(&mut self) -> GlobalId {
        let id = GlobalId::new(self.next_global);
        self.next_global += 1;
        id
    }
}
