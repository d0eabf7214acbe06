// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! `ResolutionEntry` and the `Scope` family.

use rustc_hash::FxHashMap;
use std::rc::Rc;
use toit_hir::hir::{ClassId, GlobalId, LocalId, MethodId};

/// A name bound in some scope, resolved to zero, one, or many nodes.
#[derive(Clone, Debug)]
pub enum Node {
    Class(ClassId),
    Method(MethodId),
    Global(GlobalId),
    Local(LocalId),
}

/// A tagged union over what a name lookup can find.
#[derive(Clone, Debug)]
pub enum ResolutionEntry {
    Nodes(Vec<Node>),
    Prefix(Rc<PrefixScope>),
    Ambiguous(Vec<Node>),
    Empty,
}

impl ResolutionEntry {
    #[must_use]
    pub fn is_class(&self) -> bool {
        matches!(self, ResolutionEntry::Nodes(nodes) if nodes.len() == 1 && matches!(nodes[0], Node::Class(_)))
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self, ResolutionEntry::Nodes(nodes) if nodes.len() == 1)
    }

    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(self, ResolutionEntry::Prefix(_))
    }
}

/// The target of a named import prefix (`import foo.bar as prefix`): a
/// nested namespace of exported identifiers from the imported module.
#[derive(Clone, Debug, Default)]
pub struct PrefixScope {
    pub entries: FxHashMap<String, ResolutionEntry>,
}

/// A lookup result also reports how many lexical blocks were crossed, used
/// by the definite-assignment analyzer to decide whether a loop variable
/// was captured from an enclosing scope.
#[derive(Clone, Debug)]
pub struct Lookup {
    pub entry: ResolutionEntry,
    pub block_depth: u32,
}

/// The sentinel interleaved in a `ClassScope`'s overload lists to delimit
/// methods of `C` from inherited methods of `super(C)`; `super` calls skip
/// past it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SuperClassSeparator;

#[derive(Clone, Debug)]
pub enum OverloadEntry {
    Method(MethodId),
    SuperSeparator,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleScope {
    pub entries: FxHashMap<String, ResolutionEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct ClassScope {
    /// Overload lists per member name; inherited overloads from `super`
    /// follow a `SuperSeparator` tombstone.
    pub members: FxHashMap<String, Vec<OverloadEntry>>,
}

impl ClassScope {
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&[OverloadEntry]> {
        self.members.get(name).map(Vec::as_slice)
    }

    /// The overloads visible to a `super.foo(...)` call: those strictly
    /// after the first `SuperSeparator`.
    #[must_use]
    pub fn super_overloads(&self, name: &str) -> Vec<MethodId> {
        let Some(overloads) = self.members.get(name) else {
            return vec![];
        };
        overloads
            .iter()
            .skip_while(|entry| !matches!(entry, OverloadEntry::SuperSeparator))
            .skip(1)
            .filter_map(|entry| match entry {
                OverloadEntry::Method(id) => Some(*id),
                OverloadEntry::SuperSeparator => None,
            })
            .collect()
    }

    /// Overloads declared directly on this class, before any separator.
    #[must_use]
    pub fn own_overloads(&self, name: &str) -> Vec<MethodId> {
        let Some(overloads) = self.members.get(name) else {
            return vec![];
        };
        overloads
            .iter()
            .take_while(|entry| !matches!(entry, OverloadEntry::SuperSeparator))
            .filter_map(|entry| match entry {
                OverloadEntry::Method(id) => Some(*id),
                OverloadEntry::SuperSeparator => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct LocalScope {
    pub bindings: FxHashMap<String, LocalId>,
}

#[derive(Clone, Debug, Default)]
pub struct LambdaScope {
    pub captures: FxHashMap<String, LocalId>,
    pub depth: u32,
}

#[derive(Clone, Debug, Default)]
pub struct BlockScope {
    pub bindings: FxHashMap<String, LocalId>,
}

/// Scope providing the implicit `it` parameter of a single-argument block
/// literal that declares no explicit parameters.
#[derive(Clone, Copy, Debug)]
pub struct ItScope {
    pub it: LocalId,
}

/// A stack of lexical scopes, polymorphic over the variants above. The
/// method resolver pushes/pops these as it walks a method body; they
/// are stack-allocated and pop with lexical nesting.
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    pub module: ModuleScope,
    pub class: Option<Rc<ClassScope>>,
    frames: Vec<Frame>,
}

#[derive(Clone, Debug)]
enum Frame {
    Local(LocalScope),
    Lambda(LambdaScope),
    Block(BlockScope),
    It(ItScope),
}

impl ScopeStack {
    pub fn push_local(&mut self) {
        self.frames.push(Frame::Local(LocalScope::default()));
    }

    pub fn push_block(&mut self) {
        self.frames.push(Frame::Block(BlockScope::default()));
    }

    pub fn push_lambda(&mut self, depth: u32) {
        self.frames.push(Frame::Lambda(LambdaScope {
            captures: FxHashMap::default(),
            depth,
        }));
    }

    pub fn push_it(&mut self, it: LocalId) {
        self.frames.push(Frame::It(ItScope { it }));
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn bind(&mut self, name: String, id: LocalId) {
        match self.frames.last_mut() {
            Some(Frame::Local(scope)) => {
                scope.bindings.insert(name, id);
            }
            Some(Frame::Block(scope)) => {
                scope.bindings.insert(name, id);
            }
            _ => {}
        }
    }

    /// Looks up `name`, reporting how many block-scope frames were crossed
    /// on the way to the binding.
    #[must_use]
    pub fn lookup_local(&self, name: &str) -> Option<Lookup> {
        let mut block_depth = 0;
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Local(scope) => {
                    if let Some(id) = scope.bindings.get(name) {
                        return Some(Lookup {
                            entry: ResolutionEntry::Nodes(vec![Node::Local(*id)]),
                            block_depth,
                        });
                    }
                }
                Frame::Block(scope) => {
                    if let Some(id) = scope.bindings.get(name) {
                        return Some(Lookup {
                            entry: ResolutionEntry::Nodes(vec![Node::Local(*id)]),
                            block_depth,
                        });
                    }
                    block_depth += 1;
                }
                Frame::Lambda(scope) => {
                    if let Some(id) = scope.captures.get(name) {
                        return Some(Lookup {
                            entry: ResolutionEntry::Nodes(vec![Node::Local(*id)]),
                            block_depth,
                        });
                    }
                }
                Frame::It(scope) => {
                    if name == "it" {
                        return Some(Lookup {
                            entry: ResolutionEntry::Nodes(vec![Node::Local(scope.it)]),
                            block_depth,
                        });
                    }
                }
            }
        }
        None
    }
}
