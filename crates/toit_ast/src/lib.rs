// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The tree produced by the (external) scanner/parser: `Unit`, `Import`,
//! `Export`, `Declaration`, `Expression`. The core pipeline only consumes
//! this tree; it never produces it.

pub mod ast;
pub mod visit;
