// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Small, dependency-light data structures shared by every stage of the
//! pipeline: source spans, an id-indexed sparse map, and the UTF-8/UTF-16
//! position bridge the LSP surface needs.

pub mod index_map;
pub mod line_column;
pub mod span;
