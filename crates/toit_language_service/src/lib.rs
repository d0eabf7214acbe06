// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! The LSP dispatcher and the wire protocol it rides on: turning a
//! resolver-captured selection into completions or a goto-definition
//! answer, deriving semantic tokens and module summaries straight from a
//! resolved program, and the line-framed filesystem RPC/transport framing
//! the orchestrator's LSP mode speaks to its client.

pub mod dispatch;
pub mod protocol;
pub mod summary;
