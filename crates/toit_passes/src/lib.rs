// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Flow-sensitive checks that run once the whole program is resolved:
//! abstract/interface conformance and definite assignment / control-flow
//! analysis, each an `IR` visitor in its own module.

pub mod conformance;
pub mod definite_assignment;

use toit_frontend::diagnostics::{DiagnosticsBus, Sink};
use toit_hir::hir::Program;

/// Runs every pass in this crate over `program`, in the order the
/// orchestrator's pipeline calls for (conformance before definite
/// assignment — a class still missing an override shouldn't also be
/// double-diagnosed for the synthetic abstract body it doesn't have).
pub fn check_program<S: Sink>(program: &Program, diagnostics: &mut DiagnosticsBus<S>) {
    conformance::check_abstract_conformance(program, diagnostics);
    definite_assignment::check_definite_assignment(program, diagnostics);
    definite_assignment::check_constructor_field_initialization(program, diagnostics);
}
