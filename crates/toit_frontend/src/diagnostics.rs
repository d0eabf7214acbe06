// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Diagnostics bus: a typed error/warning/note sink with grouping and
//! severity gating by package provenance.

use std::fmt::Write as _;
use toit_data_structures::span::Span;
use toit_project::package::PackageId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub range: Option<Span>,
    pub package: PackageId,
}

/// Policy knobs the orchestrator threads through: `werror` promotes
/// warnings to errors, `show_package_warnings` controls whether warnings
/// from non-entry packages are dropped.
#[derive(Clone, Copy, Debug)]
pub struct Policy {
    pub werror: bool,
    pub show_package_warnings: bool,
    pub entry_package: PackageId,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            werror: false,
            show_package_warnings: false,
            entry_package: PackageId::ENTRY,
        }
    }
}

/// Implemented by the three diagnostics sinks: compilation (colorized
/// stderr), analysis/LSP (structured records), and null (swallow
/// everything, used for the debug-compilation path since the main
/// compilation already reported issues).
pub trait Sink {
    fn emit(&mut self, diagnostics: &[Diagnostic]);
}

pub struct DiagnosticsBus<S: Sink> {
    sink: S,
    policy: Policy,
    group: Option<Vec<Diagnostic>>,
    encountered_error: bool,
    encountered_warning: bool,
}

impl<S: Sink> DiagnosticsBus<S> {
    pub fn new(sink: S, policy: Policy) -> Self {
        Self {
            sink,
            policy,
            group: None,
            encountered_error: false,
            encountered_warning: false,
        }
    }

    #[must_use]
    pub fn encountered_error(&self) -> bool {
        self.encountered_error
    }

    #[must_use]
    pub fn encountered_warning(&self) -> bool {
        self.encountered_warning
    }

    pub fn start_group(&mut self) {
        debug_assert!(self.group.is_none(), "diagnostic groups do not nest");
        self.group = Some(Vec::new());
    }

    pub fn end_group(&mut self) {
        let Some(group) = self.group.take() else {
            return;
        };
        self.flush_group(group);
    }

    pub fn report_error(&mut self, range: Option<Span>, message: impl Into<String>) {
        self.report(Severity::Error, range, message.into(), self.policy.entry_package);
    }

    pub fn report_error_in(&mut self, package: PackageId, range: Option<Span>, message: impl Into<String>) {
        self.report(Severity::Error, range, message.into(), package);
    }

    pub fn report_warning(&mut self, range: Option<Span>, message: impl Into<String>) {
        self.report(Severity::Warning, range, message.into(), self.policy.entry_package);
    }

    pub fn report_warning_in(&mut self, package: PackageId, range: Option<Span>, message: impl Into<String>) {
        self.report(Severity::Warning, range, message.into(), package);
    }

    pub fn report_note(&mut self, range: Option<Span>, message: impl Into<String>) {
        self.report(Severity::Note, range, message.into(), self.policy.entry_package);
    }

    fn report(&mut self, mut severity: Severity, range: Option<Span>, message: String, package: PackageId) {
        if self.policy.werror && severity == Severity::Warning {
            severity = Severity::Error;
        }

        let diagnostic = Diagnostic {
            severity,
            message,
            range,
            package,
        };

        match &mut self.group {
            Some(group) => group.push(diagnostic),
            None => self.flush_group(vec![diagnostic]),
        }
    }

    fn flush_group(&mut self, group: Vec<Diagnostic>) {
        if group.is_empty() {
            return;
        }

        let first = &group[0];
        let is_warning_group = group.iter().all(|d| d.severity != Severity::Error);
        let should_drop = is_warning_group
            && !self.policy.show_package_warnings
            && first.package != self.policy.entry_package;

        for diagnostic in &group {
            match diagnostic.severity {
                Severity::Error => self.encountered_error = true,
                Severity::Warning => self.encountered_warning = true,
                Severity::Note => {}
            }
        }

        if should_drop {
            return;
        }

        self.sink.emit(&group);
    }
}

/// Colorized stderr with caret underlining spanning the range.
pub struct CompilationSink;

impl Sink for CompilationSink {
    fn emit(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let tag = match diagnostic.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            };
            let mut line = format!("{tag}: {}", diagnostic.message);
            if let Some(range) = diagnostic.range {
                let _ = write!(line, " ({range})");
            }
            eprintln!("{line}");
        }
    }
}

/// Structured records forwarded to the LSP protocol.
#[derive(Default)]
pub struct AnalysisSink {
    pub collected: Vec<Diagnostic>,
}

impl Sink for AnalysisSink {
    fn emit(&mut self, diagnostics: &[Diagnostic]) {
        self.collected.extend_from_slice(diagnostics);
    }
}

/// Swallows everything; used for the debug-compilation path where the main
/// compilation already reported issues.
#[derive(Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn emit(&mut self, _diagnostics: &[Diagnostic]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_with_only_warnings_outside_entry_package_is_dropped() {
        let mut bus = DiagnosticsBus::new(
            AnalysisSink::default(),
            Policy {
                werror: false,
                show_package_warnings: false,
                entry_package: PackageId::ENTRY,
            },
        );
        bus.start_group();
        bus.report_warning_in(PackageId::SDK, None, "deprecated");
        bus.end_group();
        assert!(bus.encountered_warning());
        assert!(bus.sink.collected.is_empty());
    }

    #[test]
    fn werror_promotes_warnings_to_errors() {
        let mut bus = DiagnosticsBus::new(
            AnalysisSink::default(),
            Policy {
                werror: true,
                show_package_warnings: true,
                entry_package: PackageId::ENTRY,
            },
        );
        bus.report_warning(None, "careful");
        assert!(bus.encountered_error());
        assert!(!bus.encountered_warning());
    }
}
