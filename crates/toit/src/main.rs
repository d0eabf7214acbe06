// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

#![warn(clippy::mod_module_files, clippy::pedantic)]

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use toit::cli::Cli;
use toit::deps::render_dependency_file;
use toit::dual_compile::{self, DualCompileError};
use toit::pipeline::{self, Backend, PipelineOutcome, Resolved, SnapshotArtifact, SnapshotBundle};
use toit_ast::ast::{Declaration, Unit, UnitId};
use toit_frontend::diagnostics::{CompilationSink, DiagnosticsBus, NullSink, Policy};
use toit_frontend::importer::UnitParser;
use toit_frontend::method_resolver::ResolverOptions;
use toit_frontend::source_manager::SourceManager;
use toit_hir::hir::Program;
use toit_project::fs::{FileSystem, MemoryFs, StdFs};
use toit_project::package::PackageLock;

/// Synthetic absolute path a stdin entry (`-`) is loaded under, since the
/// importer always addresses units by path.
const STDIN_ENTRY_PATH: &str = "/dev/stdin/entry.toit";

/// Stand-in for the lexer/parser this crate never implements: concrete
/// syntax parsing is an explicit non-goal, so every unit is loaded as an
/// otherwise-empty declaration list. A real frontend plugs a `UnitParser`
/// implementation in here without touching anything downstream of import
/// loading.
struct PlaceholderParser;

impl UnitParser for PlaceholderParser {
    fn parse(&self, unit_id: UnitId, absolute_path: &str, _contents: &str) -> Unit {
        Unit {
            id: unit_id,
            source_path: absolute_path.into(),
            imports: Vec::new(),
            exports: Vec::new(),
            declarations: Vec::<Declaration>::new(),
            toitdoc: None,
            is_error_unit: false,
        }
    }
}

/// Codegen/optimization backend is an opaque non-goal; this stub produces
/// empty snapshots so the orchestrator's plumbing can be exercised end to
/// end without a real bytecode emitter.
struct NoopBackend;

impl Backend for NoopBackend {
    fn optimize(&self, _program: &mut Program) {}
    fn tree_shake(&self, _program: &mut Program) {}
    fn emit_snapshot(&self, _program: &Program, _is_debug: bool) -> SnapshotArtifact {
        SnapshotArtifact::default()
    }
}

/// Loads the entry source the way `qsc`'s own `main.rs` does: `-` reads
/// stdin, anything else is a path read straight off disk. Returns the
/// filesystem to resolve imports against plus the entry path to hand to
/// the importer.
fn read_source(path: &str) -> io::Result<(Box<dyn FileSystem>, String)> {
    if path == "-" {
        let mut contents = String::new();
        io::stdin().read_to_string(&mut contents)?;
        let mut memory = MemoryFs::new();
        memory.insert(STDIN_ENTRY_PATH, contents);
        Ok((Box::new(memory), STDIN_ENTRY_PATH.to_string()))
    } else {
        Ok((Box::new(StdFs), path.to_string()))
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.dual_compile_child {
        return run_dual_compile_child_leg(&cli);
    }

    let sdk_root = cli.sdk_root.clone().unwrap_or_else(|| PathBuf::from("/opt/toit-sdk"));
    let (fs, entry_path) = match read_source(&cli.entry) {
        Ok(loaded) => loaded,
        Err(err) => {
            log::error!("failed to read entry source {}: {err}", cli.entry);
            return ExitCode::FAILURE;
        }
    };
    let lock = match toit_project::load_package_lock(Path::new(&entry_path), cli.project_root.as_deref(), sdk_root.clone()) {
        Ok(lock) => lock,
        Err(err) => {
            log::error!("failed to load package manifest: {err}");
            return ExitCode::FAILURE;
        }
    };
    let parser = PlaceholderParser;
    let mut sources = SourceManager::new(cli.sdk_root.clone());

    let options = ResolverOptions {
        assertions_enabled: !cli.no_assertions,
        ..ResolverOptions::default()
    };

    if let Some(port) = cli.lsp_port {
        return run_lsp(fs.as_ref(), &parser, &lock, &mut sources, &entry_path, options, port);
    }

    let mut diagnostics = DiagnosticsBus::new(CompilationSink, Policy::default());
    let resolved = pipeline::resolve(fs.as_ref(), &parser, &lock, &mut sources, &mut diagnostics, &entry_path, None, options);
    pipeline::check_types_and_definite_assignment(&resolved.program, &mut diagnostics);

    if let Some(dep_file) = &cli.dep_file {
        let rendered = render_dependency_file(cli.dep_format.into(), &resolved.units);
        if let Err(err) = std::fs::write(dep_file, rendered) {
            log::error!("failed to write dependency file {}: {err}", dep_file.display());
        }
    }

    if cli.analysis_only {
        let outcome = PipelineOutcome::AnalysisResult { errors: diagnostics.encountered_error() };
        return ExitCode::from(u8::try_from(pipeline::exit_code_for(outcome)).unwrap_or(1));
    }

    if diagnostics.encountered_error() && !cli.force {
        return ExitCode::FAILURE;
    }

    let bundle = compile_bundle(&cli, resolved);
    match bundle {
        Ok(_bundle) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("dual-compile isolation failed: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Drives the main/debug pair: this process does the main-snapshot leg
/// directly and re-execs itself for the debug leg so the two never share
/// mutable global state (`dual_compile`'s doc comment has the rationale).
/// A `-` (stdin) entry can't be re-read by a spawned child, so that case
/// runs both legs in this process instead of isolating them.
fn compile_bundle(cli: &Cli, resolved: Resolved) -> Result<SnapshotBundle, DualCompileError> {
    let mut program = resolved.program;
    let main_leg = pipeline::run_backend_tail(&NoopBackend, &mut program, false);

    if cli.entry == "-" {
        let mut debug_program = program;
        pipeline::patch_for_debug(&mut debug_program);
        let debug_leg = pipeline::run_backend_tail(&NoopBackend, &mut debug_program, true);
        return Ok(SnapshotBundle {
            main_snapshot: main_leg.snapshot,
            main_source_map: main_leg.source_map,
            debug_snapshot: debug_leg.snapshot,
            debug_source_map: debug_leg.source_map,
        });
    }

    let current_exe = std::env::current_exe().map_err(DualCompileError::Spawn)?;
    let child_args = vec![cli.entry.clone()];
    let debug_bundle = dual_compile::run_dual_compile_child(&current_exe, &child_args)?;

    Ok(SnapshotBundle {
        main_snapshot: main_leg.snapshot,
        main_source_map: main_leg.source_map,
        debug_snapshot: debug_bundle.debug_snapshot,
        debug_source_map: debug_bundle.debug_source_map,
    })
}

/// The child-mode leg a re-exec'd `toit --__dual_compile_child` runs: a
/// full debug compile (assertions always on, toitdoc kept) whose bundle is
/// written as four length-prefixed frames on stdout for the parent to read
/// back. Diagnostics are swallowed here; the parent's main-leg compile
/// already reported them.
fn run_dual_compile_child_leg(cli: &Cli) -> ExitCode {
    let sdk_root = cli.sdk_root.clone().unwrap_or_else(|| PathBuf::from("/opt/toit-sdk"));
    let (fs, entry_path) = match read_source(&cli.entry) {
        Ok(loaded) => loaded,
        Err(err) => {
            log::error!("dual-compile child failed to read entry source {}: {err}", cli.entry);
            return ExitCode::FAILURE;
        }
    };
    let lock = match toit_project::load_package_lock(Path::new(&entry_path), cli.project_root.as_deref(), sdk_root.clone()) {
        Ok(lock) => lock,
        Err(err) => {
            log::error!("dual-compile child failed to load package manifest: {err}");
            return ExitCode::FAILURE;
        }
    };
    let parser = PlaceholderParser;
    let mut sources = SourceManager::new(cli.sdk_root.clone());
    let mut diagnostics = DiagnosticsBus::new(NullSink, Policy::default());

    let options = ResolverOptions {
        assertions_enabled: true,
        ..ResolverOptions::default()
    };
    let resolved = pipeline::resolve(fs.as_ref(), &parser, &lock, &mut sources, &mut diagnostics, &entry_path, None, options);
    pipeline::check_types_and_definite_assignment(&resolved.program, &mut diagnostics);

    let mut program = resolved.program;
    pipeline::patch_for_debug(&mut program);
    let debug_leg = pipeline::run_backend_tail(&NoopBackend, &mut program, true);

    let bundle = SnapshotBundle {
        main_snapshot: Vec::new(),
        main_source_map: Vec::new(),
        debug_snapshot: debug_leg.snapshot,
        debug_source_map: debug_leg.source_map,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match dual_compile::write_bundle_frames(&mut handle, &bundle) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("failed writing dual-compile child frames: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Minimal line-oriented LSP request loop: each line off stdin names the
/// request (`ANALYZE`, `SUMMARY`, `COMPLETE`, `GOTO DEFINITION`, `SEMANTIC
/// TOKENS`), the entry is re-resolved once per request, and a response is
/// written to stdout. A production language server keeps the resolved
/// program warm across edits; re-resolving per request here keeps this
/// loop a straightforward illustration of the dispatch surface the
/// language-service crate builds.
fn run_lsp(
    fs: &dyn FileSystem,
    parser: &dyn UnitParser,
    lock: &PackageLock,
    sources: &mut SourceManager,
    entry_path: &str,
    options: ResolverOptions,
    _port: i32,
) -> ExitCode {
    let mut line = String::new();
    loop {
        line.clear();
        let read = match io::stdin().read_line(&mut line) {
            Ok(read) => read,
            Err(err) => {
                log::error!("lsp stdin read failed: {err}");
                return ExitCode::FAILURE;
            }
        };
        if read == 0 {
            return ExitCode::SUCCESS;
        }

        let mut diagnostics = DiagnosticsBus::new(NullSink, Policy::default());
        let resolved = pipeline::resolve(fs, parser, lock, sources, &mut diagnostics, entry_path, None, options);
        let module_id = pipeline::entry_module_id();
        let contents = sources.get(entry_path).map(|source| source.contents.clone());

        match line.trim() {
            "ANALYZE" => {
                pipeline::check_types_and_definite_assignment(&resolved.program, &mut diagnostics);
                println!("{}", diagnostics.encountered_error());
            }
            "SUMMARY" => {
                let summary = resolved
                    .program
                    .modules
                    .get(module_id)
                    .map(|module| toit_language_service::summary::summarize_module(&resolved.program, module))
                    .unwrap_or_default();
                print_json(&toit::wire::WireModuleSummary::from(summary));
            }
            "SEMANTIC TOKENS" => {
                let Some(contents) = contents.as_deref() else {
                    print_json(&Vec::<toit::wire::WireSemanticToken>::new());
                    continue;
                };
                let tokens = toit_language_service::dispatch::semantic_tokens_for_entry_module(&resolved.program, module_id, contents);
                let wire: Vec<_> = tokens.into_iter().map(toit::wire::WireSemanticToken::from).collect();
                print_json(&wire);
            }
            request @ ("COMPLETE" | "GOTO DEFINITION") => {
                let Some(selection) = &resolved.selection else {
                    print_json(&toit::wire::WireDispatchResponse::from(toit_language_service::dispatch::DispatchResponse::Completions(vec![])));
                    continue;
                };
                let mode = if request == "COMPLETE" {
                    toit_language_service::dispatch::RequestMode::Complete
                } else {
                    toit_language_service::dispatch::RequestMode::GotoDefinition
                };
                // Every candidate is attributed to the entry unit: this
                // demo loop resolves one file at a time and keeps no
                // class/method/global-to-owning-unit index to do better.
                let response = toit_language_service::dispatch::dispatch(
                    selection,
                    mode,
                    &resolved.program,
                    |_node| Some((entry_path.to_string(), selection.span)),
                    |path| if path == entry_path { contents.as_deref() } else { None },
                );
                print_json(&toit::wire::WireDispatchResponse::from(response));
            }
            other => {
                log::warn!("unrecognized lsp request: {other}");
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("failed to serialize lsp response: {err}"),
    }
}

