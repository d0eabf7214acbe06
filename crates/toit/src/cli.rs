// Copyright (c) The Toitware Authors.
// Licensed under the MIT License.

//! Command-line surface, built the way `qsc`'s `Cli` is: one `clap::Parser`
//! struct with doc comments doubling as `--help` text.

use std::path::PathBuf;

use crate::deps::DepFileFormat;

#[derive(clap::Parser, Debug)]
#[command(name = "toit", about = "Compile Toit source to a snapshot bundle")]
pub struct Cli {
    /// Entry source file to compile, or `-` for stdin.
    pub entry: String,

    /// Root directory the entry package's imports are resolved against.
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Root directory of the SDK core libraries.
    #[arg(long)]
    pub sdk_root: Option<PathBuf>,

    /// Emit a snapshot bundle even if diagnostics with error severity were
    /// reported.
    #[arg(long)]
    pub force: bool,

    /// Run resolution and checking only; skip optimization and snapshot
    /// emission entirely.
    #[arg(long)]
    pub analysis_only: bool,

    /// Write a build-system dependency file listing every resolved import.
    #[arg(long)]
    pub dep_file: Option<PathBuf>,

    /// Dependency file format, when `--dep-file` is given.
    #[arg(long, value_enum, default_value = "plain")]
    pub dep_format: DepFormatArg,

    /// Run as a language server over TCP on this port instead of compiling
    /// once and exiting.
    #[arg(long)]
    pub lsp_port: Option<i32>,

    /// Disable `assert` statement checking during resolution.
    #[arg(long)]
    pub no_assertions: bool,

    /// Hidden: re-exec target for dual-compile isolation. Never set by a
    /// user directly; see `dual_compile`. The flag name here must match
    /// `dual_compile::CHILD_MODE_FLAG` with its leading `--` stripped.
    #[arg(long = "__dual_compile_child", hide = true)]
    pub dual_compile_child: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepFormatArg {
    Plain,
    Ninja,
}

impl From<DepFormatArg> for DepFileFormat {
    fn from(value: DepFormatArg) -> Self {
        match value {
            DepFormatArg::Plain => DepFileFormat::Plain,
            DepFormatArg::Ninja => DepFileFormat::Ninja,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual_compile::CHILD_MODE_FLAG;
    use clap::Parser;

    #[test]
    fn parses_an_entry_path_with_defaults() {
        let cli = Cli::parse_from(["toit", "main.toit"]);
        assert_eq!(cli.entry, "main.toit");
        assert!(!cli.force);
        assert!(!cli.dual_compile_child);
        assert_eq!(cli.dep_format, DepFormatArg::Plain);
    }

    #[test]
    fn parses_the_hidden_child_mode_flag() {
        let cli = Cli::parse_from(["toit", CHILD_MODE_FLAG, "main.toit"]);
        assert!(cli.dual_compile_child);
    }

    #[test]
    fn parses_ninja_dep_format() {
        let cli = Cli::parse_from(["toit", "main.toit", "--dep-format", "ninja"]);
        assert_eq!(cli.dep_format, DepFormatArg::Ninja);
        assert_eq!(DepFileFormat::from(cli.dep_format), DepFileFormat::Ninja);
    }
}
