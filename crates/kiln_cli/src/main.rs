//! Kiln CLI: drives the shader cache from the command line.
//!
//! Provides `kiln compile` for a single variant, `kiln precompile` for
//! warming the disk cache with many variants, `kiln defines` for inspecting
//! the preprocessor symbols and cache key of a variant, `kiln watch` for
//! live invalidation, and `kiln clear-disk` for dropping persisted artifacts.

#![warn(missing_docs)]

mod compile;
mod compiler;
mod defines;
mod precompile;
mod project;
mod watch;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use kiln_common::{ShaderFamily, ShaderStage, VariantDescriptor};

/// Kiln: a concurrent shader compilation cache.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln Shader Cache")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `kiln.toml` configuration file, or its directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile one variant and write its bytecode.
    Compile(CompileArgs),
    /// Compile many variants of a family in the background.
    Precompile(PrecompileArgs),
    /// Print the defines and cache key of a variant.
    Defines(VariantArgs),
    /// Watch the shader directory and report invalidations.
    Watch(WatchArgs),
    /// Delete the on-disk artifact cache.
    ClearDisk,
}

/// Identifies one variant.
#[derive(Parser, Debug)]
pub struct VariantArgs {
    /// Pipeline stage (`vertex`, `pixel`, `compute`).
    #[arg(value_parser = parse_stage)]
    pub stage: ShaderStage,

    /// Shader family name, e.g. `Lighting`.
    #[arg(value_parser = parse_family)]
    pub family: ShaderFamily,

    /// Variant descriptor: hex (`0x1F`, `1F`) or decimal (`#31`).
    #[arg(value_parser = parse_descriptor)]
    pub descriptor: VariantDescriptor,
}

/// Arguments for the `kiln compile` subcommand.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// The variant to compile.
    #[command(flatten)]
    pub variant: VariantArgs,

    /// Write the bytecode here instead of only reporting it.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Bypass the disk cache for this run.
    #[arg(long)]
    pub no_disk_cache: bool,
}

/// Arguments for the `kiln precompile` subcommand.
#[derive(Parser, Debug)]
pub struct PrecompileArgs {
    /// Pipeline stage (`vertex`, `pixel`, `compute`).
    #[arg(value_parser = parse_stage)]
    pub stage: ShaderStage,

    /// Shader family name.
    #[arg(value_parser = parse_family)]
    pub family: ShaderFamily,

    /// Explicit descriptors to compile.
    #[arg(value_parser = parse_descriptor, num_args = 0..)]
    pub descriptors: Vec<VariantDescriptor>,

    /// Compile every descriptor in `0..range` in addition to the explicit ones.
    #[arg(long)]
    pub range: Option<u32>,

    /// Use the background thread budget.
    #[arg(long)]
    pub background: bool,

    /// Output format for the final statistics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `kiln watch` subcommand.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Stop after this many seconds. Without it, runs until stdin closes.
    #[arg(long)]
    pub duration: Option<u64>,
}

/// Statistics output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn parse_stage(s: &str) -> Result<ShaderStage, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_family(s: &str) -> Result<ShaderFamily, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_descriptor(s: &str) -> Result<VariantDescriptor, String> {
    s.parse()
        .map_err(|e| format!("invalid descriptor `{s}`: {e}"))
}

/// Initialises `env_logger`. `RUST_LOG` wins unless a flag overrides it.
fn init_logging(global: &GlobalArgs) {
    let default_level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "info"
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if global.verbose || global.quiet {
        builder.parse_filters(default_level);
    }
    builder.format_timestamp_millis().init();
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Compile(ref args) => compile::run(args, &global),
        Command::Precompile(ref args) => precompile::run(args, &global),
        Command::Defines(ref args) => defines::run(args, &global),
        Command::Watch(ref args) => watch::run(args, &global),
        Command::ClearDisk => project::clear_disk(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_compile() {
        let cli = Cli::parse_from(["kiln", "compile", "pixel", "lighting", "0x10003"]);
        match cli.command {
            Command::Compile(ref args) => {
                assert_eq!(args.variant.stage, ShaderStage::Pixel);
                assert_eq!(args.variant.family, ShaderFamily::Lighting);
                assert_eq!(args.variant.descriptor, VariantDescriptor(0x10003));
                assert!(args.output.is_none());
                assert!(!args.no_disk_cache);
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn parse_compile_with_output() {
        let cli = Cli::parse_from([
            "kiln",
            "compile",
            "vertex",
            "water",
            "#12",
            "--output",
            "out.vso",
            "--no-disk-cache",
        ]);
        match cli.command {
            Command::Compile(ref args) => {
                assert_eq!(args.variant.descriptor, VariantDescriptor(12));
                assert_eq!(args.output.as_deref(), Some("out.vso"));
                assert!(args.no_disk_cache);
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn parse_compile_rejects_unknown_family() {
        assert!(Cli::try_parse_from(["kiln", "compile", "pixel", "nope", "1"]).is_err());
    }

    #[test]
    fn parse_compile_rejects_bad_descriptor() {
        assert!(Cli::try_parse_from(["kiln", "compile", "pixel", "water", "zz"]).is_err());
    }

    #[test]
    fn parse_precompile_default() {
        let cli = Cli::parse_from(["kiln", "precompile", "pixel", "water"]);
        match cli.command {
            Command::Precompile(ref args) => {
                assert!(args.descriptors.is_empty());
                assert!(args.range.is_none());
                assert!(!args.background);
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Precompile command"),
        }
    }

    #[test]
    fn parse_precompile_with_args() {
        let cli = Cli::parse_from([
            "kiln",
            "precompile",
            "vertex",
            "grass",
            "1",
            "2",
            "ff",
            "--range",
            "16",
            "--background",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Precompile(ref args) => {
                assert_eq!(args.stage, ShaderStage::Vertex);
                assert_eq!(args.family, ShaderFamily::Grass);
                assert_eq!(
                    args.descriptors,
                    vec![
                        VariantDescriptor(1),
                        VariantDescriptor(2),
                        VariantDescriptor(0xff)
                    ]
                );
                assert_eq!(args.range, Some(16));
                assert!(args.background);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Precompile command"),
        }
    }

    #[test]
    fn parse_defines() {
        let cli = Cli::parse_from(["kiln", "defines", "pixel", "effect", "10000"]);
        match cli.command {
            Command::Defines(ref args) => {
                assert_eq!(args.family, ShaderFamily::Effect);
                assert_eq!(args.descriptor, VariantDescriptor(0x10000));
            }
            _ => panic!("expected Defines command"),
        }
    }

    #[test]
    fn parse_watch_duration() {
        let cli = Cli::parse_from(["kiln", "watch", "--duration", "5"]);
        match cli.command {
            Command::Watch(ref args) => assert_eq!(args.duration, Some(5)),
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn parse_clear_disk() {
        let cli = Cli::parse_from(["kiln", "clear-disk"]);
        assert!(matches!(cli.command, Command::ClearDisk));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["kiln", "--quiet", "--config", "/tmp/kiln.toml", "clear-disk"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("/tmp/kiln.toml"));
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["kiln", "clear-disk", "-v"]);
        assert!(cli.verbose);
    }
}
