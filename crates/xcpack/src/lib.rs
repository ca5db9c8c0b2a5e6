//! # xcpack
//!
//! Command-line tool for packaging a Rust static library into a
//! multi-platform `.xcframework`.
//!
//! ## Overview
//!
//! `xcpack build` runs the whole pipeline from the workspace root:
//!
//! - **Validation** - Confirms the manifest and component directories exist
//! - **Provisioning** - Installs missing Rust targets with `rustup`
//! - **Compilation** - One `cargo build` per target with isolated flags
//! - **Headers** - Generates `<name>.h` with `cbindgen` plus a module map
//! - **Assembly** - Merges every slice with `xcodebuild -create-xcframework`
//! - **Verification** - Checks the bundle on disk
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter xcpack.toml
//! xcpack init
//!
//! # Release build (default)
//! xcpack build
//!
//! # Debug build with full debug info
//! xcpack build --debug
//!
//! # Show what would run
//! xcpack plan --debug
//! ```
//!
//! ## Output Directory
//!
//! All artifacts are written to `target/apple/` by default:
//!
//! ```text
//! target/apple/
//! ├── include/              # leaf.h and module.modulemap
//! ├── ios-sim-release/      # staged simulator archive
//! ├── ios-release/          # staged device archive
//! ├── leaf.xcframework/     # the bundle
//! └── build-meta.json       # build metadata
//! ```
//!
//! ## CLI Flags
//!
//! Global flags available on all commands:
//!
//! - **`--dry-run`** - Print the invocations instead of running them
//! - **`--verbose` / `-v`** - Enable detailed output and debug logging
//! - **`--config <path>`** - Use this `xcpack.toml` instead of discovering one
//! - **`--project-root <path>`** - Workspace root (defaults to the current directory)
//!
//! ## Exit Codes
//!
//! `0` on success, `2` on a usage error, the failing tool's own status when a
//! tool failed with one, `1` otherwise.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `xcpack.toml`
//! - [`meta`] - `build-meta.json` records

use anyhow::{Context, Result, bail};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use xcpack_sdk::builders::CompilerFlags;
use xcpack_sdk::{BuildMode, PackConfig, PackError, Pipeline, SystemRunner};

pub mod config;
pub mod meta;

use config::{CliOverrides, ConfigResolver, XcpackConfig};
use meta::BuildMeta;

/// Packages a Rust static library into a multi-platform xcframework.
#[derive(Parser, Debug)]
#[command(name = "xcpack", author, version, about = "Rust static library to xcframework packager", long_about = None)]
struct Cli {
    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Path to xcpack.toml (discovered upward from the project root if omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build every target and assemble the xcframework.
    Build {
        #[command(flatten)]
        mode: ModeArgs,
        #[arg(long, help = "Output root for headers, slices and the bundle")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Compile targets concurrently")]
        parallel: bool,
    },
    /// Print the build matrix and the commands `build` would run.
    Plan {
        #[command(flatten)]
        mode: ModeArgs,
    },
    /// Write a starter xcpack.toml.
    Init {
        #[arg(long, default_value = config::CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, default_value = "leaf")]
        library_name: String,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct ModeArgs {
    /// Unoptimized build with full debug info
    #[arg(long, conflicts_with = "release")]
    debug: bool,
    /// Optimized build without debug info (default)
    #[arg(long)]
    release: bool,
}

impl ModeArgs {
    fn mode(&self) -> Option<BuildMode> {
        if self.debug {
            Some(BuildMode::Debug)
        } else if self.release {
            Some(BuildMode::Release)
        } else {
            None
        }
    }
}

/// Runs the CLI with the process arguments.
pub fn run() -> Result<()> {
    run_from(std::env::args_os())
}

/// Runs the CLI with explicit arguments (the first one is the program name).
///
/// Malformed arguments surface as [`PackError::Usage`] before anything else
/// happens.
pub fn run_from<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print().context("Failed to print help")?;
            return Ok(());
        }
        Err(err) => return Err(PackError::Usage(err.render().to_string()).into()),
    };

    init_logging(cli.verbose);

    let project_root = match &cli.project_root {
        Some(root) => absolute(root)?,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Command::Build {
            mode,
            output_dir,
            parallel,
        } => {
            let overrides = CliOverrides {
                mode: mode.mode(),
                output_dir,
                parallel,
            };
            let config = resolve_config(cli.config.as_deref(), &project_root, &overrides)?;
            if cli.dry_run {
                println!("Dry run: no commands will be executed");
                print_plan(&config);
                return Ok(());
            }
            cmd_build(config, cli.verbose)
        }
        Command::Plan { mode } => {
            let overrides = CliOverrides {
                mode: mode.mode(),
                ..Default::default()
            };
            let config = resolve_config(cli.config.as_deref(), &project_root, &overrides)?;
            print_plan(&config);
            Ok(())
        }
        Command::Init {
            output,
            library_name,
        } => cmd_init(&output, &library_name, cli.dry_run),
    }
}

/// Process exit code for an error returned by [`run`].
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PackError>())
        .map(PackError::exit_code)
        .unwrap_or(1)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when running in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to get current directory")?
        .join(path))
}

fn resolve_config(
    explicit: Option<&Path>,
    project_root: &Path,
    overrides: &CliOverrides,
) -> Result<PackConfig> {
    let resolver = ConfigResolver::load(explicit, project_root)?;
    if let Some(path) = &resolver.config_path {
        println!("Using config file: {:?}", path);
    }
    resolver.pack_config(project_root, overrides)
}

fn print_plan(config: &PackConfig) {
    println!("Build matrix ({}):", config.mode);
    for variant in config.variants() {
        let flags = CompilerFlags::for_mode(variant.mode(), config.split_debuginfo);
        println!(
            "  {} -> {}  [{}]",
            variant,
            variant.target().slice_id().dir_name(variant.mode()),
            flags.codegen_options().join(" ")
        );
    }
    println!("Bundle: {}", config.bundle_path().display());
    println!();
    println!("Commands:");
    let pipeline = Pipeline::new(config.clone(), SystemRunner);
    for (i, invocation) in pipeline.plan().iter().enumerate() {
        println!("  {}. {}", i + 1, invocation);
    }
}

fn cmd_build(config: PackConfig, verbose: bool) -> Result<()> {
    println!("Packaging {} ({})...", config.library_name, config.mode);
    println!("  Project root: {}", config.project_root.display());
    println!("  Output: {}", config.output_root().display());
    if verbose {
        println!("  Verbose: enabled");
    }

    let mut pipeline = Pipeline::new(config.clone(), SystemRunner).verbose(verbose);
    let report = pipeline.run()?;

    match BuildMeta::collect(&SystemRunner, &config, &report)
        .and_then(|meta| meta.write(&config.output_root()))
    {
        Ok(path) if verbose => println!("  Build metadata: {}", path.display()),
        Ok(_) => {}
        Err(err) => warn!("could not write build metadata: {:#}", err),
    }

    println!(
        "\n✓ xcframework created: {} ({} slice(s))",
        report.bundle.path.display(),
        report.bundle.slices.len()
    );
    Ok(())
}

fn cmd_init(output: &Path, library_name: &str, dry_run: bool) -> Result<()> {
    refuse_overwrite(output)?;
    if library_name.trim().is_empty() {
        bail!("--library-name must not be empty");
    }
    let contents = XcpackConfig::generate_starter_toml(library_name);
    if dry_run {
        println!("Would write {:?}:\n\n{}", output, contents);
        return Ok(());
    }
    ensure_can_write(output)?;
    fs::write(output, contents).with_context(|| format!("writing file {:?}", output))?;

    println!("Wrote {:?}", output);
    println!("\nNext steps:");
    println!("  1. Adjust [project] and [bindings] to match your workspace");
    println!("  2. Run 'xcpack plan' to review the build matrix");
    println!("  3. Run 'xcpack build' to create the xcframework");
    Ok(())
}

fn refuse_overwrite(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    Ok(())
}

fn ensure_can_write(path: &Path) -> Result<()> {
    refuse_overwrite(path)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}
