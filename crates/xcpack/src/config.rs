//! Configuration file support for xcpack.
//!
//! This module provides support for `xcpack.toml` configuration files that
//! persist packaging settings so `xcpack build` needs no flags day to day.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. The path given with `--config`
//! 2. The project root (`--project-root`, or the current directory when the
//!    flag is absent)
//! 3. Parent directories of the project root (up to the repository root or
//!    filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! library_name = "leaf"
//! package = "leaf-ffi"
//! components = ["leaf", "leaf-ffi", "leaf-cli"]
//!
//! [bindings]
//! entry_point = "leaf-ffi/src/lib.rs"
//! config = "leaf-ffi/cbindgen.toml"
//!
//! [build]
//! mode = "release"
//! features = ["default-ring"]
//! deployment_target = "10.0"
//!
//! [[targets]]
//! triple = "aarch64-apple-ios-sim"
//! family = "ios"
//! kind = "simulator"
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use xcpack_sdk::{
    BuildMode, DEFAULT_DEPLOYMENT_TARGET, ExecutionStrategy, PackConfig, PlatformKind,
    SplitDebuginfo, TargetPlatform,
};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcpack.toml";

/// Root configuration structure for `xcpack.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XcpackConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,

    /// Binding generator inputs.
    pub bindings: BindingsConfig,

    /// Compilation settings.
    pub build: BuildSection,

    /// Target platforms. Defaults to one iOS simulator and one iOS device target.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetEntry>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Library name used for `lib<name>.a`, `<name>.h` and `<name>.xcframework`.
    pub library_name: Option<String>,

    /// Cargo package producing the static library.
    pub package: Option<String>,

    /// Workspace manifest that must exist at the project root.
    pub manifest: Option<String>,

    /// Component directories that must exist at the project root.
    pub components: Option<Vec<String>>,

    /// Output root for headers, staged slices and the bundle.
    ///
    /// Defaults to `target/apple/` if not specified.
    pub output_dir: Option<PathBuf>,

    /// Cargo target directory. Defaults to `target/`.
    pub target_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    pub entry_point: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Compilation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub mode: Option<BuildMode>,

    /// Feature profile enabled with `--no-default-features --features ...`.
    pub features: Option<Vec<String>>,

    /// Compile variants concurrently.
    pub parallel: bool,

    /// `packed`, `unpacked` or `off`, for debug builds.
    pub split_debuginfo: Option<String>,

    /// Deployment floor for targets that do not set their own.
    pub deployment_target: Option<String>,
}

/// One `[[targets]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub triple: String,
    pub family: String,
    pub kind: PlatformKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_target: Option<String>,
}

impl XcpackConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcpackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified
    /// directory and walking up to the repository root.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolved target list: `[[targets]]` if present, the defaults otherwise.
    pub fn target_platforms(&self) -> Vec<TargetPlatform> {
        let floor = self
            .build
            .deployment_target
            .clone()
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT_TARGET.to_string());

        if self.targets.is_empty() {
            return TargetPlatform::default_targets()
                .into_iter()
                .map(|mut t| {
                    t.deployment_target = floor.clone();
                    t
                })
                .collect();
        }

        self.targets
            .iter()
            .map(|entry| {
                TargetPlatform::new(
                    entry.triple.clone(),
                    entry.family.clone(),
                    entry.kind,
                    entry.deployment_target.clone().unwrap_or_else(|| floor.clone()),
                )
            })
            .collect()
    }

    /// Parses `[build] split_debuginfo`. `off` disables splitting.
    pub fn split_debuginfo(&self) -> Result<Option<SplitDebuginfo>> {
        match self.build.split_debuginfo.as_deref() {
            None => Ok(Some(SplitDebuginfo::Packed)),
            Some("off") => Ok(None),
            Some(other) => Ok(Some(other.parse()?)),
        }
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes comments explaining each configuration option.
    pub fn generate_starter_toml(library_name: &str) -> String {
        format!(
            r#"# xcpack configuration file
# This file configures how xcpack packages the static library into an xcframework.
# CLI flags override these settings when provided.

[project]
# Library name: lib<name>.a, <name>.h and <name>.xcframework
library_name = "{library_name}"

# Cargo package that builds the static library
package = "{library_name}-ffi"

# Items that must exist at the workspace root
manifest = "Cargo.toml"
components = ["{library_name}", "{library_name}-ffi", "{library_name}-cli"]

# Output root for headers, staged slices and the bundle (default: target/apple)
# output_dir = "target/apple"

[bindings]
# Inputs handed to cbindgen
entry_point = "{library_name}-ffi/src/lib.rs"
config = "{library_name}-ffi/cbindgen.toml"

[build]
# Default build mode (can be overridden with --debug / --release)
mode = "release"

# Feature profile (built with --no-default-features)
features = ["default-ring"]

# Minimum deployment version applied to every target
deployment_target = "{deployment_target}"

# Debug-info layout for debug builds: "packed", "unpacked" or "off"
split_debuginfo = "packed"

# Compile targets concurrently (can be enabled with --parallel)
parallel = false

[[targets]]
triple = "aarch64-apple-ios-sim"
family = "ios"
kind = "simulator"

[[targets]]
triple = "aarch64-apple-ios"
family = "ios"
kind = "device"
"#,
            library_name = library_name,
            deployment_target = DEFAULT_DEPLOYMENT_TARGET,
        )
    }
}

/// Values given on the command line. `None` means "not provided".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub mode: Option<BuildMode>,
    pub output_dir: Option<PathBuf>,
    pub parallel: bool,
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values, which take
/// precedence over defaults.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcpackConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers a config file upward
    /// from `start_dir`.
    pub fn load(explicit: Option<&Path>, start_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file not found: {:?}", path);
            }
            return Ok(Self {
                config: Some(XcpackConfig::load_from_file(path)?),
                config_path: Some(path.to_path_buf()),
            });
        }

        match XcpackConfig::discover_from(start_dir)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// The resolved value prefers CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcpackConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Builds the run configuration for `project_root`.
    pub fn pack_config(&self, project_root: &Path, cli: &CliOverrides) -> Result<PackConfig> {
        let defaults = PackConfig::new(project_root);
        let file = self.config.clone().unwrap_or_default();

        let parallel = cli.parallel || file.build.parallel;
        let config = PackConfig {
            project_root: project_root.to_path_buf(),
            library_name: self.resolve(None, |c| c.project.library_name.clone(), defaults.library_name),
            package: self.resolve(None, |c| c.project.package.clone(), defaults.package),
            manifest: self.resolve(None, |c| c.project.manifest.clone(), defaults.manifest),
            components: self.resolve(None, |c| c.project.components.clone(), defaults.components),
            features: self.resolve(None, |c| c.build.features.clone(), defaults.features),
            binding_entry_point: self.resolve(
                None,
                |c| c.bindings.entry_point.clone(),
                defaults.binding_entry_point,
            ),
            binding_config: self.resolve(None, |c| c.bindings.config.clone(), defaults.binding_config),
            targets: file.target_platforms(),
            mode: self.resolve(cli.mode, |c| c.build.mode, defaults.mode),
            output_dir: self.resolve(
                cli.output_dir.clone(),
                |c| c.project.output_dir.clone(),
                defaults.output_dir,
            ),
            target_dir: file.project.target_dir.clone(),
            split_debuginfo: file.split_debuginfo()?,
            strategy: if parallel {
                ExecutionStrategy::Parallel
            } else {
                ExecutionStrategy::Sequential
            },
        };

        config.validate().context("Invalid xcpack configuration")?;
        Ok(config)
    }
}
