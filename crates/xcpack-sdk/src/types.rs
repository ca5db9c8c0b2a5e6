//! Core types for xcpack-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`PackError`] - Error taxonomy for every pipeline step
//! - [`BuildMode`] - Debug or release compilation
//! - [`TargetPlatform`] / [`PlatformKind`] / [`SliceId`] - What gets compiled and where it lands
//! - [`BuildVariant`] - One (mode, target) compilation unit
//! - [`CompiledArtifact`], [`PublicHeader`], [`ModuleDescriptor`], [`Bundle`] - Pipeline outputs
//! - [`PackConfig`] - Fully resolved configuration for one pipeline run

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Minimum deployment version applied to every compiler invocation unless a
/// target overrides it.
pub const DEFAULT_DEPLOYMENT_TARGET: &str = "10.0";

/// Error types for xcpack-sdk operations.
///
/// Every variant is fatal at the step where it is raised. Tool failures keep
/// the child's exit status so the CLI can propagate it.
///
/// # Example
///
/// ```ignore
/// use xcpack_sdk::{Pipeline, PackError};
///
/// match pipeline.run() {
///     Ok(report) => println!("Bundle at {:?}", report.bundle.path),
///     Err(PackError::Validation { report, .. }) => {
///         eprintln!("Missing: {:?}", report.missing());
///     }
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The workspace root is missing one or more required markers.
    ///
    /// The report enumerates every required item, not just the first missing one.
    #[error("workspace validation failed for {}\n\n{report}", .root.display())]
    Validation {
        root: PathBuf,
        report: ValidationReport,
    },

    /// A target toolchain could not be listed or installed.
    #[error("toolchain provisioning failed: {message}")]
    Provision {
        message: String,
        status: Option<i32>,
    },

    /// Compilation of a single build variant failed.
    #[error("build failed for {variant}: {message}")]
    Build {
        variant: String,
        message: String,
        status: Option<i32>,
    },

    /// The binding generator failed or produced no header.
    #[error("header generation failed: {message}")]
    Generate {
        message: String,
        status: Option<i32>,
    },

    /// Slices were missing or conflicting, or the merge tool failed.
    #[error("bundle assembly failed: {message}")]
    Assemble {
        message: String,
        status: Option<i32>,
    },

    /// The bundle is absent or structurally empty after assembly.
    #[error("bundle verification failed: {0}")]
    Verify(String),

    /// A malformed command-line argument.
    #[error("{0}")]
    Usage(String),

    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}. Check xcpack.toml or CLI flags")]
    Config(String),

    /// A pipeline step was attempted out of order.
    #[error("illegal pipeline transition from {from:?} to {to:?}")]
    Transition {
        from: crate::pipeline::PipelineState,
        to: crate::pipeline::PipelineState,
    },

    /// An I/O error occurred outside a specific pipeline step.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Process exit code for this error.
    ///
    /// Usage errors exit with 2. Tool failures propagate the tool's own
    /// non-zero status when one is known; everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackError::Usage(_) => 2,
            PackError::Provision { status, .. }
            | PackError::Build { status, .. }
            | PackError::Generate { status, .. }
            | PackError::Assemble { status, .. } => status.filter(|code| *code != 0).unwrap_or(1),
            _ => 1,
        }
    }
}

/// Kind of filesystem marker required at the workspace root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    File,
    Directory,
}

/// One required workspace marker and whether it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredItem {
    pub name: String,
    pub kind: MarkerKind,
    pub present: bool,
}

/// Result of inspecting a workspace root against the required markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub items: Vec<RequiredItem>,
}

impl ValidationReport {
    /// Names of every missing item, in declaration order.
    pub fn missing(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| !item.present)
            .map(|item| item.name.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|item| item.present)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Missing {} of {} required item(s):",
            self.missing().len(),
            self.items.len()
        )?;
        for item in &self.items {
            let status = if item.present { "[ok]     " } else { "[missing]" };
            let kind = match item.kind {
                MarkerKind::File => "file",
                MarkerKind::Directory => "directory",
            };
            writeln!(f, "  {} {} ({})", status, item.name, kind)?;
        }
        write!(
            f,
            "\nRun from the workspace root or pass --project-root."
        )
    }
}

/// Build mode controlling optimization and debug info.
///
/// # Example
///
/// ```
/// use xcpack_sdk::BuildMode;
///
/// assert_eq!(BuildMode::Debug.as_str(), "debug");
/// assert_eq!(BuildMode::default(), BuildMode::Release);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// No optimization, full debug information.
    Debug,
    /// Maximum optimization, no debug sections.
    #[default]
    Release,
}

impl BuildMode {
    /// Returns the string representation of the mode.
    ///
    /// This is also the name of Cargo's per-profile output directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a target runs on hardware or in a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Device,
    Simulator,
}

/// A compilation target: Rust triple, platform family, device or simulator,
/// and the deployment-version floor every invocation for it must honor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPlatform {
    /// Rust target triple (e.g. `aarch64-apple-ios-sim`).
    pub triple: String,
    /// Platform family used in output directory names (e.g. `ios`).
    pub family: String,
    pub kind: PlatformKind,
    /// Minimum deployment version (e.g. `10.0`).
    pub deployment_target: String,
}

impl TargetPlatform {
    pub fn new(
        triple: impl Into<String>,
        family: impl Into<String>,
        kind: PlatformKind,
        deployment_target: impl Into<String>,
    ) -> Self {
        Self {
            triple: triple.into(),
            family: family.into(),
            kind,
            deployment_target: deployment_target.into(),
        }
    }

    /// ARM64 iOS device.
    pub fn ios_device(deployment_target: impl Into<String>) -> Self {
        Self::new("aarch64-apple-ios", "ios", PlatformKind::Device, deployment_target)
    }

    /// ARM64 iOS simulator (Apple silicon hosts).
    pub fn ios_simulator(deployment_target: impl Into<String>) -> Self {
        Self::new(
            "aarch64-apple-ios-sim",
            "ios",
            PlatformKind::Simulator,
            deployment_target,
        )
    }

    /// The default target set: one iOS simulator slice and one iOS device slice.
    pub fn default_targets() -> Vec<Self> {
        vec![
            Self::ios_simulator(DEFAULT_DEPLOYMENT_TARGET),
            Self::ios_device(DEFAULT_DEPLOYMENT_TARGET),
        ]
    }

    pub fn slice_id(&self) -> SliceId {
        SliceId {
            family: self.family.clone(),
            kind: self.kind,
        }
    }

    /// Environment variable carrying the deployment floor for this triple's OS.
    pub fn deployment_env_var(&self) -> Option<&'static str> {
        let os = self.triple.split('-').nth(2)?;
        match os {
            "ios" => Some("IPHONEOS_DEPLOYMENT_TARGET"),
            "darwin" => Some("MACOSX_DEPLOYMENT_TARGET"),
            "tvos" => Some("TVOS_DEPLOYMENT_TARGET"),
            "watchos" => Some("WATCHOS_DEPLOYMENT_TARGET"),
            "visionos" => Some("XROS_DEPLOYMENT_TARGET"),
            _ => None,
        }
    }
}

/// Identity of one slice inside a bundle: platform family plus kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceId {
    pub family: String,
    pub kind: PlatformKind,
}

impl SliceId {
    /// Staging directory name for this slice under the output root,
    /// e.g. `ios-sim-debug` or `ios-release`.
    pub fn dir_name(&self, mode: BuildMode) -> String {
        format!("{}-{}", self, mode)
    }
}

impl fmt::Display for SliceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PlatformKind::Device => write!(f, "{}", self.family),
            PlatformKind::Simulator => write!(f, "{}-sim", self.family),
        }
    }
}

/// One (mode, target) compilation unit. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildVariant {
    mode: BuildMode,
    target: TargetPlatform,
}

impl BuildVariant {
    pub fn new(mode: BuildMode, target: TargetPlatform) -> Self {
        Self { mode, target }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn target(&self) -> &TargetPlatform {
        &self.target
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.target.triple, self.mode)
    }
}

/// Output binary for one build variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub path: PathBuf,
    pub mode: BuildMode,
    pub target: TargetPlatform,
}

/// The single generated interface header shared by every slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicHeader {
    pub path: PathBuf,
}

impl PublicHeader {
    /// File name of the header (e.g. `leaf.h`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the header and its module descriptor.
    pub fn include_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Module map declaring the public header as an importable module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub module_name: String,
    pub header_name: String,
    pub contents: String,
    /// Location on disk once written.
    pub path: Option<PathBuf>,
}

/// One slice of a bundle: a staged library paired with the shared headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSlice {
    pub id: SliceId,
    pub library: PathBuf,
    pub headers: PathBuf,
}

/// The assembled multi-platform bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub path: PathBuf,
    pub slices: Vec<BundleSlice>,
}

/// How the build matrix is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One variant at a time, in declaration order.
    #[default]
    Sequential,
    /// All variants at once on scoped threads. Opt-in only: the toolchain may
    /// contend on its shared dependency lock.
    Parallel,
}

/// Debug-info layout for debug builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDebuginfo {
    Packed,
    Unpacked,
}

impl SplitDebuginfo {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitDebuginfo::Packed => "packed",
            SplitDebuginfo::Unpacked => "unpacked",
        }
    }
}

impl FromStr for SplitDebuginfo {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packed" => Ok(SplitDebuginfo::Packed),
            "unpacked" => Ok(SplitDebuginfo::Unpacked),
            other => Err(PackError::Config(format!(
                "unknown split-debuginfo value '{}', expected 'packed' or 'unpacked'",
                other
            ))),
        }
    }
}

/// Fully resolved configuration for one pipeline run.
///
/// Relative paths are resolved against `project_root`.
///
/// # Example
///
/// ```
/// use xcpack_sdk::{BuildMode, PackConfig};
///
/// let mut config = PackConfig::new("/path/to/leaf");
/// config.mode = BuildMode::Debug;
/// assert_eq!(config.variants().len(), 2);
/// assert!(config.bundle_path().ends_with("target/apple/leaf.xcframework"));
/// ```
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Workspace root the pipeline runs in.
    pub project_root: PathBuf,
    /// Library name: archive `lib<name>.a`, header `<name>.h`, bundle `<name>.xcframework`.
    pub library_name: String,
    /// Cargo package producing the static library.
    pub package: String,
    /// Workspace manifest file required at the root.
    pub manifest: String,
    /// Component directories required at the root.
    pub components: Vec<String>,
    /// Feature profile enabled in place of the package's default features.
    pub features: Vec<String>,
    /// Entry point handed to the binding generator.
    pub binding_entry_point: PathBuf,
    /// Binding generator configuration file.
    pub binding_config: PathBuf,
    pub targets: Vec<TargetPlatform>,
    pub mode: BuildMode,
    /// Output root for staged slices, headers and the bundle.
    pub output_dir: PathBuf,
    /// Cargo target directory. Defaults to `<project_root>/target`.
    pub target_dir: Option<PathBuf>,
    /// Debug-info layout applied to debug builds.
    pub split_debuginfo: Option<SplitDebuginfo>,
    pub strategy: ExecutionStrategy,
}

impl PackConfig {
    /// Creates a configuration with defaults for packaging `leaf-ffi`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            library_name: "leaf".to_string(),
            package: "leaf-ffi".to_string(),
            manifest: "Cargo.toml".to_string(),
            components: vec![
                "leaf".to_string(),
                "leaf-ffi".to_string(),
                "leaf-cli".to_string(),
            ],
            features: vec!["default-ring".to_string()],
            binding_entry_point: PathBuf::from("leaf-ffi/src/lib.rs"),
            binding_config: PathBuf::from("leaf-ffi/cbindgen.toml"),
            targets: TargetPlatform::default_targets(),
            mode: BuildMode::Release,
            output_dir: PathBuf::from("target/apple"),
            target_dir: None,
            split_debuginfo: Some(SplitDebuginfo::Packed),
            strategy: ExecutionStrategy::Sequential,
        }
    }

    /// The build variants for this run, one per target, in declaration order.
    pub fn variants(&self) -> Vec<BuildVariant> {
        self.targets
            .iter()
            .map(|target| BuildVariant::new(self.mode, target.clone()))
            .collect()
    }

    pub fn output_root(&self) -> PathBuf {
        self.project_root.join(&self.output_dir)
    }

    pub fn target_dir(&self) -> PathBuf {
        match &self.target_dir {
            Some(dir) => self.project_root.join(dir),
            None => self.project_root.join("target"),
        }
    }

    pub fn include_dir(&self) -> PathBuf {
        self.output_root().join("include")
    }

    pub fn header_name(&self) -> String {
        format!("{}.h", self.library_name)
    }

    pub fn archive_name(&self) -> String {
        format!("lib{}.a", self.library_name)
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.output_root()
            .join(format!("{}.xcframework", self.library_name))
    }

    /// Checks internal consistency before anything touches the filesystem.
    pub fn validate(&self) -> Result<(), PackError> {
        if self.library_name.trim().is_empty() {
            return Err(PackError::Config("library name must not be empty".into()));
        }
        if self.package.trim().is_empty() {
            return Err(PackError::Config("package name must not be empty".into()));
        }
        if self.targets.is_empty() {
            return Err(PackError::Config(
                "at least one target platform is required".into(),
            ));
        }

        let mut triples = BTreeSet::new();
        let mut slices = BTreeSet::new();
        for target in &self.targets {
            if !triples.insert(target.triple.as_str()) {
                return Err(PackError::Config(format!(
                    "target {} is declared more than once",
                    target.triple
                )));
            }
            let slice = target.slice_id();
            if !slices.insert(slice.clone()) {
                return Err(PackError::Config(format!(
                    "targets conflict on slice '{}': a bundle holds exactly one slice per platform family and kind",
                    slice
                )));
            }
        }
        Ok(())
    }
}
