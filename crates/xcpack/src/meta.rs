//! Build metadata written next to the bundle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use xcpack_sdk::builders::common::{get_git_branch, get_git_commit, get_rust_version};
use xcpack_sdk::{BuildMode, PackConfig, PipelineReport, ToolRunner};

/// File name of the metadata record under the output root.
pub const META_FILE_NAME: &str = "build-meta.json";

/// Build metadata for reproducibility.
///
/// Lives outside the bundle so the bundle itself is identical across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMeta {
    pub library_name: String,
    pub mode: BuildMode,
    /// Target triples in declaration order
    pub targets: Vec<String>,
    pub bundle: PathBuf,
    pub header: PathBuf,
    /// Git commit hash (if in a git repository)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Git branch name (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Rust version used for the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rust_version: Option<String>,
    /// xcpack version
    pub xcpack_version: String,
    /// Build timestamp in RFC3339 format
    pub build_time: String,
}

impl BuildMeta {
    pub fn collect(
        runner: &dyn ToolRunner,
        config: &PackConfig,
        report: &PipelineReport,
    ) -> Result<Self> {
        let build_time = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("Failed to format build timestamp")?;

        Ok(Self {
            library_name: config.library_name.clone(),
            mode: config.mode,
            targets: report
                .artifacts
                .iter()
                .map(|a| a.target.triple.clone())
                .collect(),
            bundle: report.bundle.path.clone(),
            header: report.header.path.clone(),
            commit_hash: get_git_commit(runner, &config.project_root),
            branch: get_git_branch(runner, &config.project_root),
            rust_version: get_rust_version(runner),
            xcpack_version: env!("CARGO_PKG_VERSION").to_string(),
            build_time,
        })
    }

    /// Writes the record to `<output_root>/build-meta.json`.
    pub fn write(&self, output_root: &Path) -> Result<PathBuf> {
        let path = output_root.join(META_FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize build meta")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write build meta to {}", path.display()))?;
        Ok(path)
    }
}
