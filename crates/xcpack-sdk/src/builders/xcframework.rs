//! Bundle assembly and verification.
//!
//! [`ArtifactAssembler`] stages one archive per slice next to the shared
//! include directory and hands everything to `xcodebuild -create-xcframework`
//! in a single call. [`ResultVerifier`] checks the result on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::common::{recreate_dir, remove_path};
use crate::runner::{Invocation, ToolRunner, run_tool};
use crate::types::{
    Bundle, BundleSlice, CompiledArtifact, ModuleDescriptor, PackConfig, PackError, PublicHeader,
    SliceId,
};

/// Merges per-target archives, the public header and the module descriptor
/// into one bundle.
pub struct ArtifactAssembler<'a> {
    runner: &'a dyn ToolRunner,
    output_root: PathBuf,
    archive_name: String,
    expected: Vec<SliceId>,
}

impl<'a> ArtifactAssembler<'a> {
    /// Creates an assembler staging slices under `output_root`. `expected`
    /// lists every slice the bundle must contain.
    pub fn new(
        runner: &'a dyn ToolRunner,
        output_root: impl Into<PathBuf>,
        archive_name: impl Into<String>,
        expected: Vec<SliceId>,
    ) -> Self {
        Self {
            runner,
            output_root: output_root.into(),
            archive_name: archive_name.into(),
            expected,
        }
    }

    pub fn from_config(runner: &'a dyn ToolRunner, config: &PackConfig) -> Self {
        Self::new(
            runner,
            config.output_root(),
            config.archive_name(),
            config.targets.iter().map(|t| t.slice_id()).collect(),
        )
    }

    /// Pairs every artifact with its slice identity.
    ///
    /// Fails when two artifacts claim the same slice or an expected slice has
    /// no artifact.
    pub fn plan_slices<'b>(
        &self,
        artifacts: &'b [CompiledArtifact],
    ) -> Result<Vec<(SliceId, &'b CompiledArtifact)>, PackError> {
        let mut by_slice: BTreeMap<SliceId, &CompiledArtifact> = BTreeMap::new();
        let mut planned = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let id = artifact.target.slice_id();
            if let Some(existing) = by_slice.insert(id.clone(), artifact) {
                return Err(PackError::Assemble {
                    message: format!(
                        "Conflicting slice '{}': both {} and {} map to it",
                        id, existing.target.triple, artifact.target.triple
                    ),
                    status: None,
                });
            }
            planned.push((id, artifact));
        }

        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|id| !by_slice.contains_key(*id))
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() || planned.is_empty() {
            return Err(PackError::Assemble {
                message: format!(
                    "Missing slice(s): {}. Every declared target must produce an artifact before assembly.",
                    if missing.is_empty() {
                        "<none built>".to_string()
                    } else {
                        missing.join(", ")
                    }
                ),
                status: None,
            });
        }

        Ok(planned)
    }

    /// Staging directory for one slice, e.g. `<output-root>/ios-sim-debug`.
    pub fn staging_dir(&self, id: &SliceId, artifact: &CompiledArtifact) -> PathBuf {
        self.output_root.join(id.dir_name(artifact.mode))
    }

    pub fn invocation(&self, slices: &[BundleSlice], output_path: &Path) -> Invocation {
        let mut inv = Invocation::new("xcodebuild", "xcodebuild -create-xcframework")
            .arg("-create-xcframework");
        for slice in slices {
            inv = inv
                .arg("-library")
                .arg(&slice.library)
                .arg("-headers")
                .arg(&slice.headers);
        }
        inv.arg("-output")
            .arg(output_path)
            .env("LC_ALL", "C")
            .env("LANG", "C")
    }

    /// Destroys any bundle at `output_path`, stages every artifact and runs
    /// the merge tool once with all slices.
    pub fn assemble(
        &self,
        artifacts: &[CompiledArtifact],
        header: &PublicHeader,
        descriptor: &ModuleDescriptor,
        output_path: &Path,
    ) -> Result<Bundle, PackError> {
        let include_dir = header.include_dir().to_path_buf();
        match &descriptor.path {
            Some(path) if path.parent() == Some(include_dir.as_path()) && path.is_file() => {}
            _ => {
                return Err(PackError::Assemble {
                    message: format!(
                        "Module descriptor for {} is not in {}",
                        descriptor.header_name,
                        include_dir.display()
                    ),
                    status: None,
                });
            }
        }

        let planned = self.plan_slices(artifacts)?;

        remove_path(output_path).map_err(|e| PackError::Assemble {
            message: format!(
                "Failed to remove old bundle at {}: {}",
                output_path.display(),
                e
            ),
            status: None,
        })?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut slices = Vec::with_capacity(planned.len());
        for (id, artifact) in planned {
            let staging = self.staging_dir(&id, artifact);
            let library = staging.join(&self.archive_name);
            recreate_dir(&staging)
                .and_then(|_| fs::copy(&artifact.path, &library))
                .map_err(|e| PackError::Assemble {
                    message: format!(
                        "Failed to stage {} into {}: {}",
                        artifact.path.display(),
                        staging.display(),
                        e
                    ),
                    status: None,
                })?;
            debug!(slice = %id, library = %library.display(), "slice staged");
            slices.push(BundleSlice {
                id,
                library,
                headers: include_dir.clone(),
            });
        }

        let invocation = self.invocation(&slices, output_path);
        info!(bundle = %output_path.display(), slices = slices.len(), "creating xcframework");
        run_tool(self.runner, &invocation).map_err(|failure| PackError::Assemble {
            message: failure.to_string(),
            status: failure.status,
        })?;

        Ok(Bundle {
            path: output_path.to_path_buf(),
            slices,
        })
    }
}

/// Confirms an assembled bundle is structurally sound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultVerifier;

impl ResultVerifier {
    /// Subdirectories of the bundle holding at least one entry, sorted.
    pub fn slice_dirs(bundle: &Path) -> Result<Vec<PathBuf>, PackError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(bundle)? {
            let path = entry?.path();
            if path.is_dir() && fs::read_dir(&path)?.next().is_some() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    pub fn verify(&self, bundle: &Path) -> Result<(), PackError> {
        if !bundle.exists() {
            return Err(PackError::Verify(format!(
                "bundle not found at {}",
                bundle.display()
            )));
        }
        if !bundle.is_dir() {
            return Err(PackError::Verify(format!(
                "{} is not a directory",
                bundle.display()
            )));
        }
        if !bundle.join("Info.plist").is_file() {
            return Err(PackError::Verify(format!(
                "{} has no Info.plist",
                bundle.display()
            )));
        }
        if Self::slice_dirs(bundle)?.is_empty() {
            return Err(PackError::Verify(format!(
                "{} contains no non-empty slice directory",
                bundle.display()
            )));
        }
        Ok(())
    }
}
