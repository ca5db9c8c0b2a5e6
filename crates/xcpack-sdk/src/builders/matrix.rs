//! Build matrix execution.
//!
//! Compiles the static library once per [`BuildVariant`]. Each call derives a
//! fresh [`CompilerFlags`] value from the variant's mode and passes it to that
//! one `cargo build` child only.

use std::path::PathBuf;
use std::thread;

use tracing::{debug, info};

use super::flags::{CompilerFlags, INHERITED_FLAG_VARS, target_flag_var};
use crate::runner::{Invocation, ToolRunner, run_tool};
use crate::types::{BuildMode, BuildVariant, CompiledArtifact, ExecutionStrategy, PackConfig, PackError};

/// Compiles build variants with isolated flags.
pub struct BuildMatrixExecutor<'a> {
    runner: &'a dyn ToolRunner,
    config: &'a PackConfig,
}

impl<'a> BuildMatrixExecutor<'a> {
    pub fn new(runner: &'a dyn ToolRunner, config: &'a PackConfig) -> Self {
        Self { runner, config }
    }

    /// Where Cargo leaves the archive for `variant`.
    pub fn artifact_path(&self, variant: &BuildVariant) -> PathBuf {
        self.config
            .target_dir()
            .join(&variant.target().triple)
            .join(variant.mode().as_str())
            .join(self.config.archive_name())
    }

    /// The compiler invocation for `variant`.
    ///
    /// Everything variant-specific lives on the returned value: flags,
    /// deployment floor, locale. Inherited flag variables are stripped.
    pub fn invocation(&self, variant: &BuildVariant) -> Invocation {
        let target = variant.target();
        let flags = CompilerFlags::for_mode(variant.mode(), self.config.split_debuginfo);

        let mut inv = Invocation::new("cargo", format!("cargo build for {}", variant))
            .args(["build", "-p", self.config.package.as_str(), "--lib"])
            .args(["--target", target.triple.as_str()]);
        if matches!(variant.mode(), BuildMode::Release) {
            inv = inv.arg("--release");
        }
        inv = inv.arg("--no-default-features");
        if !self.config.features.is_empty() {
            inv = inv.arg("--features").arg(self.config.features.join(","));
        }
        inv = inv
            .arg("--manifest-path")
            .arg(self.config.project_root.join(&self.config.manifest))
            .arg("--target-dir")
            .arg(self.config.target_dir())
            .current_dir(&self.config.project_root);

        for var in INHERITED_FLAG_VARS {
            inv = inv.env_remove(var);
        }
        inv = inv
            .env_remove(target_flag_var(&target.triple))
            .env("CARGO_ENCODED_RUSTFLAGS", flags.encoded())
            .env("LC_ALL", "C")
            .env("LANG", "C");
        if let Some(var) = target.deployment_env_var() {
            inv = inv.env(var, target.deployment_target.clone());
        }
        inv
    }

    /// Compiles one variant.
    ///
    /// A failed compile is fatal and not retried; so is a successful exit that
    /// left no archive behind.
    pub fn build(&self, variant: &BuildVariant) -> Result<CompiledArtifact, PackError> {
        let invocation = self.invocation(variant);
        info!(variant = %variant, "compiling");

        run_tool(self.runner, &invocation).map_err(|failure| PackError::Build {
            variant: variant.to_string(),
            message: failure.to_string(),
            status: failure.status,
        })?;

        let path = self.artifact_path(variant);
        if !path.is_file() {
            return Err(PackError::Build {
                variant: variant.to_string(),
                message: format!(
                    "Static library not found: {}\n\n\
                     Ensure package '{}' declares crate-type = [\"staticlib\"] and its library is named '{}'.",
                    path.display(),
                    self.config.package,
                    self.config.library_name
                ),
                status: None,
            });
        }

        debug!(artifact = %path.display(), "variant compiled");
        Ok(CompiledArtifact {
            path,
            mode: variant.mode(),
            target: variant.target().clone(),
        })
    }

    /// Compiles every variant, returning artifacts in declaration order.
    ///
    /// Sequential runs stop at the first failure. Parallel runs let every
    /// started compile finish, then report the first failure in declaration
    /// order.
    pub fn build_all(
        &self,
        variants: &[BuildVariant],
        strategy: ExecutionStrategy,
    ) -> Result<Vec<CompiledArtifact>, PackError> {
        match strategy {
            ExecutionStrategy::Sequential => variants.iter().map(|v| self.build(v)).collect(),
            ExecutionStrategy::Parallel => thread::scope(|scope| {
                let handles: Vec<_> = variants
                    .iter()
                    .map(|variant| (variant, scope.spawn(move || self.build(variant))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(variant, handle)| {
                        handle.join().unwrap_or_else(|_| {
                            Err(PackError::Build {
                                variant: variant.to_string(),
                                message: "build thread panicked".to_string(),
                                status: None,
                            })
                        })
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
                    .collect()
            }),
        }
    }
}
