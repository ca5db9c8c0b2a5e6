//! The packaging pipeline.
//!
//! A [`Pipeline`] drives every step in a fixed order and records its progress
//! as a [`PipelineState`]. Each state is reachable only from its predecessor;
//! the first error moves the pipeline to [`PipelineState::Failed`] and nothing
//! after it runs.

use tracing::info;

use crate::builders::{
    ArtifactAssembler, BuildMatrixExecutor, HeaderGenerator, ResultVerifier,
    ToolchainProvisioner, WorkspaceValidator,
};
use crate::runner::{Invocation, ToolRunner};
use crate::types::{
    Bundle, BundleSlice, CompiledArtifact, ModuleDescriptor, PackConfig, PackError, PublicHeader,
};

/// Progress of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Init,
    Validated,
    Provisioned,
    Built,
    /// Header generated and module descriptor written.
    HeaderGenerated,
    Assembled,
    Verified,
    Failed,
}

impl PipelineState {
    /// The only state reachable from `self` on success.
    pub fn next(self) -> Option<Self> {
        match self {
            PipelineState::Init => Some(PipelineState::Validated),
            PipelineState::Validated => Some(PipelineState::Provisioned),
            PipelineState::Provisioned => Some(PipelineState::Built),
            PipelineState::Built => Some(PipelineState::HeaderGenerated),
            PipelineState::HeaderGenerated => Some(PipelineState::Assembled),
            PipelineState::Assembled => Some(PipelineState::Verified),
            PipelineState::Verified | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: PipelineState,
    /// Targets that had to be installed during provisioning.
    pub provisioned: Vec<String>,
    pub artifacts: Vec<CompiledArtifact>,
    pub header: PublicHeader,
    pub descriptor: ModuleDescriptor,
    pub bundle: Bundle,
}

/// Runs validation, provisioning, compilation, header generation, assembly
/// and verification for one [`PackConfig`].
///
/// # Example
///
/// ```no_run
/// use xcpack_sdk::{BuildMode, PackConfig, Pipeline, SystemRunner};
///
/// let mut config = PackConfig::new(".");
/// config.mode = BuildMode::Debug;
///
/// let mut pipeline = Pipeline::new(config, SystemRunner).verbose(true);
/// let report = pipeline.run()?;
/// println!("Bundle at {}", report.bundle.path.display());
/// # Ok::<(), xcpack_sdk::PackError>(())
/// ```
pub struct Pipeline<R: ToolRunner> {
    config: PackConfig,
    runner: R,
    verbose: bool,
    state: PipelineState,
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn new(config: PackConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            verbose: false,
            state: PipelineState::Init,
        }
    }

    /// Enables verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Runs every step. A pipeline runs at most once; a second call fails
    /// with [`PackError::Transition`].
    pub fn run(&mut self) -> Result<PipelineReport, PackError> {
        if self.state != PipelineState::Init {
            return Err(PackError::Transition {
                from: self.state,
                to: PipelineState::Validated,
            });
        }
        match self.run_steps() {
            Ok(report) => Ok(report),
            Err(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    fn advance(&mut self, to: PipelineState) -> Result<(), PackError> {
        if self.state.next() != Some(to) {
            return Err(PackError::Transition {
                from: self.state,
                to,
            });
        }
        info!(from = ?self.state, to = ?to, "pipeline transition");
        self.state = to;
        Ok(())
    }

    fn run_steps(&mut self) -> Result<PipelineReport, PackError> {
        self.config.validate()?;
        let variants = self.config.variants();

        println!("Validating workspace at {}...", self.config.project_root.display());
        WorkspaceValidator::from_config(&self.config).validate(&self.config.project_root)?;
        self.advance(PipelineState::Validated)?;

        println!("Checking Rust targets...");
        let provisioned = ToolchainProvisioner::new(&self.runner).ensure_targets(&self.config.targets)?;
        for triple in &provisioned {
            println!("  Installed {}", triple);
        }
        self.advance(PipelineState::Provisioned)?;

        println!(
            "Building {} ({}) for {} target(s)...",
            self.config.package,
            self.config.mode,
            variants.len()
        );
        let artifacts = BuildMatrixExecutor::new(&self.runner, &self.config)
            .build_all(&variants, self.config.strategy)?;
        if artifacts.len() != variants.len() {
            return Err(PackError::Build {
                variant: "build matrix".to_string(),
                message: format!(
                    "expected {} artifact(s), got {}",
                    variants.len(),
                    artifacts.len()
                ),
                status: None,
            });
        }
        if self.verbose {
            for artifact in &artifacts {
                println!("  Built {}", artifact.path.display());
            }
        }
        self.advance(PipelineState::Built)?;

        println!("Generating C header...");
        let header = HeaderGenerator::from_config(&self.runner, &self.config).generate(
            &self.config.binding_entry_point,
            &self.config.binding_config,
        )?;
        let descriptor =
            ModuleDescriptor::for_header(&header.file_name()).write_to(header.include_dir())?;
        if self.verbose {
            println!("  Header: {}", header.path.display());
        }
        self.advance(PipelineState::HeaderGenerated)?;

        println!("Creating xcframework...");
        let bundle = ArtifactAssembler::from_config(&self.runner, &self.config).assemble(
            &artifacts,
            &header,
            &descriptor,
            &self.config.bundle_path(),
        )?;
        self.advance(PipelineState::Assembled)?;

        println!("Verifying {}...", bundle.path.display());
        ResultVerifier.verify(&bundle.path)?;
        let found = ResultVerifier::slice_dirs(&bundle.path)?.len();
        if found != bundle.slices.len() {
            return Err(PackError::Verify(format!(
                "expected {} slice(s) in {}, found {}",
                bundle.slices.len(),
                bundle.path.display(),
                found
            )));
        }
        self.advance(PipelineState::Verified)?;

        Ok(PipelineReport {
            state: self.state,
            provisioned,
            artifacts,
            header,
            descriptor,
            bundle,
        })
    }

    /// The invocations a run would issue, in order, without running anything.
    ///
    /// Provisioning is shown as the listing call only; which targets get
    /// installed depends on its output.
    pub fn plan(&self) -> Vec<Invocation> {
        let mut plan = vec![ToolchainProvisioner::list_invocation()];

        let executor = BuildMatrixExecutor::new(&self.runner, &self.config);
        plan.extend(self.config.variants().iter().map(|v| executor.invocation(v)));

        let generator = HeaderGenerator::from_config(&self.runner, &self.config);
        plan.push(generator.invocation(
            &self.config.binding_entry_point,
            &self.config.binding_config,
        ));

        let assembler = ArtifactAssembler::from_config(&self.runner, &self.config);
        let slices: Vec<BundleSlice> = self
            .config
            .targets
            .iter()
            .map(|target| {
                let id = target.slice_id();
                BundleSlice {
                    library: self
                        .config
                        .output_root()
                        .join(id.dir_name(self.config.mode))
                        .join(self.config.archive_name()),
                    headers: self.config.include_dir(),
                    id,
                }
            })
            .collect();
        plan.push(assembler.invocation(&slices, &self.config.bundle_path()));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use std::io;

    struct Unreachable;

    impl ToolRunner for Unreachable {
        fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
            panic!("unexpected invocation: {}", invocation)
        }
    }

    #[test]
    fn test_state_order() {
        let mut state = PipelineState::Init;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            seen.push(next);
            state = next;
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::Init,
                PipelineState::Validated,
                PipelineState::Provisioned,
                PipelineState::Built,
                PipelineState::HeaderGenerated,
                PipelineState::Assembled,
                PipelineState::Verified,
            ]
        );
        assert!(PipelineState::Failed.is_terminal());
    }

    #[test]
    fn test_advance_rejects_skips() {
        let mut pipeline = Pipeline::new(PackConfig::new("/tmp/xcpack-skip"), Unreachable);
        let err = pipeline.advance(PipelineState::Built).unwrap_err();
        assert!(matches!(
            err,
            PackError::Transition {
                from: PipelineState::Init,
                to: PipelineState::Built
            }
        ));
    }

    #[test]
    fn test_validation_failure_moves_to_failed() {
        let mut pipeline = Pipeline::new(
            PackConfig::new("/nonexistent/xcpack/workspace"),
            Unreachable,
        );
        assert!(matches!(pipeline.run(), Err(PackError::Validation { .. })));
        assert_eq!(pipeline.state(), PipelineState::Failed);

        // A failed pipeline does not run again.
        assert!(matches!(pipeline.run(), Err(PackError::Transition { .. })));
    }

    #[test]
    fn test_plan_lists_every_step() {
        let pipeline = Pipeline::new(PackConfig::new("/work/leaf"), Unreachable);
        let plan = pipeline.plan();
        let programs: Vec<&str> = plan.iter().map(|inv| inv.program()).collect();
        assert_eq!(programs, vec!["rustup", "cargo", "cargo", "cbindgen", "xcodebuild"]);
        assert_eq!(
            plan[4].arg_value("-output").as_deref(),
            Some("/work/leaf/target/apple/leaf.xcframework")
        );
    }
}
