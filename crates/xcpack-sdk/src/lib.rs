//! xcframework packaging SDK for Rust static libraries
//!
//! `xcpack-sdk` compiles a Rust static library once per (build mode, target)
//! pair, generates its C header, and merges everything into a single
//! multi-platform `.xcframework` that Xcode projects can link directly.
//!
//! # Architecture
//!
//! - **Types**: configuration, build variants and pipeline outputs ([`types`])
//! - **Runner**: the seam every external command goes through ([`runner`])
//! - **Builders**: one component per pipeline step ([`builders`])
//! - **Pipeline**: the state machine tying the steps together ([`pipeline`])
//!
//! # Example
//!
//! ```no_run
//! use xcpack_sdk::{BuildMode, PackConfig, Pipeline, SystemRunner};
//!
//! fn main() -> Result<(), xcpack_sdk::PackError> {
//!     let mut config = PackConfig::new("/path/to/leaf");
//!     config.mode = BuildMode::Release;
//!
//!     let report = Pipeline::new(config, SystemRunner).run()?;
//!     for slice in &report.bundle.slices {
//!         println!("{} -> {}", slice.id, slice.library.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Isolation
//!
//! Compiler flags are a value computed per variant and passed to exactly one
//! `cargo build` child through its own environment. Flag variables exported
//! by the parent shell are removed from that child. A release build and a
//! debug build run back to back cannot observe each other's settings.

pub mod builders;
pub mod pipeline;
pub mod runner;
pub mod types;

pub use pipeline::{Pipeline, PipelineReport, PipelineState};
pub use runner::{Invocation, SystemRunner, ToolFailure, ToolOutput, ToolRunner};
pub use types::{
    BuildMode, BuildVariant, Bundle, BundleSlice, CompiledArtifact, DEFAULT_DEPLOYMENT_TARGET,
    ExecutionStrategy, MarkerKind, ModuleDescriptor, PackConfig, PackError, PlatformKind,
    PublicHeader, RequiredItem, SliceId, SplitDebuginfo, TargetPlatform, ValidationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
