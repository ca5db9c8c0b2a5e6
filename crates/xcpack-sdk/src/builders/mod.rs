//! Pipeline steps.
//!
//! Each step is a small component that drives one external collaborator
//! through a [`ToolRunner`](crate::runner::ToolRunner), or touches the
//! filesystem directly:
//!
//! | Component | Collaborator | Output |
//! |-----------|--------------|--------|
//! | [`WorkspaceValidator`] | filesystem | validation report |
//! | [`ToolchainProvisioner`] | `rustup` | installed targets |
//! | [`BuildMatrixExecutor`] | `cargo build` | one static library per variant |
//! | [`HeaderGenerator`] | `cbindgen` | `include/<name>.h` |
//! | [`ModuleDescriptor`](crate::ModuleDescriptor) | filesystem | `include/module.modulemap` |
//! | [`ArtifactAssembler`] | `xcodebuild -create-xcframework` | `<name>.xcframework` |
//! | [`ResultVerifier`] | filesystem | structural check |
//!
//! The [`Pipeline`](crate::Pipeline) runs them in that order.

pub mod common;
pub mod descriptor;
pub mod flags;
pub mod header;
pub mod matrix;
pub mod toolchain;
pub mod workspace;
pub mod xcframework;

pub use descriptor::MODULEMAP_FILE;
pub use flags::{CompilerFlags, INHERITED_FLAG_VARS, target_flag_var};
pub use header::HeaderGenerator;
pub use matrix::BuildMatrixExecutor;
pub use toolchain::ToolchainProvisioner;
pub use workspace::WorkspaceValidator;
pub use xcframework::{ArtifactAssembler, ResultVerifier};
