//! Target toolchain provisioning through `rustup`.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::runner::{Invocation, ToolRunner, run_tool};
use crate::types::{PackError, TargetPlatform};

/// Ensures the standard library for every target triple is installed.
pub struct ToolchainProvisioner<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> ToolchainProvisioner<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    pub fn list_invocation() -> Invocation {
        Invocation::new("rustup", "rustup target list")
            .args(["target", "list", "--installed"])
            .env("LC_ALL", "C")
            .env("LANG", "C")
    }

    pub fn add_invocation(triple: &str) -> Invocation {
        Invocation::new("rustup", format!("rustup target add {}", triple))
            .args(["target", "add", triple])
            .env("LC_ALL", "C")
            .env("LANG", "C")
    }

    /// Triples currently installed for the active toolchain.
    pub fn installed_targets(&self) -> Result<BTreeSet<String>, PackError> {
        let output = run_tool(self.runner, &Self::list_invocation()).map_err(|failure| {
            PackError::Provision {
                message: failure.to_string(),
                status: failure.status,
            }
        })?;

        Ok(output
            .stdout_lossy()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Installs every missing target. Already-installed targets are left
    /// alone. Returns the triples that were newly added.
    pub fn ensure_targets(&self, targets: &[TargetPlatform]) -> Result<Vec<String>, PackError> {
        let installed = self.installed_targets()?;
        let mut added = Vec::new();

        let wanted: BTreeSet<&str> = targets.iter().map(|t| t.triple.as_str()).collect();
        for triple in wanted {
            if installed.contains(triple) {
                debug!(target = triple, "target already installed");
                continue;
            }

            info!(target = triple, "installing missing target");
            run_tool(self.runner, &Self::add_invocation(triple)).map_err(|failure| {
                PackError::Provision {
                    message: format!(
                        "Rust target {} could not be installed.\n\n{}\n\n\
                         Install it manually with: rustup target add {}",
                        triple, failure, triple
                    ),
                    status: failure.status,
                }
            })?;
            added.push(triple.to_string());
        }

        Ok(added)
    }
}
