//! Workspace root validation.
//!
//! The pipeline refuses to touch anything until the invocation directory is a
//! valid project root: it must hold the workspace manifest and every required
//! component directory. Failures enumerate all missing items at once.

use std::path::Path;

use crate::types::{MarkerKind, PackConfig, PackError, RequiredItem, ValidationReport};

/// Checks a directory for the required workspace markers.
#[derive(Debug, Clone)]
pub struct WorkspaceValidator {
    manifest: String,
    components: Vec<String>,
}

impl WorkspaceValidator {
    /// Creates a validator requiring `manifest` as a file and each entry of
    /// `components` as a directory.
    pub fn new(manifest: impl Into<String>, components: Vec<String>) -> Self {
        Self {
            manifest: manifest.into(),
            components,
        }
    }

    pub fn from_config(config: &PackConfig) -> Self {
        Self::new(config.manifest.clone(), config.components.clone())
    }

    /// Inspects `root` without failing. A root that does not exist or is not a
    /// directory reports every item as missing.
    pub fn inspect(&self, root: &Path) -> ValidationReport {
        let root_is_dir = root.is_dir();

        let mut items = Vec::with_capacity(self.components.len() + 1);
        items.push(RequiredItem {
            name: self.manifest.clone(),
            kind: MarkerKind::File,
            present: root_is_dir && root.join(&self.manifest).is_file(),
        });
        for component in &self.components {
            items.push(RequiredItem {
                name: component.clone(),
                kind: MarkerKind::Directory,
                present: root_is_dir && root.join(component).is_dir(),
            });
        }

        ValidationReport { items }
    }

    /// Fails with a [`PackError::Validation`] listing every missing item.
    pub fn validate(&self, root: &Path) -> Result<(), PackError> {
        let report = self.inspect(root);
        if report.is_complete() {
            return Ok(());
        }
        Err(PackError::Validation {
            root: root.to_path_buf(),
            report,
        })
    }
}
