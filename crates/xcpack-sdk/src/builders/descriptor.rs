//! `module.modulemap` generation.

use std::fs;
use std::path::Path;

use crate::types::{ModuleDescriptor, PackError};

/// File name of the descriptor inside the include directory.
pub const MODULEMAP_FILE: &str = "module.modulemap";

impl ModuleDescriptor {
    /// Renders the descriptor for `header_name` (e.g. `leaf.h`). The module is
    /// named after the header's stem.
    ///
    /// ```
    /// use xcpack_sdk::ModuleDescriptor;
    ///
    /// let descriptor = ModuleDescriptor::for_header("leaf.h");
    /// assert_eq!(
    ///     descriptor.contents,
    ///     "module leaf {\n    header \"leaf.h\"\n    export *\n}\n"
    /// );
    /// ```
    pub fn for_header(header_name: &str) -> Self {
        let module_name = header_name
            .strip_suffix(".h")
            .unwrap_or(header_name)
            .to_string();
        let contents = format!(
            "module {} {{\n    header \"{}\"\n    export *\n}}\n",
            module_name, header_name
        );
        Self {
            module_name,
            header_name: header_name.to_string(),
            contents,
            path: None,
        }
    }

    /// Writes the descriptor next to the header.
    pub fn write_to(mut self, include_dir: &Path) -> Result<Self, PackError> {
        fs::create_dir_all(include_dir)?;
        let path = include_dir.join(MODULEMAP_FILE);
        fs::write(&path, &self.contents)?;
        self.path = Some(path);
        Ok(self)
    }
}
