//! Public header generation through `cbindgen`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::common::recreate_dir;
use crate::runner::{Invocation, ToolRunner, run_tool};
use crate::types::{PackConfig, PackError, PublicHeader};

/// Produces the single platform-independent header shared by every slice.
pub struct HeaderGenerator<'a> {
    runner: &'a dyn ToolRunner,
    project_root: PathBuf,
    include_dir: PathBuf,
    header_name: String,
}

impl<'a> HeaderGenerator<'a> {
    /// Creates a generator writing `header_name` into `include_dir`.
    pub fn new(
        runner: &'a dyn ToolRunner,
        project_root: impl Into<PathBuf>,
        include_dir: impl Into<PathBuf>,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            project_root: project_root.into(),
            include_dir: include_dir.into(),
            header_name: header_name.into(),
        }
    }

    pub fn from_config(runner: &'a dyn ToolRunner, config: &PackConfig) -> Self {
        Self::new(
            runner,
            config.project_root.clone(),
            config.include_dir(),
            config.header_name(),
        )
    }

    pub fn header_path(&self) -> PathBuf {
        self.include_dir.join(&self.header_name)
    }

    pub fn invocation(&self, entry_point: &Path, binding_config: &Path) -> Invocation {
        Invocation::new("cbindgen", "cbindgen header generation")
            .arg("--config")
            .arg(self.project_root.join(binding_config))
            .arg(self.project_root.join(entry_point))
            .current_dir(&self.project_root)
            .env("LC_ALL", "C")
            .env("LANG", "C")
    }

    /// Runs the binding generator once and writes its output as the public
    /// header into a freshly emptied include directory.
    pub fn generate(
        &self,
        entry_point: &Path,
        binding_config: &Path,
    ) -> Result<PublicHeader, PackError> {
        for (label, path) in [("entry point", entry_point), ("binding config", binding_config)] {
            let resolved = self.project_root.join(path);
            if !resolved.is_file() {
                return Err(PackError::Generate {
                    message: format!(
                        "Binding {} not found: {}\n\n\
                         Check [bindings] in xcpack.toml.",
                        label,
                        resolved.display()
                    ),
                    status: None,
                });
            }
        }

        let invocation = self.invocation(entry_point, binding_config);
        info!(header = %self.header_name, "generating public header");
        let output = run_tool(self.runner, &invocation).map_err(|failure| PackError::Generate {
            message: failure.to_string(),
            status: failure.status,
        })?;

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(PackError::Generate {
                message: format!(
                    "cbindgen produced no output for {}.\n\n\
                     Ensure the crate exports #[no_mangle] extern \"C\" items.",
                    entry_point.display()
                ),
                status: None,
            });
        }

        // Everything in the include directory ends up in every slice.
        recreate_dir(&self.include_dir).map_err(|e| PackError::Generate {
            message: format!(
                "Failed to reset include directory at {}: {}",
                self.include_dir.display(),
                e
            ),
            status: None,
        })?;
        let path = self.header_path();
        fs::write(&path, &output.stdout).map_err(|e| PackError::Generate {
            message: format!("Failed to write header to {}: {}", path.display(), e),
            status: None,
        })?;

        debug!(path = %path.display(), bytes = output.stdout.len(), "header written");
        Ok(PublicHeader { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeCbindgen {
        stdout: &'static str,
        calls: AtomicUsize,
    }

    impl ToolRunner for FakeCbindgen {
        fn run(&self, _: &Invocation) -> io::Result<ToolOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput {
                status: Some(0),
                success: true,
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: String::new(),
            })
        }
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("leaf-ffi/src")).unwrap();
        fs::write(temp.path().join("leaf-ffi/src/lib.rs"), "").unwrap();
        fs::write(temp.path().join("leaf-ffi/cbindgen.toml"), "language = \"C\"\n").unwrap();
        temp
    }

    #[test]
    fn test_generate_writes_header() {
        let temp = project();
        let runner = FakeCbindgen {
            stdout: "#include <stdint.h>\nint32_t leaf_run(const char *config);\n",
            calls: AtomicUsize::new(0),
        };
        let include = temp.path().join("target/apple/include");
        let generator = HeaderGenerator::new(&runner, temp.path(), &include, "leaf.h");

        let header = generator
            .generate(Path::new("leaf-ffi/src/lib.rs"), Path::new("leaf-ffi/cbindgen.toml"))
            .unwrap();
        assert_eq!(header.path, include.join("leaf.h"));
        assert_eq!(header.file_name(), "leaf.h");
        assert!(fs::read_to_string(&header.path).unwrap().contains("leaf_run"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_include_files_are_removed() {
        let temp = project();
        let runner = FakeCbindgen {
            stdout: "int32_t leaf_run(void);\n",
            calls: AtomicUsize::new(0),
        };
        let include = temp.path().join("target/apple/include");
        fs::create_dir_all(&include).unwrap();
        fs::write(include.join("old_name.h"), "int old(void);\n").unwrap();

        HeaderGenerator::new(&runner, temp.path(), &include, "leaf.h")
            .generate(Path::new("leaf-ffi/src/lib.rs"), Path::new("leaf-ffi/cbindgen.toml"))
            .unwrap();
        let mut names: Vec<String> = fs::read_dir(&include)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["leaf.h"]);
    }

    #[test]
    fn test_empty_output_is_fatal() {
        let temp = project();
        let runner = FakeCbindgen {
            stdout: "\n  \n",
            calls: AtomicUsize::new(0),
        };
        let generator =
            HeaderGenerator::new(&runner, temp.path(), temp.path().join("include"), "leaf.h");
        let err = generator
            .generate(Path::new("leaf-ffi/src/lib.rs"), Path::new("leaf-ffi/cbindgen.toml"))
            .unwrap_err();
        assert!(matches!(err, PackError::Generate { .. }));
        assert!(!temp.path().join("include/leaf.h").exists());
    }

    #[test]
    fn test_missing_inputs_skip_the_tool() {
        let temp = TempDir::new().unwrap();
        let runner = FakeCbindgen {
            stdout: "int x;",
            calls: AtomicUsize::new(0),
        };
        let generator =
            HeaderGenerator::new(&runner, temp.path(), temp.path().join("include"), "leaf.h");
        let err = generator
            .generate(Path::new("leaf-ffi/src/lib.rs"), Path::new("leaf-ffi/cbindgen.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("entry point not found"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invocation_shape() {
        let runner = FakeCbindgen {
            stdout: "",
            calls: AtomicUsize::new(0),
        };
        let generator = HeaderGenerator::new(&runner, "/work/leaf", "/work/leaf/include", "leaf.h");
        let inv = generator.invocation(
            Path::new("leaf-ffi/src/lib.rs"),
            Path::new("leaf-ffi/cbindgen.toml"),
        );
        assert_eq!(inv.program(), "cbindgen");
        assert_eq!(
            inv.arg_value("--config").as_deref(),
            Some("/work/leaf/leaf-ffi/cbindgen.toml")
        );
        assert_eq!(
            inv.arg_strings().last().map(String::as_str),
            Some("/work/leaf/leaf-ffi/src/lib.rs")
        );
    }
}
