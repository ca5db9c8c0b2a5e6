//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use xcpack_sdk::builders::CompilerFlags;
use xcpack_sdk::{Invocation, ToolOutput, ToolRunner};

pub const HEADER: &str = "#include <stdint.h>\n\nint32_t leaf_run(const char *config_path);\n";

/// How the fake xcodebuild responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeBehavior {
    /// Writes Info.plist and one slice directory per library.
    Normal,
    /// Exits with the given status and writes nothing.
    Fail(i32),
    /// Exits 0 without writing a bundle.
    Silent,
    /// Writes one slice directory more than it was given.
    ExtraSlice,
}

/// Stands in for rustup, cargo, cbindgen and xcodebuild, recording every call.
pub struct FakeRunner {
    installed: Mutex<BTreeSet<String>>,
    fail_build_on: Option<(String, i32)>,
    merge: MergeBehavior,
    pub calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    /// A runner with both default targets installed.
    pub fn new() -> Self {
        Self::with_installed(&["aarch64-apple-ios", "aarch64-apple-ios-sim"])
    }

    pub fn with_installed(triples: &[&str]) -> Self {
        Self {
            installed: Mutex::new(triples.iter().map(|t| t.to_string()).collect()),
            fail_build_on: None,
            merge: MergeBehavior::Normal,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes the compile for `triple` exit with `status`.
    pub fn failing_build(mut self, triple: &str, status: i32) -> Self {
        self.fail_build_on = Some((triple.to_string(), status));
        self
    }

    /// Makes xcodebuild exit with `status`.
    pub fn failing_merge(mut self, status: i32) -> Self {
        self.merge = MergeBehavior::Fail(status);
        self
    }

    /// Makes xcodebuild report success without producing a bundle.
    pub fn silent_merge(mut self) -> Self {
        self.merge = MergeBehavior::Silent;
        self
    }

    /// Makes xcodebuild produce an unexpected additional slice.
    pub fn extra_merge_slice(mut self) -> Self {
        self.merge = MergeBehavior::ExtraSlice;
        self
    }

    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.program() == program)
            .cloned()
            .collect()
    }

    fn ok(stdout: impl Into<Vec<u8>>) -> ToolOutput {
        ToolOutput {
            status: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn rustup(&self, inv: &Invocation) -> io::Result<ToolOutput> {
        let args = inv.arg_strings();
        let mut installed = self.installed.lock().unwrap();
        if args.get(1).map(String::as_str) == Some("add") {
            if let Some(triple) = args.get(2) {
                installed.insert(triple.clone());
            }
            return Ok(Self::ok(Vec::new()));
        }
        let listing: String = installed.iter().map(|t| format!("{}\n", t)).collect();
        Ok(Self::ok(listing))
    }

    fn cargo(&self, inv: &Invocation) -> io::Result<ToolOutput> {
        let triple = inv.arg_value("--target").unwrap_or_default();
        if let Some((failing, status)) = &self.fail_build_on {
            if *failing == triple {
                return Ok(ToolOutput {
                    status: Some(*status),
                    success: false,
                    stdout: Vec::new(),
                    stderr: format!("error: could not compile `leaf-ffi` for {}", triple),
                });
            }
        }
        let mode = if inv.has_arg("--release") { "release" } else { "debug" };
        let dir = PathBuf::from(inv.arg_value("--target-dir").unwrap_or_default())
            .join(&triple)
            .join(mode);
        fs::create_dir_all(&dir)?;
        // The archive records the codegen options it was built with.
        let options = CompilerFlags::decode_options(
            inv.env_value("CARGO_ENCODED_RUSTFLAGS").unwrap_or_default(),
        );
        fs::write(dir.join("libleaf.a"), options.join("\n"))?;
        Ok(Self::ok(Vec::new()))
    }

    fn xcodebuild(&self, inv: &Invocation) -> io::Result<ToolOutput> {
        match self.merge {
            MergeBehavior::Fail(status) => {
                return Ok(ToolOutput {
                    status: Some(status),
                    success: false,
                    stdout: Vec::new(),
                    stderr: "error: unable to create xcframework".into(),
                });
            }
            MergeBehavior::Silent => return Ok(Self::ok(Vec::new())),
            MergeBehavior::Normal | MergeBehavior::ExtraSlice => {}
        }
        let output = PathBuf::from(inv.arg_value("-output").unwrap_or_default());
        fs::create_dir_all(&output)?;
        fs::write(output.join("Info.plist"), "<plist version=\"1.0\"/>")?;
        for library in inv.arg_values("-library") {
            let library = PathBuf::from(library);
            let slice_name = library
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let slice = output.join(slice_name);
            fs::create_dir_all(slice.join("Headers"))?;
            fs::copy(&library, slice.join("libleaf.a"))?;
        }
        if self.merge == MergeBehavior::ExtraSlice {
            fs::create_dir_all(output.join("macos-arm64"))?;
            fs::write(output.join("macos-arm64/libleaf.a"), "unexpected")?;
        }
        Ok(Self::ok(Vec::new()))
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        match invocation.program() {
            "rustup" => self.rustup(invocation),
            "cargo" => self.cargo(invocation),
            "cbindgen" => Ok(Self::ok(HEADER)),
            "xcodebuild" => self.xcodebuild(invocation),
            other => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", other),
            )),
        }
    }
}

/// A workspace holding every required marker and the binding inputs.
pub fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("Cargo.toml"), "[workspace]\nmembers = [\"leaf\", \"leaf-ffi\", \"leaf-cli\"]\n").unwrap();
    fs::create_dir_all(root.join("leaf/src")).unwrap();
    fs::create_dir_all(root.join("leaf-ffi/src")).unwrap();
    fs::create_dir_all(root.join("leaf-cli/src")).unwrap();
    fs::write(root.join("leaf-ffi/src/lib.rs"), "#[no_mangle]\npub extern \"C\" fn leaf_run() {}\n").unwrap();
    fs::write(root.join("leaf-ffi/cbindgen.toml"), "language = \"C\"\n").unwrap();
    temp
}

/// Relative paths of every file under `dir`, sorted.
pub fn tree(dir: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.display().to_string());
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}
