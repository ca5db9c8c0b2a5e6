//! Common utilities shared by the pipeline steps.
//!
//! This module provides:
//! - Filesystem helpers for destroying and staging output locations
//! - Git and rustc probes used for build metadata

use std::fs;
use std::io;
use std::path::Path;

use crate::runner::{Invocation, ToolRunner};

/// Removes `path` whether it is a file, a symlink or a directory tree.
/// A path that does not exist is not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Deletes and recreates `dir` so it starts out empty.
pub fn recreate_dir(dir: &Path) -> io::Result<()> {
    remove_path(dir)?;
    fs::create_dir_all(dir)
}

/// Trimmed stdout of a probe command, or `None` if it failed or printed nothing.
fn probe(runner: &dyn ToolRunner, invocation: &Invocation) -> Option<String> {
    let output = runner.run(invocation).ok()?;
    if !output.success {
        return None;
    }
    let text = output.stdout_lossy().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// Gets the current git commit hash (short form).
pub fn get_git_commit(runner: &dyn ToolRunner, dir: &Path) -> Option<String> {
    probe(
        runner,
        &Invocation::new("git", "git rev-parse")
            .args(["rev-parse", "--short", "HEAD"])
            .current_dir(dir),
    )
}

/// Gets the current git branch name.
pub fn get_git_branch(runner: &dyn ToolRunner, dir: &Path) -> Option<String> {
    probe(
        runner,
        &Invocation::new("git", "git rev-parse")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir),
    )
    .filter(|branch| branch != "HEAD")
}

/// Gets the Rust version.
pub fn get_rust_version(runner: &dyn ToolRunner) -> Option<String> {
    probe(runner, &Invocation::new("rustc", "rustc --version").arg("--version"))
}
