//! External command seam.
//!
//! Every collaborator the pipeline drives (`rustup`, `cargo`, `cbindgen`,
//! `xcodebuild`) is described by an [`Invocation`] value and executed through a
//! [`ToolRunner`]. An invocation carries its own environment overrides, so the
//! configuration of one call can never leak into the next one through the
//! parent process environment.
//!
//! [`SystemRunner`] spawns real processes. Tests substitute a recording runner.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// A fully described external command.
///
/// # Example
///
/// ```
/// use xcpack_sdk::runner::Invocation;
///
/// let inv = Invocation::new("cargo", "cargo build")
///     .args(["build", "--release"])
///     .env("LC_ALL", "C")
///     .env_remove("RUSTFLAGS");
/// assert_eq!(inv.env_value("LC_ALL"), Some("C"));
/// assert!(inv.has_arg("--release"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    description: String,
    args: Vec<OsString>,
    envs: BTreeMap<String, String>,
    env_removals: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl Invocation {
    /// Creates an invocation of `program`, described as `description` in
    /// progress output and error messages.
    pub fn new(program: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            description: description.into(),
            args: Vec::new(),
            envs: BTreeMap::new(),
            env_removals: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets an environment variable for this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env_removals.retain(|k| *k != key);
        self.envs.insert(key, value.into());
        self
    }

    /// Keeps an inherited environment variable away from this invocation.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.envs.remove(&key);
        if !self.env_removals.contains(&key) {
            self.env_removals.push(key);
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn args_os(&self) -> &[OsString] {
        &self.args
    }

    /// Arguments as lossy UTF-8 strings, for display and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Value following `flag` in the argument list, if any.
    pub fn arg_value(&self, flag: &str) -> Option<String> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args
            .get(pos + 1)
            .map(|a| a.to_string_lossy().into_owned())
    }

    /// Every value following each occurrence of `flag`.
    pub fn arg_values(&self, flag: &str) -> Vec<String> {
        self.args
            .windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].to_string_lossy().into_owned())
            .collect()
    }

    pub fn envs(&self) -> &BTreeMap<String, String> {
        &self.envs
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs.get(key).map(String::as_str)
    }

    pub fn env_removals(&self) -> &[String] {
        &self.env_removals
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Shell-like rendering including environment overrides.
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(self.program.clone());
        parts.extend(self.arg_strings().iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }

    /// Builds the [`Command`] for this invocation.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for key in &self.env_removals {
            cmd.env_remove(key);
        }
        cmd.envs(&self.envs);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''").replace('\x1f', "\\x1f"))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Executes invocations.
///
/// Implementations must be shareable across threads so the build matrix can
/// run variants in parallel when asked to.
pub trait ToolRunner: Send + Sync {
    /// Runs the invocation to completion. An `Err` means the process could not
    /// be started at all.
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        (**self).run(invocation)
    }
}

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ToolOutput> {
        let output = invocation.to_command().output()?;
        Ok(ToolOutput {
            status: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A tool that could not be started or exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub description: String,
    pub command_line: String,
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Set when the process could not be spawned.
    pub spawn_error: Option<String>,
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.spawn_error {
            return write!(
                f,
                "Failed to start {}.\n\n\
                 Command: {}\n\
                 Error: {}\n\n\
                 Ensure the tool is installed and available on PATH.",
                self.description, self.command_line, err
            );
        }
        let status = self
            .status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "terminated by signal".to_string());
        write!(
            f,
            "{} failed.\n\n\
             Command: {}\n\
             Exit status: {}\n\n\
             Stdout:\n{}\n\n\
             Stderr:\n{}",
            self.description, self.command_line, status, self.stdout, self.stderr
        )
    }
}

/// Runs an invocation with consistent error handling.
///
/// Captures both stdout and stderr on failure and formats them, together with
/// the exact command line, into a [`ToolFailure`].
pub fn run_tool(runner: &dyn ToolRunner, invocation: &Invocation) -> Result<ToolOutput, ToolFailure> {
    debug!(command = %invocation, "running {}", invocation.description());

    let output = runner.run(invocation).map_err(|e| ToolFailure {
        description: invocation.description().to_string(),
        command_line: invocation.command_line(),
        status: None,
        stdout: String::new(),
        stderr: String::new(),
        spawn_error: Some(e.to_string()),
    })?;

    if !output.success {
        return Err(ToolFailure {
            description: invocation.description().to_string(),
            command_line: invocation.command_line(),
            status: output.status,
            stdout: output.stdout_lossy(),
            stderr: output.stderr,
            spawn_error: None,
        });
    }

    debug!(status = ?output.status, "{} finished", invocation.description());
    Ok(output)
}
