//! Per-variant compiler flags.
//!
//! [`CompilerFlags`] is computed from a [`BuildMode`] alone and handed to
//! exactly one compiler invocation. It is encoded into that child's
//! `CARGO_ENCODED_RUSTFLAGS`; the flag variables a parent shell may have
//! exported are removed from the child, so nothing set for one variant can
//! reach another.

use crate::types::{BuildMode, SplitDebuginfo};

/// Separator Cargo expects between entries of `CARGO_ENCODED_RUSTFLAGS`.
const ENCODED_SEPARATOR: &str = "\x1f";

/// Flag variables that must never be inherited by a compiler invocation.
pub const INHERITED_FLAG_VARS: [&str; 3] =
    ["RUSTFLAGS", "CARGO_ENCODED_RUSTFLAGS", "CARGO_BUILD_RUSTFLAGS"];

/// Codegen settings for one compilation.
///
/// # Example
///
/// ```
/// use xcpack_sdk::builders::CompilerFlags;
/// use xcpack_sdk::BuildMode;
///
/// let release = CompilerFlags::for_mode(BuildMode::Release, None);
/// assert!(release.codegen_options().contains(&"opt-level=3".to_string()));
/// assert!(!release.has_debug_info());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerFlags {
    opt_level: &'static str,
    codegen_units: Option<u32>,
    target_cpu: Option<&'static str>,
    debuginfo: u8,
    strip: Option<&'static str>,
    split_debuginfo: Option<SplitDebuginfo>,
}

impl CompilerFlags {
    /// Derives the flags for `mode`.
    ///
    /// Release: maximum optimization, one codegen unit, host-tuned codegen,
    /// no debug sections. Debug: no optimization, full debug info, laid out
    /// according to `split_debuginfo`.
    pub fn for_mode(mode: BuildMode, split_debuginfo: Option<SplitDebuginfo>) -> Self {
        match mode {
            BuildMode::Release => Self {
                opt_level: "3",
                codegen_units: Some(1),
                target_cpu: Some("native"),
                debuginfo: 0,
                strip: Some("debuginfo"),
                split_debuginfo: None,
            },
            BuildMode::Debug => Self {
                opt_level: "0",
                codegen_units: None,
                target_cpu: None,
                debuginfo: 2,
                strip: None,
                split_debuginfo,
            },
        }
    }

    /// `-C` option values in a stable order.
    pub fn codegen_options(&self) -> Vec<String> {
        let mut options = vec![format!("opt-level={}", self.opt_level)];
        if let Some(units) = self.codegen_units {
            options.push(format!("codegen-units={}", units));
        }
        if let Some(cpu) = self.target_cpu {
            options.push(format!("target-cpu={}", cpu));
        }
        options.push(format!("debuginfo={}", self.debuginfo));
        if let Some(strip) = self.strip {
            options.push(format!("strip={}", strip));
        }
        if let Some(split) = self.split_debuginfo {
            options.push(format!("split-debuginfo={}", split.as_str()));
        }
        options
    }

    /// Flags as `rustc` arguments (`-C opt-level=3 ...`).
    pub fn rustc_args(&self) -> Vec<String> {
        self.codegen_options()
            .into_iter()
            .flat_map(|option| ["-C".to_string(), option])
            .collect()
    }

    /// Value for `CARGO_ENCODED_RUSTFLAGS`.
    pub fn encoded(&self) -> String {
        self.rustc_args().join(ENCODED_SEPARATOR)
    }

    /// Decodes a `CARGO_ENCODED_RUSTFLAGS` value back into `-C` option values.
    pub fn decode_options(encoded: &str) -> Vec<String> {
        encoded
            .split(ENCODED_SEPARATOR)
            .filter(|part| !part.is_empty() && *part != "-C")
            .map(str::to_string)
            .collect()
    }

    pub fn has_debug_info(&self) -> bool {
        self.debuginfo > 0
    }
}

/// Target-specific flag variable Cargo consults for `triple`,
/// e.g. `CARGO_TARGET_AARCH64_APPLE_IOS_RUSTFLAGS`.
pub fn target_flag_var(triple: &str) -> String {
    format!(
        "CARGO_TARGET_{}_RUSTFLAGS",
        triple.to_uppercase().replace(['-', '.'], "_")
    )
}
