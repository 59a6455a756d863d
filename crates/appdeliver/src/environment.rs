use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use appdeliver_process::{run_command, which};
use serde::Serialize;

/// Overrides the program used to run altool (normally `xcrun`).
pub const XCRUN_BIN_ENV: &str = "APPDELIVER_XCRUN_BIN";
/// Overrides the program queried for the Xcode version.
pub const XCODEBUILD_BIN_ENV: &str = "APPDELIVER_XCODEBUILD_BIN";

pub fn xcrun_program() -> String {
    env::var(XCRUN_BIN_ENV).unwrap_or_else(|_| "xcrun".to_string())
}

fn xcodebuild_program() -> String {
    env::var(XCODEBUILD_BIN_ENV).unwrap_or_else(|_| "xcodebuild".to_string())
}

/// Major version from `xcodebuild -version` output, e.g. `Xcode 26.0.1` -> 26.
pub fn parse_xcode_major_version(output: &str) -> Option<u32> {
    let line = output.lines().find(|l| l.trim_start().starts_with("Xcode "))?;
    let version = line.trim_start().strip_prefix("Xcode ")?.trim();
    version.split('.').next()?.parse().ok()
}

/// Run `xcodebuild -version` and return the Xcode major version.
pub fn detect_xcode_major_version() -> Result<u32> {
    let program = xcodebuild_program();
    let out = run_command(&program, &["-version"])?;
    out.ok()
        .with_context(|| format!("{program} -version failed"))?;
    match parse_xcode_major_version(&out.stdout) {
        Some(major) => Ok(major),
        None => bail!(
            "failed to parse Xcode version from: {}",
            out.stdout.trim()
        ),
    }
}

/// What `doctor` reports about the local toolchain.
#[derive(Debug, Clone, Serialize)]
pub struct ToolEnvironment {
    pub appdeliver_version: String,
    pub program: String,
    pub program_path: Option<PathBuf>,
    pub xcode_major_version: Option<u32>,
    pub os: String,
    pub arch: String,
}

pub fn collect_tool_environment() -> ToolEnvironment {
    let program = xcrun_program();
    ToolEnvironment {
        appdeliver_version: env!("CARGO_PKG_VERSION").to_string(),
        program_path: which(&program),
        program,
        xcode_major_version: detect_xcode_major_version().ok(),
        os: env::consts::OS.to_string(),
        arch: env::consts::ARCH.to_string(),
    }
}
