// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform Probe (C2).
//!
//! Agent container images are published for `linux/amd64` only. On Apple
//! Silicon hosts Docker Desktop will otherwise pick a `linux/arm64` variant
//! that does not exist, so the probe forces `--platform=linux/amd64` and
//! warns if Rosetta is missing (arm64 images under emulation fail silently
//! without it).

use std::process::Command;

/// The platform string to force on this host, if any.
pub fn forced_platform() -> Option<String> {
    if cfg!(target_os = "macos") && is_apple_silicon() {
        Some("linux/amd64".into())
    } else {
        None
    }
}

fn is_apple_silicon() -> bool {
    if cfg!(target_arch = "aarch64") {
        return true;
    }
    mac_hardware_is_apple_silicon()
}

fn mac_hardware_is_apple_silicon() -> bool {
    if !cfg!(target_os = "macos") {
        return false;
    }
    let Ok(output) = Command::new("sysctl").args(["-n", "hw.optional.arm64"]).output() else {
        return false;
    };
    String::from_utf8_lossy(&output.stdout).trim() == "1"
}

/// Whether Rosetta 2 is installed, for hosts that need `linux/amd64` under
/// emulation. `None` when the question doesn't apply (non-Apple-Silicon).
pub fn has_rosetta() -> Option<bool> {
    if forced_platform().as_deref() != Some("linux/amd64") {
        return None;
    }
    let output = Command::new("pkgutil")
        .args(["--pkg-info", "com.apple.pkg.RosettaUpdateAuto"])
        .output()
        .ok()?;
    Some(output.status.success())
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
