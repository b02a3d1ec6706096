// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Plugin Registry (C7).
//!
//! Each plugin knows how to turn a prompt into an argv for its own CLI, and
//! which extra mounts and environment variables its CLI needs. The registry
//! is a static lookup table; there is no dynamic plugin loading.

use arn_core::container::Mount;
use std::path::{Path, PathBuf};

const CONTAINER_HOME: &str = "/home/midori-ai";
pub const CONTAINER_WORKDIR: &str = "/home/midori-ai/workspace";

const PASSTHROUGH_COMMANDS: &[&str] =
    &["echo", "sh", "bash", "true", "false", "/bin/sh", "/bin/bash", "/usr/bin/sh", "/usr/bin/bash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub requires_github_token: bool,
}

/// Everything the Supervisor needs to know about how to talk to one CLI.
pub struct AgentPlugin {
    pub name: &'static str,
    pub display_name: &'static str,
    pub capabilities: Capabilities,
    container_config_dir: fn() -> PathBuf,
    default_host_config_dir: fn() -> PathBuf,
    additional_config_mounts: fn(&Path) -> Vec<Mount>,
    build_noninteractive_argv: fn(&str, &[String], &PluginContext) -> Vec<String>,
    build_interactive_command_parts: fn(&[String], &[String], &str, bool) -> Vec<String>,
}

/// Per-invocation paths the plugin needs to render its argv.
pub struct PluginContext {
    pub workspace_host: PathBuf,
    pub workspace_container: PathBuf,
    pub config_host: PathBuf,
    pub config_container: PathBuf,
    /// True when `workspace_host` is not the root of a git repository.
    pub workspace_is_non_git: bool,
}

/// Looks up a registered plugin by name, or the passthrough test-command
/// path when `name` is one of the fixed debug commands.
pub fn lookup(name: &str) -> Option<&'static AgentPlugin> {
    PLUGINS.iter().find(|p| p.name == name)
}

pub fn is_passthrough_command(name: &str) -> bool {
    PASSTHROUGH_COMMANDS.contains(&name)
}

/// Build the non-interactive argv for a prompt, handling passthrough test
/// commands before consulting the registry.
pub fn build_noninteractive_argv(
    agent: &str,
    prompt: &str,
    extra_args: &[String],
    ctx: &PluginContext,
) -> Vec<String> {
    if is_passthrough_command(agent) {
        let mut args = vec![agent.to_string()];
        args.extend(extra_args.iter().cloned());
        let has_c_flag = extra_args.iter().any(|a| a == "-c");
        let prompt = prompt.trim();
        if !prompt.is_empty() && agent != "true" && agent != "false" && !has_c_flag {
            args.push(prompt.to_string());
        }
        return args;
    }

    match lookup(agent) {
        Some(plugin) => (plugin.build_noninteractive_argv)(prompt, extra_args, ctx),
        None => vec![agent.to_string(), prompt.to_string()],
    }
}

pub fn build_interactive_command_parts(
    agent: &str,
    user_parts: &[String],
    extra_args: &[String],
    prompt: &str,
    help_mode: bool,
) -> Vec<String> {
    if is_passthrough_command(agent) {
        let mut args = vec![agent.to_string()];
        args.extend(user_parts.iter().cloned());
        return args;
    }
    match lookup(agent) {
        Some(plugin) => (plugin.build_interactive_command_parts)(user_parts, extra_args, prompt, help_mode),
        None => vec![agent.to_string()],
    }
}

pub fn container_config_dir(agent: &str) -> PathBuf {
    lookup(agent).map(|p| (p.container_config_dir)()).unwrap_or_else(|| PathBuf::from(format!("{CONTAINER_HOME}/.codex")))
}

pub fn default_host_config_dir(agent: &str) -> PathBuf {
    lookup(agent)
        .map(|p| (p.default_host_config_dir)())
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".codex"))
}

pub fn requires_github_token(agent: &str) -> bool {
    lookup(agent).map(|p| p.capabilities.requires_github_token).unwrap_or(false)
}

pub fn additional_config_mounts(agent: &str, host_config_dir: &Path) -> Vec<Mount> {
    if host_config_dir.as_os_str().is_empty() {
        return Vec::new();
    }
    lookup(agent).map(|p| (p.additional_config_mounts)(host_config_dir)).unwrap_or_default()
}

/// Strips flags that force non-interactive output from a user-supplied
/// argv, so interactive sessions never accidentally run headless.
fn strip_noninteractive_flags(parts: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(parts.len());
    let mut skip_next = false;
    for part in parts {
        if skip_next {
            skip_next = false;
            continue;
        }
        match part.as_str() {
            "-p" | "--print" | "--prompt" => continue,
            "--output-format" => {
                skip_next = true;
                continue;
            }
            _ if part.starts_with("--output-format=") => continue,
            _ => out.push(part.clone()),
        }
    }
    out
}

// --- codex --------------------------------------------------------------

fn codex_container_config_dir() -> PathBuf {
    PathBuf::from(format!("{CONTAINER_HOME}/.codex"))
}

fn codex_default_host_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CODEX_HOST_CODEX_DIR") {
        if !dir.trim().is_empty() {
            return shellexpand_home(dir.trim());
        }
    }
    shellexpand_home("~/.codex")
}

fn codex_additional_config_mounts(_host_config_dir: &Path) -> Vec<Mount> {
    Vec::new()
}

fn codex_noninteractive_argv(prompt: &str, extra_args: &[String], ctx: &PluginContext) -> Vec<String> {
    let mut argv = vec!["codex".to_string(), "exec".to_string()];
    if ctx.workspace_is_non_git {
        argv.push("--skip-git-repo-check".to_string());
    }
    argv.extend(extra_args.iter().cloned());
    argv.push(prompt.to_string());
    argv
}

fn codex_interactive_parts(
    user_parts: &[String],
    extra_args: &[String],
    prompt: &str,
    help_mode: bool,
) -> Vec<String> {
    if help_mode {
        return vec!["codex".to_string(), "--help".to_string()];
    }
    let mut argv = vec!["codex".to_string()];
    argv.extend(strip_noninteractive_flags(user_parts));
    argv.extend(extra_args.iter().cloned());
    if !prompt.trim().is_empty() {
        argv.push(prompt.to_string());
    }
    argv
}

// --- copilot --------------------------------------------------------------

fn copilot_container_config_dir() -> PathBuf {
    PathBuf::from(format!("{CONTAINER_HOME}/.copilot"))
}

fn copilot_default_host_config_dir() -> PathBuf {
    shellexpand_home("~/.copilot")
}

fn copilot_additional_config_mounts(host_config_dir: &Path) -> Vec<Mount> {
    vec![Mount::rw(host_config_dir.join("config.json"), PathBuf::from(format!("{CONTAINER_HOME}/.copilot/config.json")))]
}

fn copilot_noninteractive_argv(prompt: &str, extra_args: &[String], _ctx: &PluginContext) -> Vec<String> {
    let mut argv = vec!["copilot".to_string(), "-p".to_string(), prompt.to_string()];
    argv.extend(extra_args.iter().cloned());
    argv
}

fn copilot_interactive_parts(
    user_parts: &[String],
    extra_args: &[String],
    prompt: &str,
    help_mode: bool,
) -> Vec<String> {
    if help_mode {
        return vec!["copilot".to_string(), "--help".to_string()];
    }
    let mut argv = vec!["copilot".to_string()];
    argv.extend(strip_noninteractive_flags(user_parts));
    argv.extend(extra_args.iter().cloned());
    if !prompt.trim().is_empty() {
        argv.push(prompt.to_string());
    }
    argv
}

fn shellexpand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|h| h.join(rest)).unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

static PLUGINS: &[AgentPlugin] = &[
    AgentPlugin {
        name: "codex",
        display_name: "Codex CLI",
        capabilities: Capabilities { requires_github_token: false },
        container_config_dir: codex_container_config_dir,
        default_host_config_dir: codex_default_host_config_dir,
        additional_config_mounts: codex_additional_config_mounts,
        build_noninteractive_argv: codex_noninteractive_argv,
        build_interactive_command_parts: codex_interactive_parts,
    },
    AgentPlugin {
        name: "copilot",
        display_name: "GitHub Copilot CLI",
        capabilities: Capabilities { requires_github_token: true },
        container_config_dir: copilot_container_config_dir,
        default_host_config_dir: copilot_default_host_config_dir,
        additional_config_mounts: copilot_additional_config_mounts,
        build_noninteractive_argv: copilot_noninteractive_argv,
        build_interactive_command_parts: copilot_interactive_parts,
    },
];

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
