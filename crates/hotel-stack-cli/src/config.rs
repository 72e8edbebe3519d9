//! Configuration loading and resolution.
//!
//! Each file is resolved in order: explicit flag, then environment variable,
//! then a file in `./.hotel-stack/`, then the built-in default.

use anyhow::Context;
use hotel_stack::{RuleSet, ScanConfig, ScoringPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HOTEL_STACK_CONFIG";
pub const RULES_ENV: &str = "HOTEL_STACK_RULES";

const LOCAL_DIR: &str = ".hotel-stack";

/// Contents of a config file. Missing sections take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub scoring: ScoringPolicy,
}

/// Resolve a file path: explicit → `env_var` → `./.hotel-stack/<local_name>`.
pub fn resolve_path<F>(explicit: Option<&str>, env_var: &str, local_name: &str, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Some(env_path) = lookup(env_var).filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(env_path));
    }

    let local = PathBuf::from(LOCAL_DIR).join(local_name);
    local.exists().then_some(local)
}

pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    resolve_path(explicit, CONFIG_ENV, "config.json", |k| std::env::var(k).ok())
}

pub fn resolve_rules_path(explicit: Option<&str>) -> Option<PathBuf> {
    resolve_path(explicit, RULES_ENV, "rules.json", |k| std::env::var(k).ok())
}

/// Load config from `path`, or defaults. Env overrides apply either way.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            serde_json::from_str::<AppConfig>(&raw)
                .with_context(|| format!("parsing config file {}", p.display()))?
        }
        None => AppConfig::default(),
    };
    config
        .scoring
        .validate()
        .context("invalid scoring policy")?;
    config.scan = config.scan.with_env_overrides();
    Ok(config)
}

/// Load rules from `path`, or the embedded defaults.
pub fn load_rules(path: Option<&Path>) -> anyhow::Result<RuleSet> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)
                .with_context(|| format!("reading rule file {}", p.display()))?;
            RuleSet::from_json(&raw).with_context(|| format!("loading rule file {}", p.display()))
        }
        None => Ok(RuleSet::builtin()),
    }
}
