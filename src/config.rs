//! Configuration loading.
//!
//! Precedence, lowest to highest: global `~/.config/bundr/config.toml`,
//! project-local `.bundr.toml`, environment variables, CLI flags. The
//! standard `AWS_REGION`/`AWS_PROFILE` variables act as a fallback below the
//! `BUNDR_*` ones.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde::{Deserialize, Serialize};

const GLOBAL_CONFIG_FILE: &str = "config.toml";
const PROJECT_CONFIG_FILE: &str = ".bundr.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub kms_key_id: Option<String>,
}

/// Loads configuration from the default locations plus the environment.
pub fn load() -> Result<Config> {
    let cwd = env::current_dir().context("resolve current directory")?;
    let global_dir = user_config_dir().map(|dir| dir.join("bundr"));
    let mut config = load_files(global_dir.as_deref(), &cwd)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Loads and merges the TOML files only; exposed for tests.
pub fn load_files(global_dir: Option<&Path>, project_dir: &Path) -> Result<Config> {
    let mut figment = Figment::new();

    if let Some(dir) = global_dir {
        let path = dir.join(GLOBAL_CONFIG_FILE);
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
    }

    let project = project_dir.join(PROJECT_CONFIG_FILE);
    if project.exists() {
        figment = figment.merge(Toml::file(project));
    }

    figment
        .extract()
        .context("failed to load configuration files")
}

/// Applies environment overrides. `BUNDR_*` variables win over the standard
/// AWS ones.
pub fn apply_env_overrides(config: &mut Config) {
    for (var, slot) in [
        ("AWS_REGION", &mut config.aws.region),
        ("AWS_PROFILE", &mut config.aws.profile),
    ] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
    }

    for (var, slot) in [
        ("BUNDR_AWS_REGION", &mut config.aws.region),
        ("BUNDR_AWS_PROFILE", &mut config.aws.profile),
        ("BUNDR_AWS_KMS_KEY_ID", &mut config.aws.kms_key_id),
    ] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                *slot = Some(value);
            }
        }
    }
}

/// Applies command-line flag overrides; `None` leaves the current value.
pub fn apply_cli_overrides(
    config: &mut Config,
    region: Option<&str>,
    profile: Option<&str>,
    kms_key_id: Option<&str>,
) {
    if let Some(region) = region {
        config.aws.region = Some(region.to_string());
    }
    if let Some(profile) = profile {
        config.aws.profile = Some(profile.to_string());
    }
    if let Some(kms_key_id) = kms_key_id {
        config.aws.kms_key_id = Some(kms_key_id.to_string());
    }
}

/// `$XDG_CONFIG_HOME` when absolute, otherwise `$HOME/.config`.
fn user_config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
        let dir = PathBuf::from(dir);
        if dir.is_absolute() {
            return Some(dir);
        }
    }
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}
