use std::{fs, path::PathBuf, time::Duration};

use anyhow::Context;
use panel_core::{transport::DEFAULT_REQUEST_TIMEOUT, DEFAULT_FIRST_REPEAT_DELAY};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "remote.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub device_url: String,
    pub layout_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub repeat_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_url: "http://127.0.0.1:8080".into(),
            layout_path: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            repeat_delay: DEFAULT_FIRST_REPEAT_DELAY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    device_url: Option<String>,
    layout_path: Option<PathBuf>,
    request_timeout_ms: Option<u64>,
    repeat_delay_ms: Option<u64>,
}

/// Defaults, then `remote.toml` when present, then environment. Command-line
/// flags are applied by the caller on top.
pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(CONFIG_FILE) {
        apply_file(&mut settings, &raw).with_context(|| format!("invalid {CONFIG_FILE}"))?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileConfig = toml::from_str(raw)?;

    if let Some(v) = file_cfg.device_url {
        settings.device_url = v;
    }
    if let Some(v) = file_cfg.layout_path {
        settings.layout_path = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.repeat_delay_ms {
        settings.repeat_delay = Duration::from_millis(v);
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("REMOTE_DEVICE_URL") {
        settings.device_url = v;
    }
    if let Some(v) = var("APP__DEVICE_URL") {
        settings.device_url = v;
    }

    if let Some(v) = var("APP__LAYOUT_PATH") {
        settings.layout_path = Some(PathBuf::from(v));
    }

    if let Some(parsed) = var("APP__REQUEST_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
        settings.request_timeout = Duration::from_millis(parsed);
    }
    if let Some(parsed) = var("APP__REPEAT_DELAY_MS").and_then(|v| v.trim().parse().ok()) {
        settings.repeat_delay = Duration::from_millis(parsed);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
