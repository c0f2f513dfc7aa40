use std::{fs, time::Duration};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "device_sim.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub latency: Duration,
    pub sources: Vec<String>,
    pub initial_source: Option<String>,
    pub max_volume: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            latency: Duration::from_millis(50),
            sources: ["00", "01", "02", "03", "04", "05"]
                .into_iter()
                .map(String::from)
                .collect(),
            initial_source: None,
            max_volume: 80,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_addr: Option<String>,
    latency_ms: Option<u64>,
    sources: Option<Vec<String>>,
    initial_source: Option<String>,
    max_volume: Option<u8>,
}

/// Defaults, then `device_sim.toml` when present, then environment.
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

    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.latency_ms {
        settings.latency = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.sources.filter(|sources| !sources.is_empty()) {
        settings.sources = v;
    }
    if let Some(v) = file_cfg.initial_source {
        settings.initial_source = Some(v);
    }
    if let Some(v) = file_cfg.max_volume {
        settings.max_volume = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SIM_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = var("APP__LATENCY_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.latency = Duration::from_millis(parsed);
        }
    }

    if let Some(v) = var("APP__SOURCES") {
        let sources = parse_sources(&v);
        if !sources.is_empty() {
            settings.sources = sources;
        }
    }
}

fn parse_sources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
