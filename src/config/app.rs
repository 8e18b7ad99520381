// src/config/app.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.json";
pub const ENV_CONFIG_PATH: &str = "RECAP_CONFIG_PATH";

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_sela_base_url() -> String {
    "https://api.selanetwork.io".to_string()
}
fn default_sela_timeout() -> u64 {
    120
}
fn default_static_dir() -> String {
    "out".to_string()
}
fn default_agent_path() -> String {
    "agents/default/AGENT.md".to_string()
}
fn env_marker() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelaConfig {
    /// "ENV" means: read from SELA_API_KEY
    #[serde(default = "env_marker")]
    pub api_key: String,
    #[serde(default = "default_sela_base_url")]
    pub base_url: String,
    #[serde(default = "default_sela_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "OpenAiConfig::unresolved")]
    pub openai: OpenAiConfig,
    #[serde(default = "SelaConfig::unresolved")]
    pub sela: SelaConfig,
    /// Exported frontend; served only if the directory exists.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_agent_path")]
    pub agent_path: String,
}

impl OpenAiConfig {
    fn unresolved() -> Self {
        Self {
            api_key: env_marker(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

impl SelaConfig {
    fn unresolved() -> Self {
        Self {
            api_key: env_marker(),
            base_url: default_sela_base_url(),
            timeout_secs: default_sela_timeout(),
        }
    }
}

fn is_env_marker(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("env")
}

/// Missing keys resolve to empty; the clients report that per request.
fn resolve_key(value: &mut String, var: &str) {
    if is_env_marker(value) {
        *value = env::var(var).unwrap_or_default();
    }
}

fn override_from_env(value: &mut String, var: &str) {
    if let Ok(v) = env::var(var) {
        if !v.trim().is_empty() {
            *value = v;
        }
    }
}

impl AppConfig {
    /// Every field from the environment (after defaults).
    pub fn from_env() -> Self {
        let mut cfg = AppConfig {
            openai: OpenAiConfig::unresolved(),
            sela: SelaConfig::unresolved(),
            static_dir: default_static_dir(),
            agent_path: default_agent_path(),
        };
        cfg.apply_env();
        cfg
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AppConfig = serde_json::from_str(&data)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// $RECAP_CONFIG_PATH, then config/app.json, then plain environment.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            if !Path::new(&p).exists() {
                anyhow::bail!("{ENV_CONFIG_PATH} points to non-existent path: {p}");
            }
            return Self::load_from_file(p);
        }
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            return Self::load_from_file(DEFAULT_CONFIG_PATH);
        }
        Ok(Self::from_env())
    }

    fn apply_env(&mut self) {
        resolve_key(&mut self.openai.api_key, "OPENAI_API_KEY");
        resolve_key(&mut self.sela.api_key, "SELA_API_KEY");

        override_from_env(&mut self.openai.model, "OPENAI_MODEL");
        override_from_env(&mut self.openai.base_url, "OPENAI_BASE_URL");
        override_from_env(&mut self.sela.base_url, "SELA_API_BASE_URL");
        override_from_env(&mut self.static_dir, "RECAP_STATIC_DIR");
        override_from_env(&mut self.agent_path, "RECAP_AGENT_PATH");

        if let Some(secs) = env::var("SELA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            self.sela.timeout_secs = secs;
        }
    }
}
