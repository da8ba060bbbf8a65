use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::{BackendKind, BackendSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Text-generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Backend tried first
    #[serde(default = "default_provider")]
    pub provider: BackendKind,
    /// Model for the primary backend; overrides that backend's section
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    /// Backends tried, in order, after the primary fails to initialize
    #[serde(default = "default_fallback")]
    pub fallback: Vec<BackendKind>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub huggingface: BackendConfig,
    #[serde(default)]
    pub ollama: BackendConfig,
    #[serde(default)]
    pub openai: BackendConfig,
}

/// Per-backend overrides. Unset fields fall back to the provider defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: 0.0,
            fallback: default_fallback(),
            timeout_secs: default_llm_timeout_secs(),
            huggingface: BackendConfig::default(),
            ollama: BackendConfig::default(),
            openai: BackendConfig::default(),
        }
    }
}

fn default_provider() -> BackendKind {
    BackendKind::Ollama
}

fn default_fallback() -> Vec<BackendKind> {
    BackendKind::ALL.to_vec()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    pub fn backend(&self, kind: BackendKind) -> &BackendConfig {
        match kind {
            BackendKind::HuggingFace => &self.huggingface,
            BackendKind::Ollama => &self.ollama,
            BackendKind::OpenAi => &self.openai,
        }
    }

    /// Resolve construction settings for one backend, reading its API key
    /// from the environment.
    pub fn settings_for(&self, kind: BackendKind) -> BackendSettings {
        let section = self.backend(kind);
        let api_key_env = section
            .api_key_env
            .clone()
            .or_else(|| kind.default_api_key_env().map(String::from));
        let api_key = api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty());

        let model = if kind == self.provider {
            self.model.clone().or_else(|| section.model.clone())
        } else {
            section.model.clone()
        };

        BackendSettings {
            kind,
            base_url: section
                .base_url
                .clone()
                .unwrap_or_else(|| kind.default_base_url().to_string()),
            model: model.unwrap_or_else(|| kind.default_model().to_string()),
            api_key,
            api_key_env,
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Image generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_enabled")]
    pub enabled: bool,
    #[serde(default = "default_image_model")]
    pub model_id: String,
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_api_key_env")]
    pub api_key_env: String,
    /// Keep generated images on disk as well as in memory
    #[serde(default = "default_disk_cache")]
    pub disk_cache: bool,
    /// Directory for cached images; an empty path keeps the cache in memory
    #[serde(default = "default_image_cache_dir")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_image_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: default_images_enabled(),
            model_id: default_image_model(),
            base_url: default_image_base_url(),
            api_key_env: default_image_api_key_env(),
            disk_cache: default_disk_cache(),
            cache_dir: default_image_cache_dir(),
            cache_capacity: default_image_cache_capacity(),
            num_inference_steps: default_inference_steps(),
            guidance_scale: default_guidance_scale(),
            timeout_secs: default_image_timeout_secs(),
        }
    }
}

impl ImagesConfig {
    /// Directory for the on-disk cache layer, or `None` for memory only.
    pub fn disk_cache_dir(&self) -> Option<PathBuf> {
        if !self.disk_cache {
            return None;
        }
        self.cache_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}

fn default_images_enabled() -> bool {
    true
}

fn default_image_model() -> String {
    "stabilityai/stable-diffusion-xl-base-1.0".to_string()
}

fn default_image_base_url() -> String {
    "https://router.huggingface.co/hf-inference/models".to_string()
}

fn default_disk_cache() -> bool {
    true
}

fn default_image_api_key_env() -> String {
    "HF_TOKEN".to_string()
}

fn default_image_cache_dir() -> Option<PathBuf> {
    Some(PathBuf::from(".kgquery/image-cache"))
}

fn default_image_cache_capacity() -> usize {
    32
}

pub fn default_inference_steps() -> u32 {
    50
}

pub fn default_guidance_scale() -> f32 {
    7.5
}

fn default_image_timeout_secs() -> u64 {
    300
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGQUERY_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (built-in defaults when absent)
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config = match std::env::var("KGQUERY_CONFIG") {
            Ok(path) => Self::from_file(PathBuf::from(path))?,
            Err(_) => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    log::info!("No config.toml found, using built-in defaults");
                    Config::default()
                }
            }
        };

        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self> {
        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be between 0.0 and 1.0");
        }

        for kind in BackendKind::ALL {
            if let Some(base_url) = &self.llm.backend(kind).base_url {
                url::Url::parse(base_url)
                    .with_context(|| format!("llm.{}.base_url is not a valid URL", kind))?;
            }
        }

        url::Url::parse(&self.images.base_url).context("images.base_url is not a valid URL")?;

        if self.images.num_inference_steps == 0 {
            anyhow::bail!("images.num_inference_steps must be greater than 0");
        }

        if self.images.guidance_scale < 0.0 {
            anyhow::bail!("images.guidance_scale must not be negative");
        }

        if self.http_server.port == 0 {
            anyhow::bail!("http_server.port must be greater than 0");
        }

        Ok(())
    }
}
