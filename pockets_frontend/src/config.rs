use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub api_url: String,
    pub http_timeout: Duration,
    pub data_dir: PathBuf,
    pub cache: CacheConfig,
    pub media: MediaConfig,
}

impl FrontendConfig {
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("POCKETS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = sanitize_base_url(api_url)?;
        let http_timeout = Duration::from_secs(env_number("POCKETS_HTTP_TIMEOUT_SECS").unwrap_or(15));
        let data_dir = match env::var("POCKETS_DATA_DIR") {
            Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw),
            _ => default_data_dir()?,
        };
        Ok(Self {
            api_url,
            http_timeout,
            data_dir,
            cache: CacheConfig::from_env(),
            media: MediaConfig::from_env(),
        })
    }

    /// Config rooted at an explicit API URL and data directory, with defaults elsewhere.
    pub fn new(api_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            api_url: sanitize_base_url(api_url.into())?,
            http_timeout: Duration::from_secs(15),
            data_dir: data_dir.into(),
            cache: CacheConfig::default(),
            media: MediaConfig::default(),
        })
    }

    pub fn local_store_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.json")
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub stale_after: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let stale_after = env_number("POCKETS_CACHE_STALE_SECS")
            .map(Duration::from_secs)
            .unwrap_or_else(|| Self::default().stale_after);
        Self { stale_after }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Upper bound on how long the voice-note duration probe may run.
    pub audio_probe_budget: Duration,
    pub upload_chunk_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_probe_budget: Duration::from_millis(3000),
            upload_chunk_bytes: 64 * 1024,
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let audio_probe_budget = env_number("POCKETS_AUDIO_PROBE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.audio_probe_budget);
        let upload_chunk_bytes = env_number("POCKETS_UPLOAD_CHUNK_BYTES")
            .filter(|bytes| *bytes > 0)
            .map(|bytes| bytes as usize)
            .unwrap_or(defaults.upload_chunk_bytes);
        Self {
            audio_probe_budget,
            upload_chunk_bytes,
        }
    }
}

fn env_number(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("pockets"))
        .ok_or_else(|| anyhow!("unable to determine a data directory; set POCKETS_DATA_DIR"))
}

pub fn sanitize_base_url(mut base: String) -> Result<String> {
    base = base.trim().to_string();
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    Url::parse(&base).with_context(|| format!("invalid base URL {base}"))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        let url = sanitize_base_url("api.example.com/".into()).unwrap();
        assert_eq!(url, "http://api.example.com");
        let url = sanitize_base_url("https://api.example.com//".into()).unwrap();
        assert_eq!(url, "https://api.example.com");
    }

    #[test]
    fn garbage_base_url_is_rejected() {
        assert!(sanitize_base_url("http://exa mple".into()).is_err());
    }

    #[test]
    fn explicit_config_uses_defaults() {
        let config = FrontendConfig::new("localhost:9000", "/tmp/pockets").unwrap();
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.local_store_path(), PathBuf::from("/tmp/pockets/local_storage.json"));
        assert_eq!(config.media.upload_chunk_bytes, 64 * 1024);
    }
}
