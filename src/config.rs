use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_ENV: &str = "VIDPROBE_CONFIG";
const CONFIG_FILE: &str = "vidprobe.json";
const API_KEY_XOR_KEY: &[u8] = b"vidprobe-local-key-v1";

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_CHROME_BIN: &str = "chromium";
pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
pub const DEFAULT_SOURCE_PATTERN: &str = r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/.+";

const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TRANSCRIBE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SCORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCORING_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid source_pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub chrome_bin: String,
    pub ytdlp_bin: String,
    pub elevenlabs_api_key_obfuscated: Option<String>,
    pub gptzero_api_key_obfuscated: Option<String>,
    /// Plaintext keys are accepted on load, then obfuscated and never written back
    #[serde(skip_serializing)]
    pub elevenlabs_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub gptzero_api_key: Option<String>,
    pub capture_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub transcribe_timeout_secs: u64,
    pub score_timeout_secs: u64,
    pub scoring_concurrency: usize,
    pub source_pattern: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            chrome_bin: DEFAULT_CHROME_BIN.to_string(),
            ytdlp_bin: DEFAULT_YTDLP_BIN.to_string(),
            elevenlabs_api_key_obfuscated: None,
            gptzero_api_key_obfuscated: None,
            elevenlabs_api_key: None,
            gptzero_api_key: None,
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
            extract_timeout_secs: DEFAULT_EXTRACT_TIMEOUT_SECS,
            transcribe_timeout_secs: DEFAULT_TRANSCRIBE_TIMEOUT_SECS,
            score_timeout_secs: DEFAULT_SCORE_TIMEOUT_SECS,
            scoring_concurrency: DEFAULT_SCORING_CONCURRENCY,
            source_pattern: DEFAULT_SOURCE_PATTERN.to_string(),
        }
    }
}

impl AppConfig {
    pub fn screenshots_dir(&self) -> PathBuf {
        self.data_dir.join("screenshots")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn transcribe_timeout(&self) -> Duration {
        Duration::from_secs(self.transcribe_timeout_secs)
    }

    pub fn score_timeout(&self) -> Duration {
        Duration::from_secs(self.score_timeout_secs)
    }

    pub fn source_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.source_pattern)?)
    }

    pub fn elevenlabs_api_key(&self) -> Option<String> {
        self.elevenlabs_api_key_obfuscated
            .as_deref()
            .and_then(deobfuscate_api_key)
    }

    pub fn gptzero_api_key(&self) -> Option<String> {
        self.gptzero_api_key_obfuscated
            .as_deref()
            .and_then(deobfuscate_api_key)
    }
}

/// Config file location, overridable with `VIDPROBE_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Load the config file and apply environment overrides
pub fn load() -> Result<AppConfig, ConfigError> {
    let mut config = load_or_create(&config_path())?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

pub fn load_or_create(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let config = AppConfig::default();
        save(path, &config)?;
        tracing::info!("Created default config at {}", path.display());
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            let migrated = absorb_plaintext_keys(&mut config);
            normalize_config(&mut config);
            if migrated {
                save(path, &config)?;
                tracing::info!("Obfuscated plaintext API keys in {}", path.display());
            }
            Ok(config)
        }
        Err(e) => {
            let backup = path.with_extension("json.bak");
            tracing::warn!(
                "Config {} is corrupt ({}), backing up to {}",
                path.display(),
                e,
                backup.display()
            );
            let _ = fs::copy(path, backup);
            let config = AppConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Environment wins over the file; nothing here is written back
pub fn apply_env_overrides(config: &mut AppConfig, env: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| {
        env(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(port) = var("PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
        }
    }
    if let Some(dir) = var("VIDPROBE_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(key) = var("ELEVENLABS_API_KEY") {
        config.elevenlabs_api_key_obfuscated = Some(obfuscate_api_key(&key));
    }
    if let Some(key) = var("GPTZERO_API_KEY") {
        config.gptzero_api_key_obfuscated = Some(obfuscate_api_key(&key));
    }
    if let Some(bin) = var("CHROME_BIN") {
        config.chrome_bin = bin;
    }
    if let Some(bin) = var("YTDLP_BIN") {
        config.ytdlp_bin = bin;
    }
}

fn absorb_plaintext_keys(config: &mut AppConfig) -> bool {
    let mut migrated = false;

    if let Some(key) = config.elevenlabs_api_key.take() {
        if !key.trim().is_empty() {
            config.elevenlabs_api_key_obfuscated = Some(obfuscate_api_key(key.trim()));
        }
        migrated = true;
    }
    if let Some(key) = config.gptzero_api_key.take() {
        if !key.trim().is_empty() {
            config.gptzero_api_key_obfuscated = Some(obfuscate_api_key(key.trim()));
        }
        migrated = true;
    }

    migrated
}

fn normalize_config(config: &mut AppConfig) {
    let defaults = AppConfig::default();

    if config.bind_host.trim().is_empty() {
        config.bind_host = defaults.bind_host;
    }
    if config.chrome_bin.trim().is_empty() {
        config.chrome_bin = defaults.chrome_bin;
    }
    if config.ytdlp_bin.trim().is_empty() {
        config.ytdlp_bin = defaults.ytdlp_bin;
    }
    if config.source_pattern.trim().is_empty() {
        config.source_pattern = defaults.source_pattern;
    }
    if config.data_dir.as_os_str().is_empty() {
        config.data_dir = defaults.data_dir;
    }
    if config.capture_timeout_secs == 0 {
        config.capture_timeout_secs = DEFAULT_CAPTURE_TIMEOUT_SECS;
    }
    if config.extract_timeout_secs == 0 {
        config.extract_timeout_secs = DEFAULT_EXTRACT_TIMEOUT_SECS;
    }
    if config.transcribe_timeout_secs == 0 {
        config.transcribe_timeout_secs = DEFAULT_TRANSCRIBE_TIMEOUT_SECS;
    }
    if config.score_timeout_secs == 0 {
        config.score_timeout_secs = DEFAULT_SCORE_TIMEOUT_SECS;
    }
    if config.scoring_concurrency == 0 {
        config.scoring_concurrency = DEFAULT_SCORING_CONCURRENCY;
    }
}

fn obfuscate_api_key(api_key: &str) -> String {
    let mut bytes = api_key.as_bytes().to_vec();
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    BASE64_STANDARD.encode(bytes)
}

fn deobfuscate_api_key(obfuscated: &str) -> Option<String> {
    let mut bytes = BASE64_STANDARD.decode(obfuscated).ok()?;
    for (idx, byte) in bytes.iter_mut().enumerate() {
        *byte ^= API_KEY_XOR_KEY[idx % API_KEY_XOR_KEY.len()];
    }
    String::from_utf8(bytes).ok()
}

/// Printable form of a key for logs
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.len() <= 10 || !api_key.is_ascii() {
        return "******".to_string();
    }

    let prefix = &api_key[..6];
    let suffix = &api_key[api_key.len().saturating_sub(4)..];
    format!("{}********{}", prefix, suffix)
}
