use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use serde_json::{Map, Value};
use spdlog::{info, warn};

use crate::auth::DEFAULT_SESSION_VALUE;
use crate::duplicate::DEFAULT_OVERLAP_THRESHOLD;
use crate::error::ContentError;
use crate::generator::gemini::{GeminiClient, GeminiModels, DEFAULT_GEMINI_MODEL};
use crate::generator::review::{ReviewConfig, WebhookNotifier};
use crate::generator::{Generator, GeneratorSettings};
use crate::images::MAX_IMAGE_SIZE;
use crate::store::file_store::atomic_write;

pub const CFG_FILE_NAME: &str = "drafted.toml";

#[derive(Deserialize)]
pub struct Paths {
    pub drafts_dir: PathBuf,
    pub published_dir: PathBuf,
    pub images_dir: PathBuf,
}

#[derive(Deserialize)]
pub struct Server {
    pub address: String,
    pub port: u16,
    /// Marks the session cookie `Secure`. Enable behind TLS.
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Admin {
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_value: String,
}

impl Default for Admin {
    fn default() -> Self {
        Admin {
            username: None,
            password: None,
            session_value: DEFAULT_SESSION_VALUE.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub outline_model: String,
    pub content_model: String,
    pub seo_model: String,
    pub timeout_secs: u64,
    pub keyword_overlap_threshold: usize,
    pub author: String,
    pub default_category: String,
    pub review: ReviewConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let defaults = GeneratorSettings::default();
        GeneratorConfig {
            api_key: None,
            outline_model: DEFAULT_GEMINI_MODEL.to_string(),
            content_model: DEFAULT_GEMINI_MODEL.to_string(),
            seo_model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout_secs: defaults.timeout.as_secs(),
            keyword_overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            author: defaults.author,
            default_category: defaults.default_category,
            review: ReviewConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            overlap_threshold: self.keyword_overlap_threshold,
            author: self.author.clone(),
            default_category: self.default_category.clone(),
        }
    }

    pub fn models(&self) -> GeminiModels {
        GeminiModels {
            outline: self.outline_model.clone(),
            content: self.content_model.clone(),
            seo: self.seo_model.clone(),
        }
    }

    /// A Gemini backed generator, or `None` without an API key.
    pub fn build_generator(&self) -> Option<Generator> {
        let api_key = self.api_key.as_deref().filter(|key| !key.trim().is_empty())?;
        let client = GeminiClient::new(api_key, self.models());
        let generator = Generator::new(Arc::new(client), self.settings());

        if !self.review.enabled {
            info!("Review notification is disabled");
            return Some(generator);
        }
        match self.review.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => Some(generator.with_notifier(Arc::new(WebhookNotifier::new(url)), &self.review.subject_prefix)),
            None => {
                warn!("Review notification is enabled but no webhook_url is set");
                Some(generator)
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Uploads {
    pub max_image_bytes: usize,
}

impl Default for Uploads {
    fn default() -> Self {
        Uploads {
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }
}

#[derive(Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize)]
pub struct Config {
    pub paths: Paths,
    pub server: Server,
    #[serde(default)]
    pub admin: Admin,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub uploads: Uploads,
    pub log: Option<Log>,
    /// File the config was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn parse_path(path: PathBuf) -> PathBuf {
    let Some(str_path) = path.to_str() else {
        return path;
    };
    if !str_path.starts_with("${exe_dir}") {
        return path;
    }

    let exe_dir = env::current_exe().ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));
    match exe_dir {
        Some(dir) => PathBuf::from(str_path.replace("${exe_dir}", &dir.to_string_lossy())),
        None => path,
    }
}

pub fn parse_config(cfg_content: &str) -> io::Result<Config> {
    let mut cfg: Config = match toml::from_str::<Config>(cfg_content) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    cfg.paths = Paths {
        drafts_dir: parse_path(cfg.paths.drafts_dir),
        published_dir: parse_path(cfg.paths.published_dir),
        images_dir: parse_path(cfg.paths.images_dir),
    };

    Ok(cfg)
}

pub fn read_config(cfg_path: &Path) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.display(), e))),
    };

    let mut cfg = parse_config(&cfg_content)?;
    cfg.source = Some(cfg_path.to_path_buf());
    Ok(cfg)
}

fn invalid_data(msg: String) -> ContentError {
    ContentError::Io(io::Error::new(ErrorKind::InvalidData, msg))
}

/// Replaces the `[generator]` table of the config file, keeping the rest.
/// The file is rewritten atomically. Running servers pick it up on restart.
pub fn save_generator_section(cfg_path: &Path, section: &Map<String, Value>) -> crate::error::Result<GeneratorConfig> {
    let generator: GeneratorConfig = serde_json::from_value(Value::Object(section.clone()))
        .map_err(|e| ContentError::InvalidConfig(e.to_string()))?;
    let table = toml::Value::try_from(section)
        .map_err(|e| ContentError::InvalidConfig(e.to_string()))?;

    let content = fs::read_to_string(cfg_path)?;
    let mut doc: toml::Table = content.parse()
        .map_err(|e| invalid_data(format!("Error parsing configuration file {}: {}", cfg_path.display(), e)))?;
    doc.insert("generator".to_string(), table);

    let rendered = toml::to_string(&doc)
        .map_err(|e| invalid_data(format!("Error writing configuration file {}: {}", cfg_path.display(), e)))?;
    atomic_write(cfg_path, rendered.as_bytes())?;

    info!("Saved generator configuration to {}", cfg_path.display());
    Ok(generator)
}

/// Secrets may come from the environment instead of the file.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(username) = lookup("ADMIN_USERNAME") {
        config.admin.username = Some(username);
    }
    if let Some(password) = lookup("ADMIN_PASSWORD") {
        config.admin.password = Some(password);
    }
    if let Some(api_key) = lookup("GEMINI_API_KEY") {
        config.generator.api_key = Some(api_key);
    }
}

/// Looks next to the executable, then in the current dir, then in the user config dir.
pub fn find_config_path() -> Option<PathBuf> {
    let exe_dir = env::current_exe().ok().and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));
    let candidates = [exe_dir, env::current_dir().ok(), dirs::config_dir()];

    candidates.into_iter()
        .flatten()
        .map(|dir| dir.join(CFG_FILE_NAME))
        .find(|path| path.exists())
}

pub fn open_config(cfg_path: Option<PathBuf>) -> Result<Config, String> {
    let config_path = match cfg_path.or_else(find_config_path) {
        Some(path) => path,
        None => return Err(format!("Could not find {}", CFG_FILE_NAME)),
    };

    println!("Reading config from {}", config_path.display());
    let mut config = read_config(&config_path).map_err(|e| e.to_string())?;
    apply_env_overrides(&mut config, |key| env::var(key).ok());

    if let Some(mut log) = config.log {
        let location = log.location.unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(env::temp_dir)
                .join("Drafted")
                .join("log")
                .join("server.log")
        });
        println!("Log enabled. Files will be written in {}", location.display());
        log.location = Some(location);
        config.log = Some(log);
    } else {
        println!("Log disabled. Using stdout");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use crate::test_data::CONFIG_DATA;

    use super::*;

    #[test]
    fn test_parse_config() {
        let cfg = parse_config(CONFIG_DATA).unwrap();

        assert_eq!(cfg.paths.drafts_dir, PathBuf::from("content/drafts"));
        assert_eq!(cfg.server.port, 8001);
        assert!(!cfg.server.secure_cookies);
        assert_eq!(cfg.admin.session_value, "admin");
        assert_eq!(cfg.admin.username.as_deref(), Some("editor"));
        assert_eq!(cfg.generator.timeout_secs, 30);
        assert_eq!(cfg.generator.content_model, "gemini-2.5-pro");
        assert_eq!(cfg.generator.outline_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(cfg.generator.author, "AI Assistant");
        assert_eq!(cfg.uploads.max_image_bytes, MAX_IMAGE_SIZE);

        let log = cfg.log.unwrap();
        assert_eq!(log.level, LogLevel::Debug);
        assert!(log.log_to_console);
    }

    #[test]
    fn test_generator_settings() {
        let cfg = parse_config(CONFIG_DATA).unwrap();
        let settings = cfg.generator.settings();
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.overlap_threshold, 3);
        assert_eq!(cfg.generator.models().content, "gemini-2.5-pro");
        assert!(cfg.generator.build_generator().is_none());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = parse_config(CONFIG_DATA).unwrap();
        apply_env_overrides(&mut cfg, |key| match key {
            "ADMIN_PASSWORD" => Some("from-env".to_string()),
            "GEMINI_API_KEY" => Some("key".to_string()),
            _ => None,
        });

        assert_eq!(cfg.admin.username.as_deref(), Some("editor"));
        assert_eq!(cfg.admin.password.as_deref(), Some("from-env"));
        assert_eq!(cfg.generator.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_config() {
        let err = parse_config("[paths]\ndrafts_dir = 1\n").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_review_config() {
        let cfg = parse_config(CONFIG_DATA).unwrap();
        assert!(!cfg.generator.review.enabled);

        let content = format!("{}\n[generator.review]\nenabled = true\nwebhook_url = \"http://localhost:9/hook\"\n", CONFIG_DATA);
        let mut cfg = parse_config(&content).unwrap();
        assert!(cfg.generator.review.enabled);
        assert_eq!(cfg.generator.review.webhook_url.as_deref(), Some("http://localhost:9/hook"));
        assert_eq!(cfg.generator.review.subject_prefix, "[Blog Review]");

        cfg.generator.api_key = Some("key".to_string());
        assert!(cfg.generator.build_generator().is_some());
    }

    #[test]
    fn test_save_generator_section() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CFG_FILE_NAME);
        fs::write(&path, CONFIG_DATA).unwrap();
        assert_eq!(read_config(&path).unwrap().source.as_deref(), Some(path.as_path()));

        let section = serde_json::json!({
            "content_model": "gemini-2.5-flash",
            "timeout_secs": 45,
            "review": {"enabled": true, "webhook_url": "http://localhost:9/hook"}
        });
        let saved = save_generator_section(&path, section.as_object().unwrap()).unwrap();
        assert_eq!(saved.timeout_secs, 45);

        let cfg = read_config(&path).unwrap();
        assert_eq!(cfg.generator.timeout_secs, 45);
        assert_eq!(cfg.generator.content_model, "gemini-2.5-flash");
        assert!(cfg.generator.review.enabled);
        assert_eq!(cfg.server.port, 8001);
        assert_eq!(cfg.admin.username.as_deref(), Some("editor"));
    }

    #[test]
    fn test_save_generator_section_rejects_bad_values() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CFG_FILE_NAME);
        fs::write(&path, CONFIG_DATA).unwrap();

        let section = serde_json::json!({"timeout_secs": "soon"});
        let err = save_generator_section(&path, section.as_object().unwrap()).err().unwrap();
        assert!(matches!(err, ContentError::InvalidConfig(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), CONFIG_DATA);
    }

    #[test]
    fn test_exe_dir_expansion() {
        let path = parse_path(PathBuf::from("${exe_dir}/content"));
        assert!(!path.to_string_lossy().contains("${exe_dir}"));

        let path = parse_path(PathBuf::from("content"));
        assert_eq!(path, PathBuf::from("content"));
    }
}
