//! Configuration management for the assistant engine
//!
//! Two layers live here: [`EngineConfig`], the validated settings bundle the
//! engine runs on, and [`AppConfig`], the TOML file the CLI loads it from.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: f32 = 60.0;
const DEFAULT_DYNAMIC_SCALE: f32 = 5.0;

/// Controls the shape of the assembled prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistantMode {
    /// Plain conversation, no file context
    Chat,
    /// File context appended read-only
    FileSearch,
    /// File context appended, returned code is written back
    CodeInterpreter,
}

impl AssistantMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantMode::Chat => "chat",
            AssistantMode::FileSearch => "file-search",
            AssistantMode::CodeInterpreter => "code-interpreter",
        }
    }
}

impl fmt::Display for AssistantMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistantMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(AssistantMode::Chat),
            "file-search" => Ok(AssistantMode::FileSearch),
            "code-interpreter" => Ok(AssistantMode::CodeInterpreter),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// Settings bundle the engine runs on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bearer credential; never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,
    pub instruction: Option<String>,
    pub mode: Option<AssistantMode>,
    pub files: Vec<PathBuf>,
    /// Upper bound on response length requested from the model, in characters
    pub max_prompt_length: Option<usize>,
    pub cache_tokens: bool,
    /// Re-ask when a response overshoots `max_prompt_length`
    pub max_prompt_precision: bool,
    pub dynamic_prompt_length: bool,
    pub dynamic_prompt_length_scale: f32,
    pub timeout_secs: f32,
    pub model: String,
    pub base_url: String,
    /// Strip punctuation and flatten newlines before sending
    pub sanitize_prompts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            instruction: None,
            mode: None,
            files: Vec::new(),
            max_prompt_length: None,
            cache_tokens: false,
            max_prompt_precision: false,
            dynamic_prompt_length: false,
            dynamic_prompt_length_scale: DEFAULT_DYNAMIC_SCALE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sanitize_prompts: true,
        }
    }
}

/// Structured record accepted by [`EngineConfig::from_json`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigRecord {
    apikey: Option<String>,
    assistant_type: Option<String>,
    instruction: Option<String>,
    files: Option<Vec<PathBuf>>,
    max_prompt_length: Option<usize>,
    cache_tokens: Option<bool>,
    max_prompt_precision: Option<bool>,
    dynamic_prompt_length: Option<bool>,
    dynamic_prompt_length_scale: Option<f32>,
    timeout_flag_seconds: Option<f32>,
    model: Option<String>,
}

impl EngineConfig {
    pub fn new(api_key: &str, mode: AssistantMode, instruction: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            instruction: Some(instruction.to_string()),
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// Build from a JSON record such as
    /// `{"apikey": "...", "assistantType": "file-search", "instruction": "...", "files": [...]}`.
    ///
    /// A missing `assistantType` means `chat`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let record: ConfigRecord =
            serde_json::from_str(json).map_err(|e| ConfigError::Record(e.to_string()))?;

        let mode = record
            .assistant_type
            .as_deref()
            .unwrap_or("chat")
            .parse::<AssistantMode>()?;

        let defaults = Self::default();
        Ok(Self {
            api_key: record.apikey,
            instruction: record.instruction,
            mode: Some(mode),
            files: record.files.unwrap_or_default(),
            max_prompt_length: record.max_prompt_length,
            cache_tokens: record.cache_tokens.unwrap_or(defaults.cache_tokens),
            max_prompt_precision: record
                .max_prompt_precision
                .unwrap_or(defaults.max_prompt_precision),
            dynamic_prompt_length: record
                .dynamic_prompt_length
                .unwrap_or(defaults.dynamic_prompt_length),
            dynamic_prompt_length_scale: record
                .dynamic_prompt_length_scale
                .unwrap_or(defaults.dynamic_prompt_length_scale),
            timeout_secs: record.timeout_flag_seconds.unwrap_or(defaults.timeout_secs),
            model: record.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..defaults
        })
    }
}

/// Check that credential, instruction and mode are all present.
///
/// Reports the first missing one, in that order.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.api_key.is_none() {
        return Err(ConfigError::MissingCredential);
    }
    if config.instruction.is_none() {
        return Err(ConfigError::MissingInstruction);
    }
    if config.mode.is_none() {
        return Err(ConfigError::MissingMode);
    }
    Ok(())
}

/// On-disk configuration for the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub engine: EngineConfig,
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            engine: EngineConfig {
                instruction: Some("You are a helpful assistant.".to_string()),
                mode: Some(AssistantMode::Chat),
                ..EngineConfig::default()
            },
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Engine settings with the credential pulled from the environment
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = self.engine.clone();
        engine.api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        engine
    }
}

/// Get the configuration file path
fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("com", "forge", "assistant")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(custom_path: Option<&str>) -> Result<AppConfig> {
    let path = if let Some(p) = custom_path {
        PathBuf::from(p)
    } else {
        config_path()?
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        Ok(config)
    } else {
        Ok(AppConfig::default())
    }
}

/// Initialize configuration file with defaults
pub fn init_config() -> Result<()> {
    let path = config_path()?;

    if path.exists() {
        println!("Configuration file already exists at {:?}", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    println!("Configuration initialized at {:?}", path);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &AppConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_priority() {
        let mut config = EngineConfig::default();
        assert_eq!(validate(&config), Err(ConfigError::MissingCredential));

        config.instruction = Some("Be brief.".to_string());
        config.mode = Some(AssistantMode::Chat);
        assert_eq!(validate(&config), Err(ConfigError::MissingCredential));

        config.api_key = Some("sk-test".to_string());
        config.instruction = None;
        config.mode = None;
        assert_eq!(validate(&config), Err(ConfigError::MissingInstruction));

        config.instruction = Some("Be brief.".to_string());
        assert_eq!(validate(&config), Err(ConfigError::MissingMode));

        config.mode = Some(AssistantMode::FileSearch);
        assert_eq!(validate(&config), Ok(()));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("chat".parse::<AssistantMode>(), Ok(AssistantMode::Chat));
        assert_eq!(
            "code-interpreter".parse::<AssistantMode>(),
            Ok(AssistantMode::CodeInterpreter)
        );
        assert_eq!(
            "assistant".parse::<AssistantMode>(),
            Err(ConfigError::InvalidMode("assistant".to_string()))
        );
    }

    #[test]
    fn test_from_json_record() {
        let config = EngineConfig::from_json(
            r#"{"apikey": "sk-test", "assistantType": "file-search",
                "instruction": "Advise students.", "files": ["a.txt", "db/b.db"],
                "dynamicPromptLengthScale": 10.0, "timeoutFlagSeconds": 10.0}"#,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.mode, Some(AssistantMode::FileSearch));
        assert_eq!(config.files, vec![PathBuf::from("a.txt"), PathBuf::from("db/b.db")]);
        assert_eq!(config.dynamic_prompt_length_scale, 10.0);
        assert_eq!(config.timeout_secs, 10.0);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_from_json_defaults_to_chat() {
        let config = EngineConfig::from_json(r#"{"instruction": "Hi"}"#).unwrap();
        assert_eq!(config.mode, Some(AssistantMode::Chat));
        assert_eq!(validate(&config), Err(ConfigError::MissingCredential));
    }

    #[test]
    fn test_from_json_rejects_unknown_mode() {
        let err = EngineConfig::from_json(r#"{"assistantType": "oracle"}"#).unwrap_err();
        assert_eq!(err, ConfigError::InvalidMode("oracle".to_string()));
    }

    #[test]
    fn test_app_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("api_key ="));

        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.engine, config.engine);
        assert_eq!(parsed.api_key_env, DEFAULT_API_KEY_ENV);
    }
}
