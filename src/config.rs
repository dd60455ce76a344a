//! FlexiTrip configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for `planning.max-tool-retries`
pub const MAX_TOOL_RETRIES: u32 = 10;

/// Longest single wait between tool retry rounds
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Main FlexiTrip configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model configuration
    pub llm: LlmConfig,

    /// Tool provider endpoints and call deadline
    pub tools: ToolsConfig,

    /// Planning run limits
    pub planning: PlanningConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks the model API key and the planning limits so startup fails
    /// with a clear message instead of midway through a run.
    pub fn validate(&self) -> Result<()> {
        if self.llm.get_api_key().is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if !(0.0..=1.0).contains(&self.planning.budget_tolerance) {
            return Err(eyre::eyre!(
                "planning.budget-tolerance must be between 0 and 1, got {}",
                self.planning.budget_tolerance
            ));
        }
        if self.planning.max_tool_retries > MAX_TOOL_RETRIES {
            return Err(eyre::eyre!(
                "planning.max-tool-retries must be at most {}, got {}",
                MAX_TOOL_RETRIES,
                self.planning.max_tool_retries
            ));
        }
        if self.planning.max_generation_attempts == 0 {
            return Err(eyre::eyre!("planning.max-generation-attempts must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .flexitrip.yml
        let local_config = PathBuf::from(".flexitrip.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/flexitrip/flexitrip.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("flexitrip").join("flexitrip.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("gemini" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("Environment variable {} is not set", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

/// Connection settings for one tool provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
}

impl ProviderConfig {
    fn new(base_url: &str, api_key_env: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key_env: api_key_env.to_string(),
        }
    }
}

/// Tool provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-call deadline in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    pub weather: ProviderConfig,
    pub lodging: ProviderConfig,
    pub events: ProviderConfig,
    pub routing: ProviderConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            weather: ProviderConfig::new("https://api.openweathermap.org", "OPENWEATHER_API_KEY"),
            lodging: ProviderConfig::new("https://api.makcorps.com", "MAKCORPS_API_KEY"),
            events: ProviderConfig::new("https://www.eventbriteapi.com", "EVENTBRITE_API_KEY"),
            routing: ProviderConfig::new("https://api.openrouteservice.org", "ORS_API_KEY"),
        }
    }
}

/// Planning run limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Extra attempts for a tool call that failed with a retryable reason
    #[serde(rename = "max-tool-retries")]
    pub max_tool_retries: u32,

    /// First retry delay; doubles on each further attempt
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Fraction an itinerary may exceed the budget by
    #[serde(rename = "budget-tolerance")]
    pub budget_tolerance: f64,

    /// Deadline for a whole planning run in milliseconds
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: u64,

    /// Cap on the rendered context section of the prompt
    #[serde(rename = "max-prompt-chars")]
    pub max_prompt_chars: usize,

    /// List items kept per tool payload in the prompt
    #[serde(rename = "max-items-per-tool")]
    pub max_items_per_tool: usize,

    /// Model calls per run, shared by model errors and validation failures
    #[serde(rename = "max-generation-attempts")]
    pub max_generation_attempts: u32,
}

impl PlanningConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Wait before retry round `round` (1-based): the base doubled per round, capped
    pub fn backoff(&self, round: u32) -> Duration {
        let factor = 2u64.checked_pow(round.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_tool_retries: 2,
            backoff_base_ms: 500,
            budget_tolerance: 0.10,
            run_timeout_ms: 90_000,
            max_prompt_chars: 12_000,
            max_items_per_tool: 8,
            max_generation_attempts: 2,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/flexitrip on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("flexitrip"))
            .unwrap_or_else(|| PathBuf::from(".flexitrip"))
            .join("flexitrip.db");

        Self { db_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.planning.max_tool_retries, 2);
        assert_eq!(config.planning.budget_tolerance, 0.10);
        assert_eq!(config.planning.max_generation_attempts, 2);
        assert_eq!(config.tools.timeout_ms, 15_000);
        assert!(config.storage.db_path.ends_with("flexitrip.db"));
    }

    #[test]
    fn test_tools_config_defaults() {
        let config = ToolsConfig::default();

        assert_eq!(config.weather.api_key_env, "OPENWEATHER_API_KEY");
        assert_eq!(config.lodging.base_url, "https://api.makcorps.com");
        assert_eq!(config.routing.api_key_env, "ORS_API_KEY");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-sonnet-4-20250514
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 4096
  timeout-ms: 60000

tools:
  timeout-ms: 5000
  weather:
    base-url: http://localhost:9000
    api-key-env: LOCAL_WEATHER_KEY

planning:
  max-tool-retries: 1
  budget-tolerance: 0.05
  run-timeout-ms: 30000

storage:
  db-path: /tmp/flexitrip-test.db
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.tools.timeout_ms, 5000);
        assert_eq!(config.tools.weather.base_url, "http://localhost:9000");
        assert_eq!(config.planning.max_tool_retries, 1);
        assert_eq!(config.planning.budget_tolerance, 0.05);
        assert_eq!(config.planning.run_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/flexitrip-test.db"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
planning:
  max-items-per-tool: 3
tools:
  events:
    api-key-env: MY_EVENTS_KEY
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.planning.max_items_per_tool, 3);
        assert_eq!(config.planning.max_tool_retries, 2);
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.tools.events.api_key_env, "MY_EVENTS_KEY");
        // Unset fields of a partially given provider fall back to empty
        assert_eq!(config.tools.events.base_url, "");
        assert_eq!(config.tools.routing.api_key_env, "ORS_API_KEY");
    }

    #[test]
    fn test_validate_rejects_bad_tolerance() {
        let mut config = Config::default();
        config.llm.api_key_env = "PATH".to_string();
        config.planning.budget_tolerance = 1.5;
        assert!(config.validate().is_err());

        config.planning.budget_tolerance = 0.1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds_tool_retries() {
        let mut config = Config::default();
        config.llm.api_key_env = "PATH".to_string();
        config.planning.max_tool_retries = MAX_TOOL_RETRIES;
        assert!(config.validate().is_ok());

        config.planning.max_tool_retries = 40;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max-tool-retries"));
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let planning = PlanningConfig::default();
        assert_eq!(planning.backoff(1), Duration::from_millis(500));
        assert_eq!(planning.backoff(2), Duration::from_millis(1000));
        assert_eq!(planning.backoff(3), Duration::from_millis(2000));
        assert_eq!(planning.backoff(33), Duration::from_secs(30));
        assert_eq!(planning.backoff(u32::MAX), Duration::from_secs(30));

        let zero = PlanningConfig {
            backoff_base_ms: 0,
            ..PlanningConfig::default()
        };
        assert_eq!(zero.backoff(64), Duration::ZERO);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flexitrip.yml");
        fs::write(&path, "planning:\n  backoff-base-ms: 10\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.planning.backoff(1), Duration::from_millis(10));

        let missing = dir.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
