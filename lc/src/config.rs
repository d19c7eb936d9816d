//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::executor::ExecutorConfig;
use crate::plan::ParsePolicy;
use crate::tools::{ToolContext, ToolLimits};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM endpoint and sampling
    pub llm: LlmConfig,

    /// Plan execution
    pub executor: ExecutionConfig,

    /// Built-in tool limits
    pub tools: ToolsConfig,

    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this before anything talks to the model so a missing key fails
    /// fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key().is_none() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply env overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Only the log level, read before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .llmcompiler.yml
        let local_config = PathBuf::from(".llmcompiler.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/llmcompiler/llmcompiler.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("llmcompiler").join("llmcompiler.yml");
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

    /// Override LLM settings from `OPENAI_*` variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let llm = &mut self.llm;
        if let Some(url) = lookup("OPENAI_BASE_URL").or_else(|| lookup("OPENAI_URL_BASE")) {
            llm.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            llm.model = model;
        }
        override_parsed(&lookup, "OPENAI_TEMPERATURE", &mut llm.temperature)?;
        override_parsed(&lookup, "OPENAI_MAX_TOKENS", &mut llm.max_tokens)?;
        override_parsed(&lookup, "OPENAI_MAX_RETRIES", &mut llm.max_retries)?;
        override_parsed(&lookup, "OPENAI_TIMEOUT_SECONDS", &mut llm.timeout_seconds)?;
        override_parsed(&lookup, "OPENAI_TOP_P", &mut llm.top_p)?;
        override_parsed(&lookup, "OPENAI_FREQUENCY_PENALTY", &mut llm.frequency_penalty)?;
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
        tracing::debug!(%key, "override_parsed: applied environment override");
    }
    Ok(())
}

/// LLM endpoint configuration (any OpenAI-compatible server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL, including any version prefix such as `/v1`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    pub temperature: f32,

    #[serde(rename = "top-p")]
    pub top_p: f32,

    #[serde(rename = "frequency-penalty")]
    pub frequency_penalty: f32,

    /// Retries for transient failures (408, 429, 5xx, network)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "timeout-seconds")]
    pub timeout_seconds: u64,
}

impl LlmConfig {
    /// The API key, if its environment variable is set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            max_retries: 5,
            timeout_seconds: 30,
        }
    }
}

/// Plan execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Worker pool width
    #[serde(rename = "max-workers")]
    pub max_workers: usize,

    /// Per-step tool timeout; 0 disables it
    #[serde(rename = "step-timeout-seconds")]
    pub step_timeout_seconds: f64,

    /// Drop malformed plan steps instead of rejecting the plan
    #[serde(rename = "partial-plans")]
    pub partial_plans: bool,
}

impl ExecutionConfig {
    pub fn executor_config(&self) -> ExecutorConfig {
        // Zero or negative disables the timeout; a value too large for a Duration keeps the default
        let step_timeout = if self.step_timeout_seconds.is_nan() || self.step_timeout_seconds <= 0.0 {
            None
        } else {
            Duration::try_from_secs_f64(self.step_timeout_seconds)
                .ok()
                .or(ExecutorConfig::default().step_timeout)
        };
        ExecutorConfig {
            max_workers: self.max_workers,
            step_timeout,
        }
    }

    pub fn parse_policy(&self) -> ParsePolicy {
        if self.partial_plans {
            ParsePolicy::Partial
        } else {
            ParsePolicy::Strict
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            step_timeout_seconds: 120.0,
            partial_plans: false,
        }
    }
}

/// Built-in tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory relative paths resolve against (default: current directory)
    pub workdir: Option<PathBuf>,

    /// Keep file tools inside `workdir`
    pub sandbox: bool,

    #[serde(rename = "read-max-chars")]
    pub read_max_chars: usize,

    #[serde(rename = "echo-max-chars")]
    pub echo_max_chars: usize,

    #[serde(rename = "shell-timeout-seconds")]
    pub shell_timeout_seconds: f64,

    #[serde(rename = "http-timeout-seconds")]
    pub http_timeout_seconds: f64,
}

impl ToolsConfig {
    pub fn limits(&self) -> ToolLimits {
        let defaults = ToolLimits::default();
        let secs = |value: f64, fallback: Duration| {
            Duration::try_from_secs_f64(value)
                .ok()
                .filter(|d| !d.is_zero())
                .unwrap_or(fallback)
        };
        ToolLimits {
            read_max_chars: self.read_max_chars,
            echo_max_chars: self.echo_max_chars,
            shell_timeout: secs(self.shell_timeout_seconds, defaults.shell_timeout),
            http_timeout: secs(self.http_timeout_seconds, defaults.http_timeout),
        }
    }

    /// Tool context for one run
    pub fn context(&self, run_id: &str) -> Result<ToolContext> {
        let workdir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let ctx = if self.sandbox {
            ToolContext::new_sandboxed(workdir, run_id)
        } else {
            ToolContext::new(workdir, run_id)
        };
        Ok(ctx.with_limits(self.limits()))
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workdir: None,
            sandbox: false,
            read_max_chars: 4000,
            echo_max_chars: 4000,
            shell_timeout_seconds: 30.0,
            http_timeout_seconds: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.executor.max_workers, 10);
        assert_eq!(config.tools.read_max_chars, 4000);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  model: glm-4.6
  api-key-env: MY_API_KEY
  base-url: https://llm.example.com/v1
  max-tokens: 2048
  temperature: 0.2
  max-retries: 2

executor:
  max-workers: 4
  step-timeout-seconds: 0
  partial-plans: true

tools:
  workdir: /srv/work
  sandbox: true
  shell-timeout-seconds: 5

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "glm-4.6");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.executor.max_workers, 4);
        assert_eq!(config.executor.executor_config().step_timeout, None);
        assert_eq!(config.executor.parse_policy(), ParsePolicy::Partial);
        assert!(config.tools.sandbox);
        assert_eq!(config.tools.limits().shell_timeout, Duration::from_secs(5));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4o-mini
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.executor, ExecutionConfig::default());
        assert_eq!(
            config.executor.executor_config().step_timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_URL_BASE", "http://localhost:8000/v1"),
            ("OPENAI_MODEL", "local-model"),
            ("OPENAI_TEMPERATURE", "0.7"),
            ("OPENAI_MAX_TOKENS", "512"),
            ("OPENAI_TOP_P", "0.9"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.base_url, "http://localhost:8000/v1");
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.top_p, 0.9);
        assert_eq!(config.llm.max_retries, 5);
    }

    #[test]
    fn test_invalid_env_override_is_error() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|k| (k == "OPENAI_MAX_RETRIES").then(|| "many".to_string()));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("OPENAI_MAX_RETRIES"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "executor:\n  max-workers: 3\n").unwrap();

        let config = Config::load_file(Some(&path)).unwrap();
        assert_eq!(config.executor.max_workers, 3);

        let missing = temp.path().join("missing.yml");
        assert!(Config::load_file(Some(&missing)).is_err());
    }

    #[test]
    #[serial]
    fn test_validate_reads_api_key_env() {
        let mut config = Config::default();
        config.llm.api_key_env = "LLMCOMPILER_TEST_API_KEY".to_string();

        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::remove_var("LLMCOMPILER_TEST_API_KEY") };
        assert!(config.validate().is_err());

        unsafe { std::env::set_var("LLMCOMPILER_TEST_API_KEY", "sk-test") };
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.api_key().as_deref(), Some("sk-test"));

        unsafe { std::env::remove_var("LLMCOMPILER_TEST_API_KEY") };
    }

    #[test]
    fn test_tool_context_from_config() {
        let temp = tempfile::tempdir().unwrap();
        let tools = ToolsConfig {
            workdir: Some(temp.path().to_path_buf()),
            sandbox: true,
            ..Default::default()
        };

        let ctx = tools.context("run-1").unwrap();
        assert_eq!(ctx.workdir, temp.path());
        assert!(ctx.sandbox_enabled);
        assert_eq!(ctx.run_id, "run-1");
    }

    #[test]
    fn test_out_of_range_timeouts_use_defaults() {
        let tools = ToolsConfig {
            shell_timeout_seconds: 1e30,
            http_timeout_seconds: f64::NAN,
            ..Default::default()
        };
        let limits = tools.limits();
        assert_eq!(limits.shell_timeout, ToolLimits::default().shell_timeout);
        assert_eq!(limits.http_timeout, ToolLimits::default().http_timeout);

        let executor = ExecutionConfig {
            step_timeout_seconds: 1e30,
            ..Default::default()
        };
        assert_eq!(executor.executor_config().step_timeout, ExecutorConfig::default().step_timeout);

        let executor = ExecutionConfig {
            step_timeout_seconds: 0.0,
            ..Default::default()
        };
        assert_eq!(executor.executor_config().step_timeout, None);

        let executor = ExecutionConfig {
            step_timeout_seconds: 2.5,
            ..Default::default()
        };
        assert_eq!(executor.executor_config().step_timeout, Some(Duration::from_millis(2500)));
    }
}
