use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::adapters::device::{DeviceOptions, DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT};
use crate::core::cache::{DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL};
use crate::core::runner::{max_concurrency_from_env, MAX_CONCURRENCY_ENV};
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::{validate_positive_number, Validate};

/// `--settings` 指定的執行期設定檔（TOML）
///
/// ```toml
/// [runner]
/// max_concurrency = 2000
///
/// [cache]
/// max_size = 256
/// ttl_seconds = 120
///
/// [eapi]
/// timeout_seconds = 10
/// max_connections = 50
/// proto = "https"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub eapi: EapiSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSettings {
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub max_size: Option<usize>,
    pub ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EapiSettings {
    pub timeout_seconds: Option<u64>,
    pub max_connections: Option<usize>,
    pub proto: Option<String>,
}

impl RunSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        let settings: RunSettings = toml::from_str(&processed).map_err(|e| AntaError::ConfigError {
            message: format!("Invalid settings file: {}", e),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// 以環境變數取代 `${VAR}`；未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        static ENV_VAR: OnceLock<Option<Regex>> = OnceLock::new();
        let re = ENV_VAR
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
            .as_ref()
            .ok_or_else(|| AntaError::config("invalid environment variable pattern"))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });
        Ok(result.to_string())
    }

    /// 最大並行數：`ANTA_MAX_CONCURRENCY` 優先於設定檔
    pub fn max_concurrency(&self) -> usize {
        if std::env::var(MAX_CONCURRENCY_ENV).is_ok() {
            return max_concurrency_from_env();
        }
        self.runner.max_concurrency.unwrap_or_else(max_concurrency_from_env)
    }

    /// 把設定套用到裝置預設值；CLI 明確指定的值由呼叫端之後覆寫
    pub fn apply_to(&self, options: &mut DeviceOptions) {
        options.cache_max_size = self.cache.max_size.unwrap_or(DEFAULT_CACHE_MAX_SIZE);
        options.cache_ttl = self
            .cache
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);
        options.timeout = self
            .eapi
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        options.max_connections = self.eapi.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if let Some(proto) = &self.eapi.proto {
            options.proto = proto.clone();
        }
    }
}

impl Validate for RunSettings {
    fn validate(&self) -> Result<()> {
        if let Some(n) = self.runner.max_concurrency {
            validate_positive_number("runner.max_concurrency", n, 1)?;
        }
        if let Some(n) = self.cache.max_size {
            validate_positive_number("cache.max_size", n, 1)?;
        }
        if let Some(n) = self.eapi.timeout_seconds {
            validate_positive_number("eapi.timeout_seconds", n as usize, 1)?;
        }
        if let Some(n) = self.eapi.max_connections {
            validate_positive_number("eapi.max_connections", n, 1)?;
        }
        if let Some(proto) = &self.eapi.proto {
            if proto != "http" && proto != "https" {
                return Err(AntaError::InvalidConfigValueError {
                    field: "eapi.proto".to_string(),
                    value: proto.clone(),
                    reason: "Protocol must be http or https".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::DEFAULT_MAX_CONCURRENCY;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_settings() {
        let settings = RunSettings::from_toml_str(
            r#"
[runner]
max_concurrency = 100

[cache]
max_size = 256
ttl_seconds = 5

[eapi]
timeout_seconds = 10
proto = "http"
"#,
        )
        .unwrap();
        assert_eq!(settings.runner.max_concurrency, Some(100));

        let mut options = DeviceOptions::new("10.0.0.1", "admin", "admin");
        settings.apply_to(&mut options);
        assert_eq!(options.cache_max_size, 256);
        assert_eq!(options.cache_ttl, Duration::from_secs(5));
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.proto, "http");
        assert_eq!(options.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = RunSettings::from_toml_str("").unwrap();
        let mut options = DeviceOptions::new("10.0.0.1", "admin", "admin");
        settings.apply_to(&mut options);
        assert_eq!(options.cache_max_size, DEFAULT_CACHE_MAX_SIZE);
        assert_eq!(options.proto, "https");
    }

    #[test]
    #[serial]
    fn test_env_var_substitution() {
        std::env::set_var("ANTA_TEST_CACHE_TTL", "42");
        let settings = RunSettings::from_toml_str("[cache]\nttl_seconds = ${ANTA_TEST_CACHE_TTL}\n").unwrap();
        assert_eq!(settings.cache.ttl_seconds, Some(42));
        std::env::remove_var("ANTA_TEST_CACHE_TTL");
    }

    #[test]
    #[serial]
    fn test_max_concurrency_precedence() {
        std::env::remove_var(MAX_CONCURRENCY_ENV);
        assert_eq!(RunSettings::default().max_concurrency(), DEFAULT_MAX_CONCURRENCY);

        let settings = RunSettings::from_toml_str("[runner]\nmax_concurrency = 100\n").unwrap();
        assert_eq!(settings.max_concurrency(), 100);

        std::env::set_var(MAX_CONCURRENCY_ENV, "7");
        assert_eq!(settings.max_concurrency(), 7);
        std::env::remove_var(MAX_CONCURRENCY_ENV);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(RunSettings::from_toml_str("[eapi]\nproto = \"ssh\"\n").is_err());
        assert!(RunSettings::from_toml_str("[runner]\nmax_concurrency = 0\n").is_err());
        assert!(RunSettings::from_toml_str("[eapi]\ntimeout_seconds = 0\n").is_err());
        assert!(RunSettings::from_toml_str("[cache]\nmax_size = 0\n").is_err());
        assert!(RunSettings::from_toml_str("[unknown]\nkey = 1\n").is_err());
    }

    #[test]
    fn test_settings_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\nmax_size = 12").unwrap();
        let settings = RunSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.cache.max_size, Some(12));
    }
}
