use crate::domain::status::StatusRules;
use crate::utils::error::{Result, RosterError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rules: StatusRules,
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

/// LeanCloud 應用憑證
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub app_id: String,
    pub app_key: String,
    pub server_url: String,
    pub timeout_seconds: Option<u64>,
}

impl StoreConfig {
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(30)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 200,
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: ".roster/session.json".to_string(),
        }
    }
}

/// `roster init` 時確保存在的帳號
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    pub role: String,
}

impl RosterConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RosterError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RosterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LEANCLOUD_APP_KEY})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RosterError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("store.server_url", &self.store.server_url)?;
        validate_non_empty_string("store.app_id", &self.store.app_id)?;
        validate_non_empty_string("store.app_key", &self.store.app_key)?;
        for (field, value) in [
            ("store.app_id", &self.store.app_id),
            ("store.app_key", &self.store.app_key),
        ] {
            if value.starts_with("${") {
                return Err(RosterError::MissingConfigError {
                    field: format!("{} (unset environment variable {})", field, value),
                });
            }
        }
        if let Some(timeout) = self.store.timeout_seconds {
            validate_positive_number("store.timeout_seconds", timeout, 1)?;
        }

        if self.queue.max_backoff_ms < self.queue.initial_backoff_ms {
            return Err(RosterError::InvalidConfigValueError {
                field: "queue.max_backoff_ms".to_string(),
                value: self.queue.max_backoff_ms.to_string(),
                reason: "must not be smaller than queue.initial_backoff_ms".to_string(),
            });
        }
        validate_range("queue.max_retries", self.queue.max_retries, 0, 10)?;

        validate_path("session.path", &self.session.path)?;

        let rules = &self.rules;
        validate_positive_number(
            "rules.blacklist_quit_threshold",
            rules.blacklist_quit_threshold as u64,
            1,
        )?;
        validate_range("rules.untrained_grace_days", rules.untrained_grace_days, 0, 365)?;
        validate_range("rules.urge_training_days", rules.urge_training_days, 1, 365)?;
        if rules.timeout_quit_days < rules.urge_training_days {
            return Err(RosterError::InvalidConfigValueError {
                field: "rules.timeout_quit_days".to_string(),
                value: rules.timeout_quit_days.to_string(),
                reason: "must not be smaller than rules.urge_training_days".to_string(),
            });
        }
        validate_non_empty_string("rules.terminal_stage", &rules.terminal_stage)?;

        for user in &self.seed_users {
            validate_non_empty_string("seed_users.username", &user.username)?;
            validate_non_empty_string("seed_users.password", &user.password)?;
        }

        Ok(())
    }
}

impl Validate for RosterConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
