use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Store error {code}: {message}")]
    StoreError { code: i64, message: String },

    #[error("{class} object not found: {id}")]
    NotFound { class: String, id: String },

    #[error("Rate limited by store: {message}")]
    RateLimited { message: String },

    #[error("Session expired or missing, please log in again")]
    SessionExpired,

    #[error("Login failed: {message}")]
    Unauthorized { message: String },

    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Operation failed: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Store,
    Auth,
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 退出碼；只有 Low 視為成功
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

/// LeanCloud 錯誤碼：資料表或物件不存在
pub const CODE_OBJECT_NOT_FOUND: i64 = 101;
/// LeanCloud 錯誤碼：使用者名稱與密碼不匹配
pub const CODE_PASSWORD_MISMATCH: i64 = 210;
/// LeanCloud 錯誤碼：找不到使用者
pub const CODE_USER_NOT_FOUND: i64 = 211;

impl RosterError {
    pub fn store(code: i64, message: impl Into<String>) -> Self {
        RosterError::StoreError {
            code,
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        RosterError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RosterError::ValidationError {
            message: message.into(),
        }
    }

    /// 存儲端回報的錯誤碼（若有）
    pub fn store_code(&self) -> Option<i64> {
        match self {
            RosterError::StoreError { code, .. } => Some(*code),
            RosterError::NotFound { .. } => Some(CODE_OBJECT_NOT_FOUND),
            _ => None,
        }
    }

    /// 資料表尚未建立
    pub fn is_class_missing(&self) -> bool {
        matches!(self, RosterError::StoreError { code, .. } if *code == CODE_OBJECT_NOT_FOUND)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RosterError::RateLimited { .. })
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, RosterError::SessionExpired)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RosterError::ApiError(_) | RosterError::RateLimited { .. } => ErrorCategory::Network,
            RosterError::StoreError { .. } | RosterError::NotFound { .. } => ErrorCategory::Store,
            RosterError::SessionExpired
            | RosterError::Unauthorized { .. }
            | RosterError::Forbidden { .. } => ErrorCategory::Auth,
            RosterError::ConfigError { .. }
            | RosterError::ConfigValidationError { .. }
            | RosterError::InvalidConfigValueError { .. }
            | RosterError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RosterError::CsvError(_)
            | RosterError::SerializationError(_)
            | RosterError::ValidationError { .. }
            | RosterError::ProcessingError { .. } => ErrorCategory::Data,
            RosterError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 輸入錯誤與可重試的網路錯誤
            RosterError::NotFound { .. }
            | RosterError::ValidationError { .. }
            | RosterError::ApiError(_)
            | RosterError::RateLimited { .. } => ErrorSeverity::Medium,
            RosterError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RosterError::ApiError(_) => "無法連線到資料服務".to_string(),
            RosterError::RateLimited { .. } => "請求過於頻繁，已超過重試次數".to_string(),
            RosterError::SessionExpired => "登錄已失效，請重新登錄".to_string(),
            RosterError::Unauthorized { message } => format!("登錄失敗：{}", message),
            RosterError::Forbidden { .. } => "權限不足：需要管理員權限".to_string(),
            RosterError::NotFound { class, id } => format!("找不到記錄 {}/{}", class, id),
            RosterError::StoreError { code, message } => {
                format!("資料服務返回錯誤 ({}): {}", code, message)
            }
            RosterError::ConfigError { .. }
            | RosterError::ConfigValidationError { .. }
            | RosterError::InvalidConfigValueError { .. }
            | RosterError::MissingConfigError { .. } => format!("配置錯誤：{}", self),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "檢查網路連線或稍後再試",
            ErrorCategory::Store => "確認記錄 ID 是否正確，或執行 `roster init` 初始化資料表",
            ErrorCategory::Auth => "使用 `roster login` 重新登錄，或聯絡管理員",
            ErrorCategory::Configuration => "檢查配置檔案與環境變數",
            ErrorCategory::Data => "檢查輸入資料格式",
            ErrorCategory::System => "檢查檔案權限與磁碟空間",
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_missing_detection() {
        assert!(RosterError::store(CODE_OBJECT_NOT_FOUND, "Class not found").is_class_missing());
        assert!(!RosterError::store(CODE_PASSWORD_MISMATCH, "bad").is_class_missing());
        assert_eq!(
            RosterError::NotFound {
                class: "leave_records".to_string(),
                id: "x".to_string()
            }
            .store_code(),
            Some(CODE_OBJECT_NOT_FOUND)
        );
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(RosterError::SessionExpired.severity(), ErrorSeverity::High);
        assert_eq!(
            RosterError::RateLimited {
                message: "429".to_string()
            }
            .severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(RosterError::SessionExpired.category(), ErrorCategory::Auth);
    }

    #[test]
    fn test_rejected_input_exits_non_zero() {
        let not_found = RosterError::NotFound {
            class: "training_members".to_string(),
            id: "ghost".to_string(),
        };
        let invalid = RosterError::validation("end date is before start date");

        for err in [not_found, invalid] {
            assert_eq!(err.severity(), ErrorSeverity::Medium);
            assert_ne!(err.severity().exit_code(), 0);
        }
        assert_eq!(ErrorSeverity::High.exit_code(), 1);
        assert_eq!(ErrorSeverity::Critical.exit_code(), 3);
    }
}
