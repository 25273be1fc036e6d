use thiserror::Error;

#[derive(Error, Debug)]
pub enum AntaError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Inventory error: {message}")]
    InventoryError { message: String },

    #[error("Catalog error in {location}: {message}")]
    CatalogError { location: String, message: String },

    #[error("Inputs are not valid for {test}: {message}")]
    InputValidationError { test: String, message: String },

    #[error("Cannot render template {{template='{template}'}}: key '{key}' is missing")]
    TemplateRenderError { template: String, key: String },

    #[error("Command '{command}' output is not available: {reason}")]
    CommandOutputError { command: String, reason: String },

    #[error("{message}")]
    TestError { message: String },
}

/// 錯誤分類，供 CLI 決定提示與退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    System,
}

impl AntaError {
    /// 測試主體內的失敗條件，直接以訊息回報
    pub fn test(message: impl Into<String>) -> Self {
        AntaError::TestError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AntaError::ConfigError {
            message: message.into(),
        }
    }

    pub fn invalid_value(field: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        AntaError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AntaError::HttpError(_) => ErrorCategory::Network,
            AntaError::ConfigError { .. }
            | AntaError::MissingConfigError { .. }
            | AntaError::InvalidConfigValueError { .. }
            | AntaError::InventoryError { .. }
            | AntaError::CatalogError { .. }
            | AntaError::InputValidationError { .. } => ErrorCategory::Configuration,
            AntaError::CsvError(_)
            | AntaError::SerializationError(_)
            | AntaError::YamlError(_)
            | AntaError::TemplateRenderError { .. }
            | AntaError::CommandOutputError { .. }
            | AntaError::TestError { .. } => ErrorCategory::Data,
            AntaError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check device reachability, eAPI configuration and consider increasing the timeout"
            }
            ErrorCategory::Configuration => {
                "Review the inventory, catalog and command line options"
            }
            ErrorCategory::Data => "Inspect the device output with 'anta debug run-cmd'",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AntaError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid {}: {}", field, reason)
            }
            AntaError::MissingConfigError { field } => format!("Missing option: {}", field),
            AntaError::CatalogError { location, message } => {
                format!("Unable to load catalog {}: {}", location, message)
            }
            AntaError::InventoryError { message } => format!("Unable to load inventory: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AntaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err = AntaError::InventoryError {
            message: "duplicate device".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.user_friendly_message(), "Unable to load inventory: duplicate device");

        let err = AntaError::test("boom");
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_template_error_message() {
        let err = AntaError::TemplateRenderError {
            template: "show ip route vrf {vrf}".to_string(),
            key: "vrf".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot render template {template='show ip route vrf {vrf}'}: key 'vrf' is missing"
        );
    }
}
