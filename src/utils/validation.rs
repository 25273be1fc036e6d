use crate::utils::error::{AntaError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// eAPI 端點：只接受帶主機的 http / https URL
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(AntaError::invalid_value(field_name, url_str, "URL cannot be empty"));
    }
    let url = Url::parse(url_str)
        .map_err(|e| AntaError::invalid_value(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|host| !host.is_empty()) => Ok(()),
        "http" | "https" => Err(AntaError::invalid_value(field_name, url_str, "URL has no host")),
        scheme => Err(AntaError::invalid_value(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(AntaError::invalid_value(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AntaError::invalid_value(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

/// 測試輸入的清單至少要有一筆
pub fn validate_non_empty_list<T>(field_name: &str, values: &[T]) -> Result<()> {
    if values.is_empty() {
        return Err(AntaError::invalid_value(field_name, "[]", "List should have at least 1 item"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(field_name: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        return Err(AntaError::invalid_value(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("host", "https://10.0.0.1:443").is_ok());
        assert!(validate_url("host", "http://leaf1.lab").is_ok());
        assert!(validate_url("host", "").is_err());
        assert!(validate_url("host", "invalid-url").is_err());
        assert!(validate_url("host", "ftp://leaf1.lab").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_concurrency", 5, 1).is_ok());
        let err = validate_positive_number("max_concurrency", 0, 1).unwrap_err();
        assert_eq!(err.user_friendly_message(), "Invalid max_concurrency: Value must be at least 1");
    }

    #[test]
    fn test_validate_range_and_lists() {
        assert!(validate_range("revision", 1u8, 1, 99).is_ok());
        assert!(validate_range("revision", 100u8, 1, 99).is_err());
        assert!(validate_non_empty_list::<String>("versions", &[]).is_err());
        assert!(validate_non_empty_string("hostname", "  ").is_err());
    }
}
