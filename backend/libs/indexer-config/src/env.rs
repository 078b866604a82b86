//! Environment variable parsing helpers
//!
//! Missing variables fall back to defaults; present-but-malformed values are
//! rejected so a typo never silently becomes the default.

use std::str::FromStr;

use crate::ConfigError;

/// Parse an environment variable, falling back to `default` when unset or empty
///
/// # Example
/// ```ignore
/// let timeout: u64 = parse_env_with_default("KAFKA_SESSION_TIMEOUT_MS", 60_000)?;
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.clone(),
                })
        }
        _ => Ok(default),
    }
}

/// Parse a required environment variable
pub fn parse_env_required<T: FromStr>(key: &str) -> Result<T, ConfigError> {
    let raw = std::env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))?;
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: raw,
    })
}

/// Split a comma separated list, dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_parse_env_with_default() {
        std::env::remove_var("INDEXER_TEST_PORT");
        let result: u32 = parse_env_with_default("INDEXER_TEST_PORT", 42).unwrap();
        assert_eq!(result, 42);

        std::env::set_var("INDEXER_TEST_PORT", "8080");
        let result: u16 = parse_env_with_default("INDEXER_TEST_PORT", 3000).unwrap();
        assert_eq!(result, 8080);

        std::env::set_var("INDEXER_TEST_PORT", "eighty");
        let err = parse_env_with_default::<u16>("INDEXER_TEST_PORT", 3000).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        std::env::remove_var("INDEXER_TEST_PORT");
    }

    #[test]
    #[serial_test::serial]
    fn test_parse_env_required() {
        std::env::remove_var("INDEXER_TEST_REQ");
        let err = parse_env_required::<u32>("INDEXER_TEST_REQ").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));

        std::env::set_var("INDEXER_TEST_REQ", "456");
        assert_eq!(parse_env_required::<u32>("INDEXER_TEST_REQ").unwrap(), 456);
        std::env::remove_var("INDEXER_TEST_REQ");
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("kafka-1:9092, kafka-2:9092,,"),
            vec!["kafka-1:9092".to_string(), "kafka-2:9092".to_string()]
        );
        assert!(parse_list(" , ").is_empty());
    }
}
