//! Environment variable parsing utilities
//!
//! Parse failures fall back to the default instead of erroring, so a typo in
//! an optional override never prevents startup.

use std::str::FromStr;

/// Parse an environment variable with a default fallback
///
/// # Example
/// ```ignore
/// let max: u32 = parse_env_with_default("DB_MAX_CONNECTIONS", 10);
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    parse_env_optional(key).unwrap_or(default)
}

/// Parse an environment variable, returning None if missing, empty or invalid
pub fn parse_env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_parse_env_with_default() {
        let result: u32 = parse_env_with_default("DBPOOL_NONEXISTENT_VAR", 42);
        assert_eq!(result, 42);

        std::env::set_var("DBPOOL_TEST_PORT", " 8080 ");
        let result: u16 = parse_env_with_default("DBPOOL_TEST_PORT", 3000);
        assert_eq!(result, 8080);
        std::env::remove_var("DBPOOL_TEST_PORT");
    }

    #[test]
    #[serial_test::serial]
    fn test_invalid_and_empty_values_fall_back() {
        std::env::set_var("DBPOOL_TEST_BAD", "ten");
        assert_eq!(parse_env_optional::<u32>("DBPOOL_TEST_BAD"), None);
        assert_eq!(parse_env_with_default("DBPOOL_TEST_BAD", 7u32), 7);

        std::env::set_var("DBPOOL_TEST_BAD", "");
        assert_eq!(parse_env_optional::<u32>("DBPOOL_TEST_BAD"), None);
        std::env::remove_var("DBPOOL_TEST_BAD");
    }
}
