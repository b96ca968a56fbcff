//! Environment variable helpers

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A variable was set but could not be parsed
#[derive(Debug, Error)]
#[error("invalid value for {name}: {value:?} ({reason})")]
pub struct EnvError {
    pub name: String,
    pub value: String,
    pub reason: String,
}

/// Read `name`, falling back to `default` when unset or blank
pub fn env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

/// Parse `name` into `T`, returning `default` when the variable is unset
pub fn env_parse<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse::<T>().map_err(|e| EnvError {
                name: name.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

/// Parse `name` as a whole number of seconds
pub fn env_duration_secs(name: &str, default: Duration) -> Result<Duration, EnvError> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or("ADVISOR_UTILS_TEST_UNSET_VAR", "fallback"), "fallback");
    }

    #[test]
    fn test_env_parse_unset_uses_default() {
        let value: f32 = env_parse("ADVISOR_UTILS_TEST_UNSET_FLOAT", 0.2).unwrap();
        assert!((value - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_parse_invalid() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("ADVISOR_UTILS_TEST_BAD_INT", "twelve");
        }
        let err = env_parse::<u64>("ADVISOR_UTILS_TEST_BAD_INT", 1).unwrap_err();
        assert_eq!(err.name, "ADVISOR_UTILS_TEST_BAD_INT");
        assert!(err.to_string().contains("twelve"));
    }

    #[test]
    fn test_env_duration_secs() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("ADVISOR_UTILS_TEST_TIMEOUT", "42");
        }
        let timeout =
            env_duration_secs("ADVISOR_UTILS_TEST_TIMEOUT", Duration::from_secs(1)).unwrap();
        assert_eq!(timeout, Duration::from_secs(42));
    }
}
