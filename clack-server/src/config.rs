use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
pub const DEFAULT_SESSION_DAYS: i64 = 7;

#[derive(Debug, Error)]
#[error("{variable} is invalid: {reason}")]
pub struct ConfigError {
    pub variable: &'static str,
    pub reason: String,
}

/// Server settings, read once at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// A sqlite url. The in-memory store is used when this is unset.
    pub database_url: Option<String>,
    pub session_days: i64,
    /// How often an idle change feed gets a heartbeat
    pub keep_alive: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            session_days: DEFAULT_SESSION_DAYS,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: parse_var("CLACK_SERVER_PORT")?.unwrap_or(defaults.port),
            database_url: env::var("CLACK_DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            session_days: parse_var("CLACK_SESSION_DAYS")?.unwrap_or(defaults.session_days),
            keep_alive: parse_var("CLACK_KEEP_ALIVE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.keep_alive),
        })
    }
}

fn parse_var<T>(variable: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(variable) {
        Ok(value) => value.trim().parse().map(Some).map_err(|e: T::Err| ConfigError {
            variable,
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables_fall_back() {
        let value: Option<u16> = parse_var("CLACK_TEST_UNSET_VARIABLE").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_malformed_values_name_the_variable() {
        env::set_var("CLACK_TEST_MALFORMED_PORT", "eighty");

        let error = parse_var::<u16>("CLACK_TEST_MALFORMED_PORT").unwrap_err();
        assert_eq!(error.variable, "CLACK_TEST_MALFORMED_PORT");
        assert!(error.to_string().starts_with("CLACK_TEST_MALFORMED_PORT is invalid"));
    }

    #[test]
    fn test_values_are_trimmed() {
        env::set_var("CLACK_TEST_PADDED_DAYS", " 14 ");
        assert_eq!(parse_var::<i64>("CLACK_TEST_PADDED_DAYS").unwrap(), Some(14));
    }
}
