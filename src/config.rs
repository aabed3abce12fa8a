//! Environment configuration.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ONION_ADDR` | `0.0.0.0:3000` | listen address |
//! | `ONION_MIDDLEWARE` | *(none)* | comma-separated global middleware names |
//! | `ONION_MAX_IN_FLIGHT` | `1024` | cap for a [`ConcurrencyLimit`] stage |
//!
//! [`ConcurrencyLimit`]: crate::middleware::ConcurrencyLimit

use serde::Deserialize;

use crate::error::Error;

const PREFIX: &str = "ONION_";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Names resolved through a [`Registry`](crate::middleware::Registry).
    /// Surrounding whitespace and empty entries are dropped.
    #[serde(default)]
    pub middleware: Vec<String>,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_addr() -> String {
    "0.0.0.0:3000".to_owned()
}

fn default_max_in_flight() -> usize {
    1024
}

impl Config {
    /// Reads `ONION_*` variables from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Ok(envy::prefixed(PREFIX).from_env::<Config>()?.normalized())
    }

    /// Reads `ONION_*` variables from an explicit list of pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(PREFIX).from_iter::<_, Config>(vars)?.normalized())
    }

    fn normalized(mut self) -> Self {
        self.middleware = self
            .middleware
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            middleware: Vec::new(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_vars(vars(&[("PATH", "/usr/bin")])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000");
        assert!(config.middleware.is_empty());
        assert_eq!(config.max_in_flight, 1024);
    }

    #[test]
    fn middleware_list_is_comma_separated() {
        let config = Config::from_vars(vars(&[
            ("ONION_ADDR", "127.0.0.1:8080"),
            ("ONION_MIDDLEWARE", "trace,request-id,web"),
            ("ONION_MAX_IN_FLIGHT", "16"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080");
        assert_eq!(config.middleware, ["trace", "request-id", "web"]);
        assert_eq!(config.max_in_flight, 16);
    }

    #[test]
    fn middleware_names_are_trimmed() {
        let config = Config::from_vars(vars(&[("ONION_MIDDLEWARE", " trace, request-id ,,web ")]))
            .unwrap();
        assert_eq!(config.middleware, ["trace", "request-id", "web"]);
    }

    #[test]
    fn malformed_number_is_a_config_error() {
        let err = Config::from_vars(vars(&[("ONION_MAX_IN_FLIGHT", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
