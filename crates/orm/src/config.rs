//! Loader configuration

use std::env;
use std::str::FromStr;

use crate::backends::SqlDialect;
use crate::error::{OrmError, OrmResult};

/// Configuration for planning and executing entity-graph loads
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Maximum depth of relationship paths, including those added by eager
    /// defaults in LOAD mode
    pub max_depth: usize,
    /// Maximum number of parent keys in one batch statement
    pub max_batch_size: usize,
    /// Dialect used when plans are rendered as SQL
    pub dialect: SqlDialect,
    /// Lazy statements since reset before an N+1 warning is logged
    pub n_plus_one_threshold: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_batch_size: 1000,
            dialect: SqlDialect::PostgreSQL,
            n_plus_one_threshold: Some(10),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from `FETCHGRAPH_*` environment variables, falling
    /// back to defaults for unset ones
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> OrmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            max_depth: parse_or("FETCHGRAPH_MAX_DEPTH", &lookup, defaults.max_depth)?,
            max_batch_size: parse_or("FETCHGRAPH_MAX_BATCH_SIZE", &lookup, defaults.max_batch_size)?,
            dialect: parse_or("FETCHGRAPH_DIALECT", &lookup, defaults.dialect)?,
            n_plus_one_threshold: match lookup("FETCHGRAPH_N_PLUS_ONE_THRESHOLD").as_deref() {
                None => defaults.n_plus_one_threshold,
                Some("off") | Some("none") => None,
                Some(raw) => Some(parse_value("FETCHGRAPH_N_PLUS_ONE_THRESHOLD", raw)?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> OrmResult<()> {
        if self.max_depth == 0 {
            return Err(OrmError::Configuration("max_depth must be at least 1".to_string()));
        }

        if self.max_batch_size == 0 {
            return Err(OrmError::Configuration("max_batch_size must be at least 1".to_string()));
        }

        if self.n_plus_one_threshold == Some(0) {
            return Err(OrmError::Configuration(
                "n_plus_one_threshold must be at least 1; disable it with 'off'".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> OrmResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> OrmResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| OrmError::Configuration(format!("Invalid value for {}: '{}' ({})", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = LoaderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LoaderConfig::default());
        assert_eq!(config.max_batch_size, 1000);
    }

    #[test]
    fn test_overrides_from_variables() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("FETCHGRAPH_MAX_DEPTH", "3"),
            ("FETCHGRAPH_MAX_BATCH_SIZE", "50"),
            ("FETCHGRAPH_DIALECT", "mysql"),
            ("FETCHGRAPH_N_PLUS_ONE_THRESHOLD", "off"),
        ]))
        .unwrap();

        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.dialect, SqlDialect::MySQL);
        assert_eq!(config.n_plus_one_threshold, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(LoaderConfig::from_lookup(lookup(&[("FETCHGRAPH_MAX_DEPTH", "deep")])).is_err());
        assert!(LoaderConfig::from_lookup(lookup(&[("FETCHGRAPH_MAX_BATCH_SIZE", "0")])).is_err());
        assert!(LoaderConfig::from_lookup(lookup(&[("FETCHGRAPH_DIALECT", "oracle")])).is_err());
    }
}
