//! Environment variable configuration for xform-typecheck.
//!
//! This module provides a structured way to access environment variables
//! using the `envy` crate with serde deserialization.

use serde::Deserialize;

fn default_max_pipeline_nodes() -> usize {
    200_000
}

/// Environment configuration for the application.
///
/// All fields are optional and fall back to sane defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct EnvConfig {
    /// Enable debug mode for diagnostic output.
    ///
    /// When enabled, diagnostics are printed using simple Debug formatting
    /// instead of pretty-printed Ariadne reports.
    ///
    /// Set via: `DEV_DEBUG=1` or `DEV_DEBUG=true`
    #[serde(default)]
    pub dev_debug: bool,

    /// Upper bound on the number of grammar productions or MTT rules a
    /// single pipeline stage will iterate over before aborting with a
    /// schema defect. Guards against unbounded recursion on pathological
    /// or adversarial schema/stylesheet input.
    ///
    /// Set via: `MAX_PIPELINE_NODES=50000`
    #[serde(default = "default_max_pipeline_nodes")]
    pub max_pipeline_nodes: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            dev_debug: false,
            max_pipeline_nodes: default_max_pipeline_nodes(),
        }
    }
}

impl EnvConfig {
    /// Load configuration from environment variables.
    ///
    /// This will attempt to parse environment variables into the config
    /// struct. If parsing fails or variables are not set, it will return
    /// the default config.
    pub fn load() -> Self {
        envy::from_env::<EnvConfig>().unwrap_or_default()
    }

    /// Check if debug mode is enabled.
    pub fn is_debug_mode(&self) -> bool {
        self.dev_debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_env_config_with_dev_debug_enabled() {
        unsafe {
            env::set_var("DEV_DEBUG", "true");
        }
        let config = EnvConfig::load();
        assert!(config.is_debug_mode());
        unsafe {
            env::remove_var("DEV_DEBUG");
        }
    }

    #[test]
    fn test_env_config_default_max_pipeline_nodes() {
        let config = EnvConfig::default();
        assert_eq!(config.max_pipeline_nodes, 200_000);
    }
}
