//! Run configuration for the VM.
//!
//! Values come from command-line flags, falling back to environment
//! variables:
//!
//! - `IMP_TRACE`: `1`/`true`/`yes`/`on` enables per-step tracing
//! - `IMP_MAX_STEPS`: positive instruction budget for a run

use crate::machine::errors::VMError;
use std::env;

/// Environment variable enabling trace mode.
pub const TRACE_ENV: &str = "IMP_TRACE";
/// Environment variable holding the step limit.
pub const MAX_STEPS_ENV: &str = "IMP_MAX_STEPS";

/// Options for a single VM run. None of them change instruction semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmConfig {
    /// Log pc, mnemonic and stack before every step.
    pub trace: bool,
    /// Abort with `StepLimitExceeded` after this many instructions.
    pub max_steps: Option<u64>,
}

impl VmConfig {
    /// Returns the default configuration: no trace, no step limit.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, VMError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VMError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(value) = lookup(TRACE_ENV) {
            config.trace = parse_flag(TRACE_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_STEPS_ENV) {
            config.max_steps = Some(parse_max_steps(MAX_STEPS_ENV, &value)?);
        }

        Ok(config)
    }
}

/// Parses a boolean switch.
pub fn parse_flag(key: &'static str, value: &str) -> Result<bool, VMError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VMError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

/// Parses a step limit, which must be a positive integer.
pub fn parse_max_steps(key: &'static str, value: &str) -> Result<u64, VMError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(VMError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = VmConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, VmConfig::new());
        assert!(!config.trace);
        assert_eq!(config.max_steps, None);
    }

    #[test]
    fn reads_trace_and_limit() {
        let config =
            VmConfig::from_lookup(lookup_from(&[(TRACE_ENV, "on"), (MAX_STEPS_ENV, "1000")]))
                .unwrap();
        assert!(config.trace);
        assert_eq!(config.max_steps, Some(1000));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            VmConfig::from_lookup(lookup_from(&[(TRACE_ENV, "maybe")])),
            Err(VMError::InvalidConfig { key: TRACE_ENV, .. })
        ));
        assert!(matches!(
            VmConfig::from_lookup(lookup_from(&[(MAX_STEPS_ENV, "0")])),
            Err(VMError::InvalidConfig { key: MAX_STEPS_ENV, .. })
        ));
        assert!(matches!(
            parse_max_steps(MAX_STEPS_ENV, "-5"),
            Err(VMError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn builders_override() {
        let config = VmConfig::new().with_trace(true).with_max_steps(Some(3));
        assert!(config.trace);
        assert_eq!(config.max_steps, Some(3));
    }
}
