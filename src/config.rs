//! Gradient lifecycle configuration.
//!
//! The reset policy decides whether a backward pass starts from zeroed
//! gradients or accumulates on top of whatever the previous passes left
//! behind. It lives in a [`GradConfig`] owned by each [`Graph`], so two graphs
//! never observe each other's policy.
//!
//! [`Graph`]: crate::graph::Graph

use crate::error::{GradError, Result};
use std::env::{self, VarError};

/// Environment variable read by [`GradConfig::from_env`].
pub const RESET_ENV_VAR: &str = "LAZYGRAD_RESET_GRADIENTS";

/// Per-graph engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradConfig {
    /// Zero every gradient on the discovered path before each backward pass.
    pub reset_on_backward: bool,
}

impl Default for GradConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GradConfig {
    /// Default settings: gradients reset before every backward pass.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reset_on_backward: true,
        }
    }

    /// Returns a copy with the reset policy set to `state`.
    #[must_use]
    pub const fn with_reset_on_backward(mut self, state: bool) -> Self {
        self.reset_on_backward = state;
        self
    }

    /// Reads the settings from the process environment.
    ///
    /// An unset [`RESET_ENV_VAR`] keeps the default.
    ///
    /// # Errors
    /// Returns [`GradError::InvalidArgument`] if the variable is set to
    /// something that is not a boolean.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(raw)) => Err(GradError::InvalidArgument(format!(
                "`{key}` is not valid unicode: {raw:?}"
            ))),
        })
    }

    /// Builds the settings from an arbitrary key lookup.
    ///
    /// # Errors
    /// Propagates lookup errors and rejects non-boolean values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let mut config = Self::new();
        if let Some(value) = lookup(RESET_ENV_VAR)? {
            config.reset_on_backward = parse_flag(&value)?;
        }
        Ok(config)
    }
}

/// Parses a boolean policy value.
///
/// Accepts `true`/`false`/`1`/`0`, ignoring case and surrounding whitespace.
///
/// # Errors
/// Returns [`GradError::InvalidArgument`] for anything else.
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(GradError::InvalidArgument(format!(
            "`state` should be a boolean. Received: {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resets_before_backward() {
        assert!(GradConfig::default().reset_on_backward);
        assert!(!GradConfig::new().with_reset_on_backward(false).reset_on_backward);
    }

    #[test]
    fn parse_flag_accepts_booleans_only() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag(" 1 ").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(matches!(parse_flag("maybe"), Err(GradError::InvalidArgument(_))));
        assert!(parse_flag("").is_err());
    }

    #[test]
    fn lookup_overrides_default() {
        let config = GradConfig::from_lookup(|_| Ok(Some("false".into()))).unwrap();
        assert!(!config.reset_on_backward);

        let config = GradConfig::from_lookup(|_| Ok(None)).unwrap();
        assert!(config.reset_on_backward);

        assert!(GradConfig::from_lookup(|_| Ok(Some("yes please".into()))).is_err());
    }
}
