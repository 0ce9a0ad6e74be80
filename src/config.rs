//! Engine configuration.

use core::time::Duration;
use std::env;

use canopy_core::DEFAULT_ID_LENGTH;
use serde::{Deserialize, Deserializer};

use crate::ConfigError;

const BATCH_WINDOW_VAR: &str = "CANOPY_BATCH_WINDOW_MS";
const ID_LENGTH_VAR: &str = "CANOPY_ID_LENGTH";
const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(100);
const ID_LENGTH_RANGE: core::ops::RangeInclusive<usize> = 4..=32;

/// Tunables of a [`Tree`](crate::Tree).
///
/// Embeddable in a host configuration file:
///
/// ```
/// let config: canopy::TreeConfig =
///     serde_json::from_str(r#"{"batch_window_ms": 16}"#).unwrap();
/// assert_eq!(config.batch_window.as_millis(), 16);
/// assert_eq!(config.id_length, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// How long refresh requests are collected before a batch is applied.
    #[serde(rename = "batch_window_ms", deserialize_with = "millis")]
    pub batch_window: Duration,
    /// Characters kept from each generated node id.
    pub id_length: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

impl TreeConfig {
    /// Reads `CANOPY_BATCH_WINDOW_MS` and `CANOPY_ID_LENGTH`.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`TreeConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(millis) = parse_var(&lookup, BATCH_WINDOW_VAR)? {
            config.batch_window = Duration::from_millis(millis);
        }
        if let Some(length) = parse_var(&lookup, ID_LENGTH_VAR)? {
            config.id_length = usize::try_from(length).map_err(|_| ConfigError::Malformed {
                name: ID_LENGTH_VAR,
                value: length.to_string(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the batching window.
    #[must_use]
    pub const fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Sets the id length.
    #[must_use]
    pub const fn with_id_length(mut self, length: usize) -> Self {
        self.id_length = length;
        self
    }

    /// Clamps the id length into `4..=32`, logging the adjustment.
    ///
    /// ```
    /// let config = canopy::TreeConfig::default().with_id_length(0).sanitized();
    /// assert_eq!(config.id_length, 4);
    /// ```
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if let Err(error) = self.validate() {
            let clamped = self
                .id_length
                .clamp(*ID_LENGTH_RANGE.start(), *ID_LENGTH_RANGE.end());
            tracing::warn!(%error, clamped, "adjusting tree configuration");
            self.id_length = clamped;
        }
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IdLength`] for lengths outside `4..=32`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if ID_LENGTH_RANGE.contains(&self.id_length) {
            Ok(())
        } else {
            Err(ConfigError::IdLength(self.id_length))
        }
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::Malformed { name, value: raw })
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        assert_eq!(TreeConfig::from_lookup(lookup(&[])).unwrap(), TreeConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = TreeConfig::from_lookup(lookup(&[
            (BATCH_WINDOW_VAR, "16"),
            (ID_LENGTH_VAR, " 12 "),
        ]))
        .unwrap();
        assert_eq!(config.batch_window, Duration::from_millis(16));
        assert_eq!(config.id_length, 12);
    }

    #[test]
    fn malformed_variables_are_rejected() {
        let error = TreeConfig::from_lookup(lookup(&[(BATCH_WINDOW_VAR, "soon")])).unwrap_err();
        assert_eq!(
            error,
            ConfigError::Malformed {
                name: BATCH_WINDOW_VAR,
                value: "soon".into()
            }
        );
        assert_eq!(
            TreeConfig::from_lookup(lookup(&[(ID_LENGTH_VAR, "64")])).unwrap_err(),
            ConfigError::IdLength(64)
        );
    }

    #[test]
    fn sanitized_clamps_out_of_range_lengths() {
        let sanitized = |length| TreeConfig::default().with_id_length(length).sanitized();
        assert_eq!(sanitized(0).id_length, 4);
        assert_eq!(sanitized(64).id_length, 32);
        assert_eq!(sanitized(12).id_length, 12);
        assert!(sanitized(0).validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: TreeConfig = serde_json::from_str(r#"{"id_length": 8}"#).unwrap();
        assert_eq!(config.batch_window, DEFAULT_BATCH_WINDOW);
        assert_eq!(config.id_length, 8);
    }
}
