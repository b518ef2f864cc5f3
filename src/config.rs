//! Run configuration: source weights and the artist roster.
//!
//! Weights come from the TOML file first, then CLI/env overrides. Validation
//! happens once, before any scoring.

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::{ArtistKey, Source};

pub const DEFAULT_YOUTUBE_WEIGHT: f64 = 0.5;
pub const DEFAULT_TIKTOK_WEIGHT: f64 = 0.5;

/// Per-source weights for `cpi = w_yt * norm_yt + w_tt * norm_tt`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub youtube: f64,
    pub tiktok: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            youtube: DEFAULT_YOUTUBE_WEIGHT,
            tiktok: DEFAULT_TIKTOK_WEIGHT,
        }
    }
}

impl Weights {
    pub fn new(youtube: f64, tiktok: f64) -> Self {
        Self { youtube, tiktok }
    }

    pub fn get(&self, source: Source) -> f64 {
        match source {
            Source::Youtube => self.youtube,
            Source::Tiktok => self.tiktok,
        }
    }

    /// Each weight finite and >= 0, and not both zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in Source::ALL {
            let value = self.get(source);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    source_name: source.as_str(),
                    value,
                });
            }
        }
        if self.youtube + self.tiktok <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }
        Ok(())
    }
}

/// One roster artist as written in the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    pub name: String,
}

/// Roster entry with its resolved key
#[derive(Debug, Clone, PartialEq)]
pub struct RosterArtist {
    pub key: ArtistKey,
    pub name: String,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub weights: Weights,
    #[serde(rename = "artists")]
    pub roster: Vec<RosterEntry>,
}

impl PipelineConfig {
    pub fn with_weights(weights: Weights) -> Self {
        Self {
            weights,
            roster: Vec::new(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: Default::default(),
            message: e.to_string(),
        })
    }

    /// Apply CLI/env weight overrides on top of file values
    pub fn override_weights(&mut self, youtube: Option<f64>, tiktok: Option<f64>) {
        if let Some(w) = youtube {
            self.weights.youtube = w;
        }
        if let Some(w) = tiktok {
            self.weights.tiktok = w;
        }
    }

    /// Resolve roster entries to keys, rejecting empty and colliding keys.
    pub fn resolved_roster(&self) -> Result<Vec<RosterArtist>, ConfigError> {
        let mut resolved: Vec<RosterArtist> = Vec::with_capacity(self.roster.len());
        for entry in &self.roster {
            let name = entry.name.trim().to_string();
            let key = ArtistKey::from_name(&name)
                .ok_or_else(|| ConfigError::EmptyRosterKey(entry.name.clone()))?;
            if let Some(existing) = resolved.iter().find(|r| r.key == key) {
                return Err(ConfigError::DuplicateRosterKey {
                    first: existing.name.clone(),
                    second: name,
                    key: key.to_string(),
                });
            }
            resolved.push(RosterArtist { key, name });
        }
        Ok(resolved)
    }

    /// Check weights and roster together; yields the resolved roster.
    pub fn validate(&self) -> Result<Vec<RosterArtist>, ConfigError> {
        self.weights.validate()?;
        self.resolved_roster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let w = Weights::default();
        assert_eq!(w.youtube, 0.5);
        assert_eq!(w.tiktok, 0.5);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_zero_weights_rejected() {
        assert_eq!(Weights::new(0.0, 0.0).validate(), Err(ConfigError::ZeroWeights));
        assert!(Weights::new(0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_negative_and_nan_weights_rejected() {
        assert!(matches!(
            Weights::new(-0.1, 1.0).validate(),
            Err(ConfigError::InvalidWeight { source_name: "youtube", .. })
        ));
        assert!(matches!(
            Weights::new(0.5, f64::NAN).validate(),
            Err(ConfigError::InvalidWeight { source_name: "tiktok", .. })
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            [weights]
            youtube = 0.55
            tiktok = 0.45

            [[artists]]
            name = "Taylor Swift"

            [[artists]]
            name = "Bad Bunny"
            "#,
        )
        .unwrap();
        assert_eq!(config.weights, Weights::new(0.55, 0.45));
        let roster = config.resolved_roster().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].key.as_str(), "badbunny");
        assert_eq!(roster[1].name, "Bad Bunny");
    }

    #[test]
    fn test_from_toml_partial_weights_keep_defaults() {
        let config = PipelineConfig::from_toml("[weights]\ntiktok = 0.2\n").unwrap();
        assert_eq!(config.weights, Weights::new(0.5, 0.2));
        assert!(config.roster.is_empty());
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            PipelineConfig::from_toml("[weights]\nyoutube = \"lots\"\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_override_weights() {
        let mut config = PipelineConfig::default();
        config.override_weights(Some(0.7), None);
        assert_eq!(config.weights, Weights::new(0.7, 0.5));
    }

    #[test]
    fn test_duplicate_roster_key_rejected() {
        let config = PipelineConfig {
            weights: Weights::default(),
            roster: vec![
                RosterEntry { name: "Doja Cat".into() },
                RosterEntry { name: "doja-cat".into() },
            ],
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateRosterKey { .. })
        ));
    }

    #[test]
    fn test_empty_roster_key_rejected() {
        let config = PipelineConfig {
            weights: Weights::default(),
            roster: vec![RosterEntry { name: "...".into() }],
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyRosterKey(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/cpi.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
