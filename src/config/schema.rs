use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scoring::ScoringConfig;
use crate::synth::GenerationConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,

    #[serde(default)]
    pub generation: Option<GenerationConfig>,

    #[serde(default)]
    pub store: Option<StoreConfig>,
}

impl Config {
    /// Fully populated configuration, as written by `init`.
    pub fn with_defaults() -> Self {
        Self {
            scoring: Some(ScoringConfig::default()),
            generation: Some(GenerationConfig::default()),
            store: Some(StoreConfig::default()),
        }
    }

    pub fn effective_scoring(&self) -> ScoringConfig {
        self.scoring.clone().unwrap_or_default()
    }

    pub fn effective_generation(&self) -> GenerationConfig {
        self.generation.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Assessment store file. Defaults to ~/.config/finserv-overlay/assessments.json
    #[serde(default)]
    pub path: Option<PathBuf>,
}
