//! Runtime configuration
//!
//! Every field defaults to the engine constants; `AGORA_*` environment
//! variables override individual values.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use agora_adversarial::{CommunityConfig, ControllerConfig, DEFAULT_CONVERGENCE_THRESHOLD};
use agora_core::{RevisionConfig, DEFAULT_SEARCH_LIMIT};
use agora_llm::{ConfigError, LlmConfig};

/// Live debate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    pub controller: ControllerConfig,
    /// Step cap for the preferred-extension search
    pub search_limit: usize,
    /// Turns of recent dialogue shown to the next speaker
    pub context_turns: usize,
    /// Consecutive failed turns after which the debate ends early
    pub max_consecutive_failures: u32,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            context_turns: 6,
            max_consecutive_failures: 4,
        }
    }
}

/// Belief-graph pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefConfig {
    /// Rounds of move exchange and revision
    pub rounds: u32,
    pub revision: RevisionConfig,
    pub community: CommunityConfig,
    pub top_k_cruxes: usize,
    /// Used when a persona has no explicit resistance and the estimate fails
    pub default_resistance: f64,
    pub convergence_threshold: f64,
    /// Cap on claim pairs sent to the comparison call
    pub max_candidate_pairs: usize,
    /// Where to dump artifacts; nothing is persisted when unset
    pub artifact_dir: Option<PathBuf>,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            revision: RevisionConfig::default(),
            community: CommunityConfig::default(),
            top_k_cruxes: 5,
            default_resistance: 0.5,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_candidate_pairs: 60,
            artifact_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub llm: LlmConfig,
    pub debate: DebateConfig,
    pub belief: BeliefConfig,
}

fn override_from_env<T: FromStr>(name: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var(name) {
        *slot = raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{}={}", name, raw)))?;
    }
    Ok(())
}

impl RuntimeConfig {
    /// Defaults overridden by `AGORA_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            llm: LlmConfig::from_env()?,
            ..Default::default()
        };

        let controller = &mut config.debate.controller;
        override_from_env("AGORA_TURN_BUDGET", &mut controller.turn_budget)?;
        override_from_env("AGORA_CIRCLING_WINDOW", &mut controller.circling_window)?;
        override_from_env("AGORA_CIRCLING_THRESHOLD", &mut controller.circling_threshold)?;
        override_from_env("AGORA_SEARCH_LIMIT", &mut config.debate.search_limit)?;

        let belief = &mut config.belief;
        override_from_env("AGORA_ROUNDS", &mut belief.rounds)?;
        override_from_env("AGORA_TOP_K_CRUXES", &mut belief.top_k_cruxes)?;
        override_from_env("AGORA_DEFAULT_RESISTANCE", &mut belief.default_resistance)?;
        override_from_env(
            "AGORA_CRUX_VARIANCE_THRESHOLD",
            &mut belief.community.crux_variance_threshold,
        )?;
        override_from_env(
            "AGORA_CONSENSUS_VARIANCE_THRESHOLD",
            &mut belief.community.consensus_variance_threshold,
        )?;
        if let Ok(dir) = env::var("AGORA_ARTIFACT_DIR") {
            belief.artifact_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.validate()?;
        let controller = &self.debate.controller;
        if controller.min_turns_between_crystallizations
            > controller.max_turns_between_crystallizations
        {
            return Err(ConfigError::Invalid(
                "min_turns_between_crystallizations exceeds max".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.belief.default_resistance) {
            return Err(ConfigError::Invalid(
                "default_resistance must lie in [0, 1]".to_string(),
            ));
        }
        if self.belief.community.consensus_variance_threshold
            > self.belief.community.crux_variance_threshold
        {
            return Err(ConfigError::Invalid(
                "consensus variance threshold exceeds crux threshold".to_string(),
            ));
        }
        Ok(())
    }
}
