use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Exploration coefficients are accepted in this closed range
pub const EXPLORATION_RANGE: (f64, f64) = (0.0, 5.0);

/// Configuration for one generated playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    #[serde(default = "default_name")]
    pub name: String, // Display name, replaced on every run
    pub user: String, // Listener the playlist is generated for
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(default = "default_exploration_coefficient")]
    pub exploration_coefficient: f64, // 0 = exploit known favourites, 5 = explore
    #[serde(default)]
    pub expansion: ExpansionMode,
    #[serde(default)]
    pub recommendation: RecommendationLimits,
    #[serde(default = "default_catalog_sample_size")]
    pub catalog_sample_size: u32, // How many catalog tracks to score per run
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Which recommendation passes broaden the candidate pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    None,
    #[default]
    Similar,
    Genre,
    Both,
}

impl ExpansionMode {
    pub fn uses_similarity(self) -> bool {
        matches!(self, ExpansionMode::Similar | ExpansionMode::Both)
    }

    pub fn uses_genres(self) -> bool {
        matches!(self, ExpansionMode::Genre | ExpansionMode::Both)
    }
}

/// Query caps used by the recommendation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationLimits {
    pub seed_count: usize, // Top scored tracks used as expansion seeds
    pub similar_limit: u32, // Similar tracks requested per seed
    pub genre_limit: u32, // Cap on genre matches per run
}

impl Default for RecommendationLimits {
    fn default() -> Self {
        Self {
            seed_count: 10,
            similar_limit: 3,
            genre_limit: 50,
        }
    }
}

/// Weights and constants of the affinity score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub favorite_weight: f64,
    pub recency_weight: f64,
    pub familiarity_weight: f64,
    pub decay_rate: f64, // Per-day rate of the logistic recency decay
    pub min_play_threshold: u32, // Tracks played fewer times score zero
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            favorite_weight: 0.40,
            recency_weight: 0.35,
            familiarity_weight: 0.25,
            decay_rate: 0.5,
            min_play_threshold: 3,
        }
    }
}

impl ScoringConfig {
    pub fn weight_sum(&self) -> f64 {
        self.favorite_weight + self.recency_weight + self.familiarity_weight
    }

    fn validate(&self) -> Result<(), String> {
        let weights = [
            ("favorite_weight", self.favorite_weight),
            ("recency_weight", self.recency_weight),
            ("familiarity_weight", self.familiarity_weight),
        ];
        for (name, weight) in weights {
            if !(weight >= 0.0) {
                return Err(format!("{name} must be a non-negative number, got {weight}"));
            }
        }
        if (self.weight_sum() - 1.0).abs() > 1e-6 {
            return Err(format!(
                "scoring weights must sum to 1.0, got {:.4}",
                self.weight_sum()
            ));
        }
        if !(self.decay_rate >= 0.0) || !self.decay_rate.is_finite() {
            return Err(format!(
                "decay_rate must be a non-negative number, got {}",
                self.decay_rate
            ));
        }
        Ok(())
    }
}

fn default_name() -> String {
    "My Personal Mix".to_string()
}

fn default_duration_minutes() -> u32 {
    600
}

fn default_exploration_coefficient() -> f64 {
    3.0
}

fn default_catalog_sample_size() -> u32 {
    2000
}

impl PlaylistConfig {
    /// Build a configuration with defaults for everything but the listener
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            user: user.into(),
            duration_minutes: default_duration_minutes(),
            exploration_coefficient: default_exploration_coefficient(),
            expansion: ExpansionMode::default(),
            recommendation: RecommendationLimits::default(),
            catalog_sample_size: default_catalog_sample_size(),
            scoring: ScoringConfig::default(),
        }
    }

    /// Load playlist configurations directly from a JSON array file
    pub fn load_all_from_file(path: &str) -> Result<Vec<PlaylistConfig>, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse_all(&content)
    }

    /// Parse and validate a JSON array of playlist configurations
    pub fn parse_all(content: &str) -> Result<Vec<PlaylistConfig>, ConfigError> {
        let configs: Vec<PlaylistConfig> = serde_json::from_str(content)?;
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }

    /// Reject values the generator cannot act on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("playlist name must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(invalid("user must not be empty".to_string()));
        }
        if self.duration_minutes == 0 {
            return Err(invalid("duration_minutes must be positive".to_string()));
        }
        let (low, high) = EXPLORATION_RANGE;
        if !(low..=high).contains(&self.exploration_coefficient) {
            return Err(invalid(format!(
                "exploration_coefficient must be within {low}..={high}, got {}",
                self.exploration_coefficient
            )));
        }
        self.scoring.validate().map_err(invalid)
    }
}
