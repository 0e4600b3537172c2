use super::ScoringConfig;
use super::track::{ListeningStats, Track};
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Computes the affinity of a user for a track from their listening history.
///
/// Pure: the score depends only on the stats, the configuration and `now`.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Weighted sum of the favorite, recency and familiarity signals.
    ///
    /// Tracks played fewer than `min_play_threshold` times are unknown to the
    /// listener and score exactly zero.
    pub fn score(&self, _track: &Track, stats: &ListeningStats, now: DateTime<Utc>) -> f64 {
        if stats.play_count < self.config.min_play_threshold {
            return 0.0;
        }

        let favorite = if stats.is_favorite { 1.0 } else { 0.0 };
        let recency = stats
            .last_played
            .map(|played| Self::recency(Self::days_since(played, now), self.config.decay_rate))
            .unwrap_or(0.0);
        let familiarity = Self::familiarity(stats.play_count);

        self.config.favorite_weight * favorite
            + self.config.recency_weight * recency
            + self.config.familiarity_weight * familiarity
    }

    /// Fractional days between `played` and `now`, clamped at zero for
    /// timestamps in the future
    pub fn days_since(played: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(played);
        (elapsed.num_seconds() as f64 / SECONDS_PER_DAY).max(0.0)
    }

    /// Logistic decay of elapsed days, 0.5 for a track played right now
    pub fn recency(days: f64, decay_rate: f64) -> f64 {
        1.0 / (1.0 + (decay_rate * days.max(0.0)).exp())
    }

    /// Dampens the contribution of heavily played tracks
    pub fn familiarity(play_count: u32) -> f64 {
        1.0 / (1.0 + (1.0 + f64::from(play_count)).log2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn stats(play_count: u32, is_favorite: bool, days_ago: Option<i64>) -> ListeningStats {
        ListeningStats {
            play_count,
            is_favorite,
            last_played: days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig::default())
    }

    #[test]
    fn test_below_threshold_scores_zero() {
        let track = Track::new("t", Some(200));
        for play_count in 0..3 {
            let score = engine().score(&track, &stats(play_count, true, Some(0)), now());
            assert_eq!(score, 0.0, "play_count {play_count} should score zero");
        }
        assert_eq!(engine().score(&track, &ListeningStats::default(), now()), 0.0);
    }

    #[test]
    fn test_weighted_sum_of_signals() {
        let track = Track::new("t", Some(200));
        let score = engine().score(&track, &stats(5, true, Some(0)), now());

        let expected = 0.40 * 1.0 + 0.35 * 0.5 + 0.25 * (1.0 / (1.0 + 6f64.log2()));
        assert_relative_eq!(score, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_never_played_has_no_recency() {
        let track = Track::new("t", Some(200));
        let score = engine().score(&track, &stats(4, false, None), now());
        assert_relative_eq!(score, 0.25 * ScoringEngine::familiarity(4), epsilon = 1e-12);
    }

    #[test]
    fn test_future_timestamp_is_clamped() {
        let future = now() + Duration::days(3);
        assert_eq!(ScoringEngine::days_since(future, now()), 0.0);

        let track = Track::new("t", Some(200));
        let skewed = ListeningStats {
            play_count: 5,
            is_favorite: false,
            last_played: Some(future),
        };
        let today = engine().score(&track, &stats(5, false, Some(0)), now());
        assert_relative_eq!(engine().score(&track, &skewed, now()), today, epsilon = 1e-12);
    }

    #[test]
    fn test_recency_is_non_increasing() {
        let mut previous = ScoringEngine::recency(0.0, 0.5);
        assert_relative_eq!(previous, 0.5);
        for day in 1..120 {
            let current = ScoringEngine::recency(day as f64 * 0.5, 0.5);
            assert!(current <= previous, "recency rose at day {day}");
            previous = current;
        }
    }

    #[test]
    fn test_familiarity_decreases_with_play_count() {
        assert_relative_eq!(ScoringEngine::familiarity(0), 1.0);
        assert_relative_eq!(ScoringEngine::familiarity(1), 0.5);
        assert!(ScoringEngine::familiarity(10) < ScoringEngine::familiarity(3));
        // Never the `1/1 + log2(..)` form, which is always at least one
        assert!(ScoringEngine::familiarity(3) < 1.0);
    }

    #[test]
    fn test_score_stays_within_weight_bounds() {
        let track = Track::new("t", Some(200));
        let engine = engine();
        let upper = engine.config().weight_sum();
        for play_count in [0, 3, 7, 50, 10_000] {
            for favorite in [false, true] {
                for days in [None, Some(-5), Some(0), Some(2), Some(365)] {
                    let score = engine.score(&track, &stats(play_count, favorite, days), now());
                    assert!(score >= 0.0 && score <= upper, "score {score} out of bounds");
                }
            }
        }
    }
}
