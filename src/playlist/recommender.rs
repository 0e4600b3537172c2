use super::RecommendationLimits;
use super::scoring::ScoringEngine;
use super::track::{ScoredTrack, Track, User};
use crate::cancel::CancellationToken;
use crate::catalog::{Catalog, ListeningStatsProvider, TrackFilter};
use crate::error::GenerationError;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Coefficients at or below this keep only tracks the listener already likes
pub const CONSERVATIVE_MAX: f64 = 1.0;
/// Coefficients at or above this keep only under-explored tracks
pub const EXPLORATORY_MIN: f64 = 4.0;
/// Exploratory genre matches must score below this
pub const EXPLORATION_SCORE_CEILING: f64 = 0.5;

/// How genre candidates are filtered, derived from the exploration coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorationBand {
    /// `[0, 1]`: keep candidates with a positive score
    Conservative,
    /// `(1, 4)`: keep everything
    Balanced,
    /// `[4, 5]`: keep candidates scoring below 0.5
    Exploratory,
}

impl ExplorationBand {
    pub fn from_coefficient(coefficient: f64) -> Self {
        if coefficient <= CONSERVATIVE_MAX {
            ExplorationBand::Conservative
        } else if coefficient >= EXPLORATORY_MIN {
            ExplorationBand::Exploratory
        } else {
            ExplorationBand::Balanced
        }
    }

    pub fn keeps(self, candidate: &ScoredTrack) -> bool {
        match self {
            ExplorationBand::Conservative => candidate.score > 0.0,
            ExplorationBand::Balanced => true,
            ExplorationBand::Exploratory => candidate.score < EXPLORATION_SCORE_CEILING,
        }
    }
}

/// Grows a seed pool with similar and same-genre tracks from the catalog.
///
/// Only reads from its collaborators; deduplication is left to the assembler.
pub struct RecommendationEngine<'a, C, S> {
    catalog: &'a C,
    stats: &'a S,
    scoring: &'a ScoringEngine,
    limits: RecommendationLimits,
    band: ExplorationBand,
    now: DateTime<Utc>,
    cancel: &'a CancellationToken,
}

impl<'a, C, S> RecommendationEngine<'a, C, S>
where
    C: Catalog,
    S: ListeningStatsProvider,
{
    pub fn new(
        catalog: &'a C,
        stats: &'a S,
        scoring: &'a ScoringEngine,
        limits: RecommendationLimits,
        exploration_coefficient: f64,
        now: DateTime<Utc>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            catalog,
            stats,
            scoring,
            limits,
            band: ExplorationBand::from_coefficient(exploration_coefficient),
            now,
            cancel,
        }
    }

    pub fn band(&self) -> ExplorationBand {
        self.band
    }

    /// Up to `similar_limit` similar audio tracks per seed, scored for `user`
    pub fn expand(
        &self,
        seed: &[ScoredTrack],
        user: &User,
    ) -> Result<Vec<ScoredTrack>, GenerationError> {
        let mut recommendations = Vec::new();

        for song in seed {
            self.cancel.check()?;
            let filter = TrackFilter::audio()
                .similar_to(song.id())
                .limit(self.limits.similar_limit);
            let similar = self
                .catalog
                .fetch_tracks(&filter)
                .map_err(GenerationError::Catalog)?;

            let matching: Vec<Track> = similar
                .into_iter()
                .filter(|track| filter.accepts(track))
                .take(self.limits.similar_limit as usize)
                .collect();
            log::debug!("'{}' has {} similar tracks", song.id(), matching.len());

            for track in matching {
                recommendations.push(self.score_for(track, user)?);
            }
        }

        log::info!(
            "Similarity expansion of {} seeds produced {} candidates",
            seed.len(),
            recommendations.len()
        );
        Ok(recommendations)
    }

    /// Up to `genre_limit` audio tracks sharing a genre with the seed,
    /// filtered by the exploration band
    pub fn expand_by_genre(
        &self,
        seed: &[ScoredTrack],
        user: &User,
    ) -> Result<Vec<ScoredTrack>, GenerationError> {
        let genres: BTreeSet<String> = seed
            .iter()
            .flat_map(|song| song.track.genres.iter().cloned())
            .collect();
        if genres.is_empty() {
            log::info!("Seed tracks carry no genres, skipping genre expansion");
            return Ok(Vec::new());
        }

        self.cancel.check()?;
        let filter = TrackFilter::audio()
            .with_genres(genres)
            .limit(self.limits.genre_limit);
        let candidates = self
            .catalog
            .fetch_tracks(&filter)
            .map_err(GenerationError::Catalog)?;

        let mut recommendations = Vec::new();
        for track in candidates
            .into_iter()
            .filter(|track| filter.accepts(track))
            .take(self.limits.genre_limit as usize)
        {
            let scored = self.score_for(track, user)?;
            if self.band.keeps(&scored) {
                recommendations.push(scored);
            }
        }

        log::info!(
            "Genre expansion over {} genres kept {} candidates ({:?})",
            filter.genres.len(),
            recommendations.len(),
            self.band
        );
        Ok(recommendations)
    }

    fn score_for(&self, track: Track, user: &User) -> Result<ScoredTrack, GenerationError> {
        self.cancel.check()?;
        let stats = self.stats.fetch_listening_stats(&user.id, &track.id);
        let score = self.scoring.score(&track, &stats, self.now);
        Ok(ScoredTrack::new(track, user.id.clone(), score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockCatalog, MockListeningStatsProvider};
    use crate::playlist::{ListeningStats, ScoringConfig};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn user() -> User {
        User {
            id: "listener".to_string(),
            name: "listener".to_string(),
        }
    }

    fn seed(id: &str, genres: &[&str]) -> ScoredTrack {
        ScoredTrack::new(
            Track::new(id, Some(200)).with_genres(genres.iter().copied()),
            "listener",
            0.8,
        )
    }

    /// Stats where the play count is encoded in the track id suffix ("t-7" => 7).
    /// Ten or more plays makes a favourite played today.
    fn stats_by_id() -> MockListeningStatsProvider {
        let mut stats = MockListeningStatsProvider::new();
        stats.expect_fetch_listening_stats().returning(|_, track_id| {
            let play_count = track_id
                .rsplit('-')
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let favourite = play_count >= 10;
            ListeningStats {
                play_count,
                is_favorite: favourite,
                last_played: favourite.then(now),
            }
        });
        stats
    }

    #[test]
    fn test_bands_cover_the_whole_range() {
        assert_eq!(ExplorationBand::from_coefficient(0.0), ExplorationBand::Conservative);
        assert_eq!(ExplorationBand::from_coefficient(1.0), ExplorationBand::Conservative);
        assert_eq!(ExplorationBand::from_coefficient(1.5), ExplorationBand::Balanced);
        assert_eq!(ExplorationBand::from_coefficient(3.0), ExplorationBand::Balanced);
        assert_eq!(ExplorationBand::from_coefficient(4.0), ExplorationBand::Exploratory);
        assert_eq!(ExplorationBand::from_coefficient(5.0), ExplorationBand::Exploratory);
    }

    #[test]
    fn test_similarity_requests_audio_per_seed() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_fetch_tracks()
            .withf(|filter| {
                filter.kind == Some(crate::playlist::MediaKind::Audio) && filter.limit == Some(3)
            })
            .times(2)
            .returning(|filter| {
                let base = filter.similar_to.clone().unwrap_or_default();
                Ok((0..5)
                    .map(|i| Track::new(format!("{base}-sim{i}-{}", i * 2), Some(180)))
                    .collect())
            });
        let stats = stats_by_id();
        let scoring = ScoringEngine::new(ScoringConfig::default());
        let cancel = CancellationToken::new();
        let engine = RecommendationEngine::new(
            &catalog,
            &stats,
            &scoring,
            RecommendationLimits::default(),
            3.0,
            now(),
            &cancel,
        );

        let result = engine.expand(&[seed("a", &[]), seed("b", &[])], &user()).unwrap();

        assert_eq!(result.len(), 6);
        assert!(result.iter().all(|s| s.user_id == "listener"));
        assert_eq!(result[0].id(), "a-sim0-0");
        assert_eq!(result[3].id(), "b-sim0-0");
        assert_eq!(result[0].score, 0.0);
        assert!(result[2].score > 0.0);
    }

    fn genre_catalog() -> MockCatalog {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_fetch_tracks()
            .withf(|filter| filter.genres.contains("Rock") && filter.genres.contains("Jazz"))
            .returning(|_| {
                Ok([0, 1, 3, 5, 12, 40]
                    .iter()
                    .map(|plays| Track::new(format!("g-{plays}"), Some(200)).with_genres(["Rock"]))
                    .collect())
            });
        catalog
    }

    fn genre_expansion(coefficient: f64) -> Vec<ScoredTrack> {
        let catalog = genre_catalog();
        let stats = stats_by_id();
        let scoring = ScoringEngine::new(ScoringConfig::default());
        let cancel = CancellationToken::new();
        let engine = RecommendationEngine::new(
            &catalog,
            &stats,
            &scoring,
            RecommendationLimits::default(),
            coefficient,
            now(),
            &cancel,
        );
        engine
            .expand_by_genre(&[seed("a", &["Rock"]), seed("b", &["Jazz"])], &user())
            .unwrap()
    }

    #[test]
    fn test_conservative_genre_expansion_keeps_known_tracks() {
        let result = genre_expansion(0.5);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|s| s.score > 0.0));
    }

    #[test]
    fn test_exploratory_genre_expansion_keeps_low_scores() {
        let result = genre_expansion(4.5);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|s| s.score < EXPLORATION_SCORE_CEILING));
        assert!(result.iter().all(|s| s.id() != "g-12" && s.id() != "g-40"));
    }

    #[test]
    fn test_balanced_genre_expansion_passes_through() {
        assert_eq!(genre_expansion(2.0).len(), 6);
    }

    #[test]
    fn test_genre_expansion_without_genres_skips_catalog() {
        let mut catalog = MockCatalog::new();
        catalog.expect_fetch_tracks().times(0);
        let stats = MockListeningStatsProvider::new();
        let scoring = ScoringEngine::new(ScoringConfig::default());
        let cancel = CancellationToken::new();
        let engine = RecommendationEngine::new(
            &catalog,
            &stats,
            &scoring,
            RecommendationLimits::default(),
            0.0,
            now(),
            &cancel,
        );

        assert!(engine.expand_by_genre(&[seed("a", &[])], &user()).unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_expansion_stops_before_querying() {
        let mut catalog = MockCatalog::new();
        catalog.expect_fetch_tracks().times(0);
        let stats = MockListeningStatsProvider::new();
        let scoring = ScoringEngine::new(ScoringConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = RecommendationEngine::new(
            &catalog,
            &stats,
            &scoring,
            RecommendationLimits::default(),
            3.0,
            now(),
            &cancel,
        );

        let result = engine.expand(&[seed("a", &[])], &user());
        assert!(matches!(result, Err(GenerationError::Cancelled)));
    }
}
