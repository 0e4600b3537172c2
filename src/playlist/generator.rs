use super::assembler::{Assembly, PlaylistAssembler, StopReason};
use super::recommender::RecommendationEngine;
use super::scoring::ScoringEngine;
use super::track::{ScoredTrack, Track, User, sort_by_score};
use super::{Playlist, PlaylistConfig};
use crate::cancel::CancellationToken;
use crate::catalog::{
    Catalog, ListeningStatsProvider, PlaylistPublisher, RemoveOutcome, TrackFilter,
};
use crate::error::GenerationError;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::fmt;

/// Why a run ended without producing a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoMusicLibrary,
    UserNotFound(String),
    /// No catalog track scored above zero for the user
    EmptyCandidatePool,
    /// Candidates existed but none fit in the duration budget
    EmptyPlaylist,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMusicLibrary => write!(f, "no music library found"),
            SkipReason::UserNotFound(name) => write!(f, "user '{name}' not found"),
            SkipReason::EmptyCandidatePool => write!(f, "no candidate tracks for this user"),
            SkipReason::EmptyPlaylist => write!(f, "no candidate fits in the duration budget"),
        }
    }
}

/// A playlist built for a user, not yet published
#[derive(Debug, Clone)]
pub struct BuiltPlaylist {
    pub playlist: Playlist,
    pub assembly: Assembly,
    pub candidate_count: usize,
}

/// Terminal state of a successful run
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Published {
        playlist: Playlist,
        playlist_id: String,
        stop_reason: StopReason,
    },
    Skipped(SkipReason),
}

/// Runs score → expand → assemble → publish for one playlist configuration
pub struct PlaylistGenerator {
    config: PlaylistConfig,
    scoring: ScoringEngine,
}

impl PlaylistGenerator {
    pub fn new(config: PlaylistConfig) -> Self {
        let scoring = ScoringEngine::new(config.scoring.clone());
        Self { config, scoring }
    }

    pub fn config(&self) -> &PlaylistConfig {
        &self.config
    }

    /// Build the playlist and replace the published copy.
    ///
    /// Nothing reaches the publisher unless the whole build succeeded and the
    /// run was not cancelled.
    pub fn generate<C, S, P>(
        &self,
        catalog: &C,
        stats: &S,
        publisher: &P,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, GenerationError>
    where
        C: Catalog,
        S: ListeningStatsProvider + Sync,
        P: PlaylistPublisher,
    {
        let built = match self.build_playlist(catalog, stats, cancel, now)? {
            Ok(built) => built,
            Err(reason) => {
                log::warn!("Skipping playlist '{}': {}", self.config.name, reason);
                return Ok(GenerationOutcome::Skipped(reason));
            }
        };

        log::info!(
            "Built '{}' from {} candidates: {} tracks, {}s",
            built.playlist.name,
            built.candidate_count,
            built.assembly.tracks.len(),
            built.assembly.total_duration
        );

        let playlist_id = self.publish(publisher, &built.playlist, cancel)?;
        Ok(GenerationOutcome::Published {
            playlist: built.playlist,
            playlist_id,
            stop_reason: built.assembly.stop_reason,
        })
    }

    /// Everything up to, but not including, publishing
    pub fn build_playlist<C, S>(
        &self,
        catalog: &C,
        stats: &S,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<Result<BuiltPlaylist, SkipReason>, GenerationError>
    where
        C: Catalog,
        S: ListeningStatsProvider + Sync,
    {
        cancel.check()?;
        let libraries = catalog.music_libraries().map_err(GenerationError::Catalog)?;
        if libraries.is_empty() {
            return Ok(Err(SkipReason::NoMusicLibrary));
        }
        log::debug!("Music libraries: {}", libraries.join(", "));

        let Some(user) = catalog
            .fetch_user_by_name(&self.config.user)
            .map_err(GenerationError::Catalog)?
        else {
            return Ok(Err(SkipReason::UserNotFound(self.config.user.clone())));
        };

        cancel.check()?;
        let filter = TrackFilter::audio().limit(self.config.catalog_sample_size);
        let tracks: Vec<Track> = catalog
            .fetch_tracks(&filter)
            .map_err(GenerationError::Catalog)?
            .into_iter()
            .filter(|track| filter.accepts(track))
            .collect();
        log::info!("Scoring {} catalog tracks for '{}'", tracks.len(), user.name);
        log::debug!("Scoring with {:?}", self.scoring.config());

        let mut pool = self.score_tracks(tracks, &user, stats, cancel, now)?;
        pool.retain(|scored| scored.score > 0.0);
        sort_by_score(&mut pool);
        if pool.is_empty() {
            return Ok(Err(SkipReason::EmptyCandidatePool));
        }
        log::info!("{} tracks are known to '{}'", pool.len(), user.name);

        let recommended = self.expand_pool(&pool, &user, catalog, stats, cancel, now)?;
        pool.extend(recommended);
        sort_by_score(&mut pool);

        let assembly =
            PlaylistAssembler::assemble_cancellable(&pool, self.config.duration_minutes, cancel)?;
        if assembly.tracks.is_empty() {
            return Ok(Err(SkipReason::EmptyPlaylist));
        }

        Ok(Ok(BuiltPlaylist {
            playlist: Playlist::from_assembly(&self.config.name, &user.id, &assembly),
            candidate_count: pool.len(),
            assembly,
        }))
    }

    /// Score every track in parallel; the result is unordered
    fn score_tracks<S>(
        &self,
        tracks: Vec<Track>,
        user: &User,
        stats: &S,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredTrack>, GenerationError>
    where
        S: ListeningStatsProvider + Sync,
    {
        tracks
            .into_par_iter()
            .map(|track| -> Result<ScoredTrack, GenerationError> {
                cancel.check()?;
                let track_stats = stats.fetch_listening_stats(&user.id, &track.id);
                let score = self.scoring.score(&track, &track_stats, now);
                Ok(ScoredTrack::new(track, user.id.clone(), score))
            })
            .collect()
    }

    fn expand_pool<C, S>(
        &self,
        pool: &[ScoredTrack],
        user: &User,
        catalog: &C,
        stats: &S,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredTrack>, GenerationError>
    where
        C: Catalog,
        S: ListeningStatsProvider,
    {
        let mode = self.config.expansion;
        let seed = &pool[..pool.len().min(self.config.recommendation.seed_count)];
        let engine = RecommendationEngine::new(
            catalog,
            stats,
            &self.scoring,
            self.config.recommendation.clone(),
            self.config.exploration_coefficient,
            now,
            cancel,
        );
        log::debug!(
            "Expanding from {} seeds ({:?}, exploration {:?})",
            seed.len(),
            mode,
            engine.band()
        );

        let mut recommended = Vec::new();
        if mode.uses_similarity() {
            recommended.extend(engine.expand(seed, user)?);
        }
        if mode.uses_genres() {
            recommended.extend(engine.expand_by_genre(seed, user)?);
        }
        Ok(recommended)
    }

    /// Replace any playlist with the same name, then create the new one
    fn publish<P>(
        &self,
        publisher: &P,
        playlist: &Playlist,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>
    where
        P: PlaylistPublisher,
    {
        cancel.check()?;
        let publish_error = |cause| GenerationError::Publish {
            name: playlist.name.clone(),
            cause,
        };

        match publisher.remove_playlist(&playlist.name).map_err(publish_error)? {
            RemoveOutcome::Removed => log::info!("Removed previous '{}'", playlist.name),
            RemoveOutcome::NotFound => log::debug!("No previous '{}' to remove", playlist.name),
        }

        let playlist_id = publisher.publish_playlist(playlist).map_err(publish_error)?;
        log::info!(
            "Published '{}' with {} tracks (ID: {})",
            playlist.name,
            playlist.track_ids.len(),
            playlist_id
        );
        Ok(playlist_id)
    }
}
