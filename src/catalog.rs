//! Contracts of the host platform the generator reads from and publishes to.
//!
//! The generator only ever reads the catalog. Everything it writes goes
//! through [`PlaylistPublisher`].

use crate::playlist::{ListeningStats, MediaKind, Playlist, Track, User};
use anyhow::Result;
use std::collections::BTreeSet;

#[cfg(test)]
use mockall::automock;

/// Query passed to [`Catalog::fetch_tracks`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFilter {
    pub kind: Option<MediaKind>,
    /// Match tracks tagged with any of these genres
    pub genres: BTreeSet<String>,
    /// Rank tracks by similarity to this track id
    pub similar_to: Option<String>,
    pub limit: Option<u32>,
}

impl TrackFilter {
    pub fn audio() -> Self {
        Self {
            kind: Some(MediaKind::Audio),
            ..Self::default()
        }
    }

    pub fn similar_to(mut self, track_id: &str) -> Self {
        self.similar_to = Some(track_id.to_string());
        self
    }

    pub fn with_genres(mut self, genres: BTreeSet<String>) -> Self {
        self.genres = genres;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a track satisfies the kind and genre parts of the filter
    pub fn accepts(&self, track: &Track) -> bool {
        let kind_ok = self.kind.is_none_or(|kind| kind == track.kind);
        let genre_ok = self.genres.is_empty() || !self.genres.is_disjoint(&track.genres);
        kind_ok && genre_ok
    }
}

/// Result of removing a playlist by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Read-only access to the host catalog
#[cfg_attr(test, automock)]
pub trait Catalog {
    /// Names of the music libraries the catalog serves
    fn music_libraries(&self) -> Result<Vec<String>>;

    fn fetch_tracks(&self, filter: &TrackFilter) -> Result<Vec<Track>>;

    fn fetch_user_by_name(&self, name: &str) -> Result<Option<User>>;
}

/// Per-user play history. A missing record is reported as defaults.
#[cfg_attr(test, automock)]
pub trait ListeningStatsProvider {
    fn fetch_listening_stats(&self, user_id: &str, track_id: &str) -> ListeningStats;
}

/// Persists generated playlists in the host catalog
#[cfg_attr(test, automock)]
pub trait PlaylistPublisher {
    /// Create the playlist and return its id on the host
    fn publish_playlist(&self, playlist: &Playlist) -> Result<String>;

    fn remove_playlist(&self, name: &str) -> Result<RemoveOutcome>;
}
