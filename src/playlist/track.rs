use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Kind of media a catalog item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Other,
}

/// A catalog track as read by the generator. Never mutated after it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Length in seconds, `None` when the catalog does not know it
    pub duration: Option<u32>,
    pub genres: BTreeSet<String>,
    pub kind: MediaKind,
}

impl Track {
    pub fn new(id: impl Into<String>, duration: Option<u32>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            duration,
            genres: BTreeSet::new(),
            kind: MediaKind::Audio,
        }
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }
}

/// Per (user, track) listening history snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListeningStats {
    pub play_count: u32,
    pub is_favorite: bool,
    pub last_played: Option<DateTime<Utc>>,
}

/// A listener known to the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// A track paired with the affinity score computed for one user
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTrack {
    pub track: Track,
    pub user_id: String,
    pub score: f64,
}

impl ScoredTrack {
    pub fn new(track: Track, user_id: impl Into<String>, score: f64) -> Self {
        Self {
            track,
            user_id: user_id.into(),
            score,
        }
    }

    pub fn id(&self) -> &str {
        &self.track.id
    }
}

/// Sort scored tracks by descending score. Ties fall back to track id so the
/// order does not depend on how the scores were computed.
pub fn sort_by_score(tracks: &mut [ScoredTrack]) {
    tracks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.track.id.cmp(&b.track.id))
    });
}
