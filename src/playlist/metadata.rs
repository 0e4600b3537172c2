use super::assembler::Assembly;
use super::track::ScoredTrack;
use std::collections::{BTreeMap, HashSet};

/// A generated playlist ready to hand to a publisher
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub name: String,
    pub owner: String, // User id the playlist belongs to
    pub track_ids: Vec<String>,
    pub metadata: PlaylistMetadata,
}

impl Playlist {
    pub fn from_assembly(name: &str, owner: &str, assembly: &Assembly) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            track_ids: assembly
                .tracks
                .iter()
                .map(|scored| scored.track.id.clone())
                .collect(),
            metadata: PlaylistMetadata::from_tracks(&assembly.tracks),
        }
    }
}

/// Metadata about the playlist composition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistMetadata {
    pub total_duration: u32, // in seconds
    pub total_songs: usize,
    pub artist_count: usize,
    pub genre_distribution: BTreeMap<String, usize>,
    pub average_score: f64,
}

impl PlaylistMetadata {
    pub fn from_tracks(tracks: &[ScoredTrack]) -> Self {
        if tracks.is_empty() {
            return Self::default();
        }

        let total_duration: u64 = tracks
            .iter()
            .filter_map(|s| s.track.duration)
            .map(u64::from)
            .sum();

        let mut genre_distribution = BTreeMap::new();
        for scored in tracks {
            for genre in &scored.track.genres {
                *genre_distribution.entry(genre.to_lowercase()).or_insert(0) += 1;
            }
        }

        let artist_count = tracks
            .iter()
            .map(|s| s.track.artist.as_str())
            .filter(|artist| !artist.is_empty())
            .collect::<HashSet<_>>()
            .len();

        let average_score = tracks.iter().map(|s| s.score).sum::<f64>() / tracks.len() as f64;

        Self {
            total_duration: u32::try_from(total_duration).unwrap_or(u32::MAX),
            total_songs: tracks.len(),
            artist_count,
            genre_distribution,
            average_score,
        }
    }

    /// Genres ordered by how many tracks carry them, most common first
    pub fn top_genres(&self, count: usize) -> Vec<(&str, usize)> {
        let mut genres: Vec<(&str, usize)> = self
            .genre_distribution
            .iter()
            .map(|(genre, n)| (genre.as_str(), *n))
            .collect();
        genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        genres.truncate(count);
        genres
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Track;
    use approx::assert_relative_eq;

    fn scored(id: &str, artist: &str, genres: &[&str], duration: u32, score: f64) -> ScoredTrack {
        let mut track = Track::new(id, Some(duration)).with_genres(genres.iter().copied());
        track.artist = artist.to_string();
        ScoredTrack::new(track, "user", score)
    }

    #[test]
    fn test_metadata_summarises_tracks() {
        let tracks = vec![
            scored("1", "Artist A", &["Rock", "Indie"], 200, 0.8),
            scored("2", "Artist A", &["rock"], 180, 0.6),
            scored("3", "Artist B", &["Jazz"], 240, 0.4),
        ];

        let metadata = PlaylistMetadata::from_tracks(&tracks);

        assert_eq!(metadata.total_duration, 620);
        assert_eq!(metadata.total_songs, 3);
        assert_eq!(metadata.artist_count, 2);
        assert_eq!(metadata.genre_distribution.get("rock"), Some(&2));
        assert_relative_eq!(metadata.average_score, 0.6, epsilon = 1e-12);
        assert_eq!(metadata.top_genres(1), vec![("rock", 2)]);
    }

    #[test]
    fn test_total_duration_saturates() {
        let tracks = vec![
            scored("1", "Artist A", &[], u32::MAX, 0.5),
            scored("2", "Artist B", &[], 60, 0.5),
        ];

        let metadata = PlaylistMetadata::from_tracks(&tracks);

        assert_eq!(metadata.total_duration, u32::MAX);
    }

    #[test]
    fn test_empty_metadata() {
        assert_eq!(PlaylistMetadata::from_tracks(&[]), PlaylistMetadata::default());
    }
}
