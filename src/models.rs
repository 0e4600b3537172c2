use crate::playlist::{ListeningStats, MediaKind, Track};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Our Song structure with the fields available from the OpenSubsonic API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub genre: Option<String>,      // Single genre field (legacy)
    pub genres: Option<Vec<Genre>>, // Multiple genres array (OpenSubsonic extension)
    pub duration: Option<u32>,      // Seconds
    #[serde(rename = "playCount")]
    pub play_count: Option<u32>,
    pub played: Option<String>,  // Last played timestamp
    pub starred: Option<String>, // Starred timestamp (if favorited)
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
    #[serde(rename = "isVideo")]
    pub is_video: Option<bool>,
    #[serde(rename = "type")]
    pub media_type: Option<String>, // "music", "podcast", "audiobook" or "video"
}

/// Genre structure for multiple genres support
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub name: String,
}

impl Song {
    /// All genre names as tagged, combining the legacy field and the genres array
    pub fn genre_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        if let Some(ref genre) = self.genre {
            names.insert(genre.clone());
        }
        if let Some(ref genres) = self.genres {
            names.extend(genres.iter().map(|genre| genre.name.clone()));
        }
        names.retain(|name| !name.trim().is_empty());
        names
    }

    pub fn media_kind(&self) -> MediaKind {
        if self.is_video == Some(true) || self.media_type.as_deref() == Some("video") {
            return MediaKind::Video;
        }
        match self.content_type.as_deref() {
            Some(content_type) if content_type.starts_with("audio/") => MediaKind::Audio,
            Some(content_type) if content_type.starts_with("video/") => MediaKind::Video,
            Some(_) => MediaKind::Other,
            // Servers omitting contentType only do so for regular songs
            None => MediaKind::Audio,
        }
    }

    pub fn to_track(&self) -> Track {
        Track {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration: self.duration,
            genres: self.genre_names(),
            kind: self.media_kind(),
        }
    }

    /// Play history of the authenticated user for this song
    pub fn listening_stats(&self) -> ListeningStats {
        ListeningStats {
            play_count: self.play_count.unwrap_or(0),
            is_favorite: self.starred.is_some(),
            last_played: self.played.as_deref().and_then(parse_timestamp),
        }
    }
}

/// Parse a Subsonic timestamp, trying the formats servers are known to emit
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl Default for Song {
    fn default() -> Self {
        Song {
            id: String::new(),
            title: "Unknown".to_string(),
            artist: "Unknown".to_string(),
            album: "Unknown".to_string(),
            genre: None,
            genres: None,
            duration: None,
            play_count: None,
            played: None,
            starred: None,
            content_type: None,
            is_video: None,
            media_type: None,
        }
    }
}

/// Envelope shared by every Subsonic JSON response
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "subsonic-response")]
    pub subsonic_response: SubsonicResponse,
}

/// Body of a response. Each endpoint fills in the field it returns.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct SubsonicResponse {
    pub status: String,
    /// allow undefined version for flexibility
    #[serde(default)]
    pub version: String,
    pub error: Option<ApiError>,
    #[serde(rename = "randomSongs")]
    pub random_songs: Option<SongList>,
    #[serde(rename = "similarSongs")]
    pub similar_songs: Option<SongList>,
    #[serde(rename = "songsByGenre")]
    pub songs_by_genre: Option<SongList>,
    pub song: Option<Song>,
    pub user: Option<SubsonicUser>,
    #[serde(rename = "musicFolders")]
    pub music_folders: Option<MusicFolders>,
    pub playlists: Option<PlaylistsContainer>,
    pub playlist: Option<CreatedPlaylist>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SongList {
    #[serde(default)]
    pub song: Vec<Song>,
}

#[derive(Debug, Deserialize)]
pub struct SubsonicUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct MusicFolders {
    #[serde(rename = "musicFolder", default)]
    pub music_folder: Vec<MusicFolder>,
}

#[derive(Debug, Deserialize)]
pub struct MusicFolder {
    pub id: serde_json::Value, // Integer on some servers, string on others
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistsContainer {
    #[serde(default)]
    pub playlist: Vec<PlaylistInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "songCount")]
    pub song_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
    pub name: String,
    #[serde(rename = "songCount")]
    pub song_count: Option<u32>,
}
