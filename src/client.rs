use crate::catalog::{
    Catalog, ListeningStatsProvider, PlaylistPublisher, RemoveOutcome, TrackFilter,
};
use crate::config::Config;
use crate::models::{ApiResponse, PlaylistInfo, Song, SubsonicResponse};
use crate::playlist::{ListeningStats, Playlist, Track, User};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use ureq::Agent;
use urlencoding::encode;

const API_VERSION: &str = "1.16.1";
const CLIENT_NAME: &str = "playlist-generator";
const MAX_SONGS_PER_REQUEST: u32 = 500;
const DEFAULT_SIMILAR_COUNT: u32 = 50;

/// Subsonic error code for a missing data item
const ERROR_NOT_FOUND: i32 = 70;

/// A simple Subsonic API client using MD5 authentication.
///
/// Serves as catalog, stats provider and publisher for the generator. The
/// Subsonic API reports play history for the authenticated account only.
pub struct SubsonicClient {
    agent: Agent,
    base_url: String,
    username: String,
    password: String,
    stats_cache: Mutex<HashMap<String, ListeningStats>>,
}

impl SubsonicClient {
    /// Create a new client with configuration from environment
    pub fn new(config: Config) -> Self {
        let agent = Agent::new();

        SubsonicClient {
            agent,
            base_url: config.base_url,
            username: config.username,
            password: config.password,
            stats_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Generate authentication parameters using salt + token method
    fn generate_auth_params(&self) -> (String, String) {
        // Generate a random salt (at least 6 characters)
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let salt = format!("{:x}", md5::compute(format!("{nanos}{CLIENT_NAME}")))[..8].to_string();

        // Calculate token = md5(password + salt)
        let token = format!("{:x}", md5::compute(format!("{}{}", self.password, salt)));

        (salt, token)
    }

    /// Build an authenticated endpoint URL. Parameter values are URL-encoded.
    fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let (salt, token) = self.generate_auth_params();
        let mut url = format!(
            "{}/rest/{}?u={}&t={}&s={}&v={}&c={}&f=json",
            self.base_url.trim_end_matches('/'),
            endpoint,
            encode(&self.username),
            token,
            salt,
            API_VERSION,
            CLIENT_NAME
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, encode(value)));
        }
        url
    }

    /// Call an endpoint and decode the response envelope, without checking status
    fn call_raw(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<SubsonicResponse> {
        let url = self.api_url(endpoint, params);
        log::trace!("GET {endpoint} ({} params)", params.len());

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| anyhow::anyhow!("HTTP request to {} failed: {}", endpoint, e))?;
        let response_text = response.into_string()?;

        let parsed: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow::anyhow!("Failed to parse {} response: {}", endpoint, e))?;
        Ok(parsed.subsonic_response)
    }

    /// Call an endpoint and fail unless the server answered with status "ok"
    fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<SubsonicResponse> {
        let response = self.call_raw(endpoint, params)?;
        if response.status != "ok" {
            return Err(match response.error {
                Some(error) => anyhow::anyhow!(
                    "{} returned error {}: {}",
                    endpoint,
                    error.code,
                    error.message
                ),
                None => anyhow::anyhow!("{} returned status: {}", endpoint, response.status),
            });
        }
        Ok(response)
    }

    /// Test the API connection with a simple ping
    pub fn ping(&self) -> Result<()> {
        let response = self.call("ping", &[])?;
        log::debug!("Server speaks Subsonic API {}", response.version);
        Ok(())
    }

    /// Fetch random songs from the Subsonic API
    /// If count > 500, makes multiple requests to accumulate unique songs
    pub fn fetch_songs(&self, count: u32) -> Result<Vec<Song>> {
        // If we can get it in one request, do that
        if count <= MAX_SONGS_PER_REQUEST {
            return self.fetch_songs_batch(count);
        }

        // Otherwise, make multiple requests and collect unique songs
        let mut all_songs = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut attempts = 0;
        let max_attempts = 20; // Prevent infinite loops if library is smaller than requested

        while all_songs.len() < count as usize && attempts < max_attempts {
            attempts += 1;
            let batch = self.fetch_songs_batch(MAX_SONGS_PER_REQUEST)?;

            let initial_count = all_songs.len();
            let batch_size = batch.len();

            for song in batch {
                if seen_ids.insert(song.id.clone()) {
                    all_songs.push(song);
                    if all_songs.len() >= count as usize {
                        break;
                    }
                }
            }

            let added = all_songs.len() - initial_count;
            log::debug!(
                "Batch {}: got {} songs, {} new (total: {}/{})",
                attempts,
                batch_size,
                added,
                all_songs.len(),
                count
            );

            // If we got no new songs, the library is exhausted
            if added == 0 {
                break;
            }
        }

        if all_songs.len() < count as usize {
            log::info!(
                "Retrieved {} songs, less than requested {} (library may be smaller)",
                all_songs.len(),
                count
            );
        }

        Ok(all_songs)
    }

    /// Internal helper to fetch a single batch of random songs
    fn fetch_songs_batch(&self, size: u32) -> Result<Vec<Song>> {
        let size = size.to_string();
        let response = self.call("getRandomSongs", &[("size", size.as_str())])?;
        Ok(response.random_songs.map(|list| list.song).unwrap_or_default())
    }

    /// Songs ranked by similarity to the song `song_id`
    fn fetch_similar_songs(&self, song_id: &str, count: u32) -> Result<Vec<Song>> {
        let count = count.to_string();
        let response = self.call(
            "getSimilarSongs",
            &[("id", song_id), ("count", count.as_str())],
        )?;
        Ok(response.similar_songs.map(|list| list.song).unwrap_or_default())
    }

    /// Songs tagged with any of `genres`, capped at `limit` unique songs.
    /// Genres take turns so each one is represented.
    fn fetch_songs_by_genres<'a>(
        &self,
        genres: impl IntoIterator<Item = &'a String>,
        limit: u32,
    ) -> Result<Vec<Song>> {
        let count = limit.min(MAX_SONGS_PER_REQUEST).to_string();
        let mut per_genre = Vec::new();

        for genre in genres {
            let response = self.call(
                "getSongsByGenre",
                &[("genre", genre.as_str()), ("count", count.as_str())],
            )?;
            per_genre.push(response.songs_by_genre.map(|list| list.song).unwrap_or_default());
        }

        Ok(interleave_unique(per_genre, limit as usize))
    }

    /// Get all existing playlists
    pub fn get_playlists(&self) -> Result<Vec<PlaylistInfo>> {
        let response = self.call("getPlaylists", &[])?;
        Ok(response
            .playlists
            .map(|container| container.playlist)
            .unwrap_or_default())
    }

    /// Delete an existing playlist
    pub fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.call("deletePlaylist", &[("id", playlist_id)])?;
        log::debug!("Deleted playlist ID: {playlist_id}");
        Ok(())
    }

    /// Subsonic only exposes history and playlists of the logged-in account
    fn is_authenticated_as(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.username)
    }

    /// Remember the play history carried by song payloads and convert them
    fn to_tracks(&self, songs: Vec<Song>) -> Vec<Track> {
        if let Ok(mut cache) = self.stats_cache.lock() {
            for song in &songs {
                cache.insert(song.id.clone(), song.listening_stats());
            }
        }
        songs.iter().map(Song::to_track).collect()
    }
}

/// Take one song from each list in turn, skipping repeated ids, until
/// `limit` songs are collected or every list is drained
fn interleave_unique(lists: Vec<Vec<Song>>, limit: usize) -> Vec<Song> {
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut seen_ids = HashSet::new();
    let mut songs = Vec::new();

    while songs.len() < limit {
        let mut progressed = false;
        for iter in iters.iter_mut() {
            let Some(song) = iter.next() else {
                continue;
            };
            progressed = true;
            if seen_ids.insert(song.id.clone()) {
                songs.push(song);
                if songs.len() >= limit {
                    break;
                }
            }
        }
        if !progressed {
            break;
        }
    }
    songs
}

impl Catalog for SubsonicClient {
    fn music_libraries(&self) -> Result<Vec<String>> {
        let response = self.call("getMusicFolders", &[])?;
        Ok(response
            .music_folders
            .map(|folders| folders.music_folder)
            .unwrap_or_default()
            .into_iter()
            .map(|folder| folder.name.unwrap_or_else(|| folder.id.to_string()))
            .collect())
    }

    fn fetch_tracks(&self, filter: &TrackFilter) -> Result<Vec<Track>> {
        let songs = if let Some(ref song_id) = filter.similar_to {
            self.fetch_similar_songs(song_id, filter.limit.unwrap_or(DEFAULT_SIMILAR_COUNT))?
        } else if !filter.genres.is_empty() {
            let limit = filter.limit.unwrap_or(MAX_SONGS_PER_REQUEST);
            self.fetch_songs_by_genres(&filter.genres, limit)?
        } else {
            self.fetch_songs(filter.limit.unwrap_or(MAX_SONGS_PER_REQUEST))?
        };

        Ok(self
            .to_tracks(songs)
            .into_iter()
            .filter(|track| filter.accepts(track))
            .collect())
    }

    fn fetch_user_by_name(&self, name: &str) -> Result<Option<User>> {
        if !self.is_authenticated_as(name) {
            log::warn!(
                "Play history and playlists of '{}' are not reachable while logged in as '{}'",
                name,
                self.username
            );
            return Ok(None);
        }

        let response = self.call_raw("getUser", &[("username", name)])?;
        if let Some(error) = response.error {
            if error.code == ERROR_NOT_FOUND {
                return Ok(None);
            }
            anyhow::bail!("getUser returned error {}: {}", error.code, error.message);
        }
        Ok(response.user.map(|user| User {
            id: user.username.clone(),
            name: user.username,
        }))
    }
}

impl ListeningStatsProvider for SubsonicClient {
    fn fetch_listening_stats(&self, user_id: &str, track_id: &str) -> ListeningStats {
        if !self.is_authenticated_as(user_id) {
            log::warn!(
                "Play history is only visible for '{}', not '{}'",
                self.username,
                user_id
            );
        }

        let cached = self
            .stats_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(track_id).cloned());
        if let Some(stats) = cached {
            return stats;
        }

        match self.call("getSong", &[("id", track_id)]) {
            Ok(response) => {
                let stats = response
                    .song
                    .map(|song| song.listening_stats())
                    .unwrap_or_default();
                if let Ok(mut cache) = self.stats_cache.lock() {
                    cache.insert(track_id.to_string(), stats.clone());
                }
                stats
            }
            Err(e) => {
                log::warn!("No listening stats for '{track_id}': {e:#}");
                ListeningStats::default()
            }
        }
    }
}

impl PlaylistPublisher for SubsonicClient {
    fn publish_playlist(&self, playlist: &Playlist) -> Result<String> {
        if !self.is_authenticated_as(&playlist.owner) {
            anyhow::bail!(
                "cannot create a playlist for '{}' while logged in as '{}'",
                playlist.owner,
                self.username
            );
        }

        let mut params: Vec<(&str, &str)> = vec![("name", playlist.name.as_str())];
        params.extend(playlist.track_ids.iter().map(|id| ("songId", id.as_str())));

        log::info!(
            "Creating playlist '{}' with {} songs...",
            playlist.name,
            playlist.track_ids.len()
        );
        let response = self.call("createPlaylist", &params)?;

        match response.playlist {
            Some(created) => {
                log::debug!(
                    "Server created '{}' with {} songs",
                    created.name,
                    created.song_count.unwrap_or_default()
                );
                Ok(created.id)
            }
            None => Err(anyhow::anyhow!("No playlist returned in create response")),
        }
    }

    fn remove_playlist(&self, name: &str) -> Result<RemoveOutcome> {
        let playlists = self.get_playlists()?;
        let Some(existing) = playlists.iter().find(|p| p.name == name) else {
            return Ok(RemoveOutcome::NotFound);
        };

        log::info!(
            "Playlist '{}' already exists (ID: {}, {} songs), deleting it first...",
            name,
            existing.id,
            existing.song_count.unwrap_or_default()
        );
        self.delete_playlist(&existing.id)?;
        Ok(RemoveOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::PlaylistMetadata;

    fn client() -> SubsonicClient {
        SubsonicClient::new(Config {
            base_url: "http://music.local/".to_string(),
            username: "alice smith".to_string(),
            password: "secret".to_string(),
        })
    }

    #[test]
    fn test_api_url_encodes_params() {
        let url = client().api_url("getSongsByGenre", &[("genre", "Rock & Roll"), ("count", "5")]);

        assert!(url.starts_with("http://music.local/rest/getSongsByGenre?u=alice%20smith&t="));
        assert!(url.contains("&v=1.16.1&c=playlist-generator&f=json"));
        assert!(url.ends_with("&genre=Rock%20%26%20Roll&count=5"));
    }

    #[test]
    fn test_auth_token_is_salted_password_hash() {
        let client = client();
        let (salt, token) = client.generate_auth_params();

        assert_eq!(salt.len(), 8);
        assert_eq!(token, format!("{:x}", md5::compute(format!("secret{salt}"))));
    }

    fn song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            ..Song::default()
        }
    }

    #[test]
    fn test_publish_refuses_other_owner() {
        let playlist = Playlist {
            name: "Mix".to_string(),
            owner: "bob".to_string(),
            track_ids: vec!["t1".to_string()],
            metadata: PlaylistMetadata::default(),
        };

        // Rejected before any request is sent
        let err = client().publish_playlist(&playlist).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'bob'"), "{message}");
        assert!(message.contains("'alice smith'"), "{message}");
    }

    #[test]
    fn test_other_user_is_not_found() {
        assert_eq!(client().fetch_user_by_name("bob").unwrap(), None);
    }

    #[test]
    fn test_genre_results_take_turns() {
        let rock = vec![song("r1"), song("r2"), song("r3"), song("shared")];
        let jazz = vec![song("shared"), song("j1")];
        let soul = vec![song("s1")];

        let songs = interleave_unique(vec![rock, jazz, soul], 5);
        let ids: Vec<&str> = songs.iter().map(|song| song.id.as_str()).collect();

        assert_eq!(ids, vec!["r1", "shared", "s1", "r2", "j1"]);
    }

    #[test]
    fn test_genre_results_drain_short_lists() {
        let lists = vec![vec![song("a")], vec![], vec![song("b"), song("a")]];
        let songs = interleave_unique(lists, 10);
        let ids: Vec<&str> = songs.iter().map(|song| song.id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_stats_cached_from_song_payloads() {
        let client = client();
        let song = Song {
            id: "s1".to_string(),
            play_count: Some(4),
            starred: Some("2024-01-01T00:00:00Z".to_string()),
            ..Song::default()
        };

        let tracks = client.to_tracks(vec![song]);
        let stats = client.fetch_listening_stats("alice smith", "s1");

        assert_eq!(tracks[0].id, "s1");
        assert_eq!(stats.play_count, 4);
        assert!(stats.is_favorite);
    }
}
