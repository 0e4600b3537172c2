use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::time::Duration;

mod cancel;
mod catalog;
mod client;
mod config;
mod error;
mod models;
mod playlist;


use crate::cancel::CancellationToken;
use crate::client::SubsonicClient;
use crate::config::load_config;
use crate::playlist::{BuiltPlaylist, GenerationOutcome, PlaylistConfig, PlaylistGenerator};

#[derive(Parser)]
#[command(name = "playlist-generator")]
#[command(about = "Personal mix generator for OpenSubsonic servers")]
#[command(version)]
struct Args {
    /// Path to the playlist configuration JSON file
    #[arg(short = 'c', long = "config", default_value = "playlists.json")]
    config_file: String,

    /// Enable debug mode - print playlist details to stdout instead of uploading
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Quiet mode - only log warnings and errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Cancel generation if it runs longer than this many seconds
    #[arg(long = "max-runtime", value_name = "SECS")]
    max_runtime: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Validate that the playlist configuration file exists before proceeding
    if !std::path::Path::new(&args.config_file).exists() {
        log::error!("Playlist configuration file '{}' not found", args.config_file);
        log::error!("Please ensure the file exists or specify a different file with --config.");
        return Err(anyhow::anyhow!(
            "Configuration file '{}' not found",
            args.config_file
        ));
    }

    let playlist_configs = PlaylistConfig::load_all_from_file(&args.config_file)?;
    log::info!(
        "Loaded {} playlist configurations from {}",
        playlist_configs.len(),
        args.config_file
    );

    // Load configuration from .env
    let config = load_config()?;
    let client = SubsonicClient::new(config);

    log::info!("Testing API connection...");
    if let Err(e) = client.ping() {
        log::error!("API connection failed: {e:#}");
        return Err(e);
    }

    let cancel = CancellationToken::new();
    if let Some(secs) = args.max_runtime {
        cancel.cancel_after(Duration::from_secs(secs));
    }

    let mut creation_results = Vec::new();

    for playlist_config in playlist_configs {
        let generator = PlaylistGenerator::new(playlist_config);
        let name = generator.config().name.clone();
        let now = Utc::now();

        if args.debug {
            // Debug mode: print playlist details instead of uploading
            let result = match generator.build_playlist(&client, &client, &cancel, now) {
                Ok(Ok(built)) => {
                    print_playlist(&built);
                    (name, true, "Debug mode - not uploaded".to_string())
                }
                Ok(Err(reason)) => (name, false, format!("Skipped: {reason}")),
                Err(e) => (name, false, format!("Error: {e}")),
            };
            creation_results.push(result);
            continue;
        }

        match generator.generate(&client, &client, &client, &cancel, now) {
            Ok(GenerationOutcome::Published {
                playlist,
                playlist_id,
                stop_reason,
            }) => {
                log::info!("'{}' stopped: {:?}", playlist.name, stop_reason);
                creation_results.push((
                    name,
                    true,
                    format!(
                        "Created with ID: {} ({} songs, {}m{}s)",
                        playlist_id,
                        playlist.track_ids.len(),
                        playlist.metadata.total_duration / 60,
                        playlist.metadata.total_duration % 60
                    ),
                ));
            }
            Ok(GenerationOutcome::Skipped(reason)) => {
                creation_results.push((name, false, format!("Skipped: {reason}")));
            }
            Err(e) => {
                log::error!("Failed to generate playlist '{name}': {e}");
                creation_results.push((name, false, format!("Error: {e}")));
            }
        }
    }

    // Summary of playlist creation results (suitable for cron job monitoring)
    println!("\n=== PLAYLIST CREATION SUMMARY ===");
    let successful_creations = creation_results
        .iter()
        .filter(|(_, success, _)| *success)
        .count();
    let total_attempts = creation_results.len();

    println!("Successfully created {successful_creations}/{total_attempts} playlists");

    for (name, success, message) in &creation_results {
        let status = if *success { "✓" } else { "✗" };
        println!("{status} {name}: {message}");
    }

    if successful_creations == 0 && total_attempts > 0 {
        return Err(anyhow::anyhow!("Playlist creation failed"));
    }

    Ok(())
}

/// Print a built playlist with the scores that put each track there
fn print_playlist(built: &BuiltPlaylist) {
    let playlist = &built.playlist;
    let metadata = &playlist.metadata;

    println!("\n{}", playlist.name);
    println!("{}", "=".repeat(playlist.name.len()));
    println!(
        "   Songs: {} | Duration: {}m{}s | Avg Score: {:.3} | Unique Artists: {}",
        metadata.total_songs,
        metadata.total_duration / 60,
        metadata.total_duration % 60,
        metadata.average_score,
        metadata.artist_count
    );
    println!(
        "   Candidates: {} | Stopped: {:?}",
        built.candidate_count, built.assembly.stop_reason
    );

    let top_genres: Vec<String> = metadata
        .top_genres(3)
        .iter()
        .map(|(genre, count)| format!("{genre} ({count})"))
        .collect();
    if !top_genres.is_empty() {
        println!("   Top Genres: {}", top_genres.join(", "));
    }

    for (i, scored) in built.assembly.tracks.iter().enumerate() {
        let track = &scored.track;
        let duration_display = track
            .duration
            .map(|d| format!(" {}:{:02}", d / 60, d % 60))
            .unwrap_or_default();

        println!(
            "     {}. \"{}\" by {} [{}]{} | S:{:.3} | ID: {}",
            i + 1,
            track.title,
            track.artist,
            track.album,
            duration_display,
            scored.score,
            track.id
        );
    }
}
