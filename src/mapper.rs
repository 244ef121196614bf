//! Conversions from provider payloads to the unified shapes.
//!
//! Every function here is pure: the same payload always maps to an equal
//! value, and the payload is kept verbatim in `original_data`, including
//! annotations such as `playlist_name`.

use std::collections::HashSet;

use crate::models::{
    ArtistOrigin, PlaylistOrigin, TrackDuration, TrackOrigin, UnifiedArtist, UnifiedPlaylist,
    UnifiedTrack,
};
use crate::providers::ProviderTag;
use crate::spotify::models::{SpotifyArtist, SpotifyImage, SpotifyPlaylist, SpotifyTrack};
use crate::spotify::track_url;
use crate::youtube::models::{
    watch_url, Thumbnails, YoutubeChannel, YoutubePlaylist, YoutubePlaylistItem, YoutubeVideo,
    CHANNEL_URL, PLAYLIST_URL,
};

const SPOTIFY_ARTIST_URL: &str = "https://open.spotify.com/artist/";
const SPOTIFY_PLAYLIST_URL: &str = "https://open.spotify.com/playlist/";

/// The Web API lists images widest first.
fn spotify_image(images: &[SpotifyImage]) -> Option<String> {
    images.first().map(|i| i.url.clone())
}

fn youtube_thumbnail(thumbnails: &Thumbnails) -> Option<String> {
    thumbnails
        .high
        .as_ref()
        .or(thumbnails.medium.as_ref())
        .or(thumbnails.default.as_ref())
        .map(|t| t.url.clone())
}

/// Auto-generated channels are named "<Artist> - Topic".
fn youtube_artist_name(channel_title: &str) -> String {
    channel_title
        .strip_suffix(" - Topic")
        .unwrap_or(channel_title)
        .to_string()
}

/// `duration` is formatted by the caller from `duration_ms`.
/// Tracks without an id (local files) cannot be played and map to `None`.
pub fn spotify_track_to_unified(
    track: &SpotifyTrack,
    duration: TrackDuration,
) -> Option<UnifiedTrack> {
    let id = track.id.clone()?;
    let album = track.album.as_ref();

    Some(UnifiedTrack {
        external_url: track
            .external_urls
            .spotify
            .clone()
            .unwrap_or_else(|| track_url(&id)),
        id,
        name: track.name.clone(),
        artist: track.artist_names(),
        album: album.map(|a| a.name.clone()),
        duration,
        image_url: album.and_then(|a| spotify_image(&a.images)),
        source: ProviderTag::Spotify,
        original_data: TrackOrigin::Spotify(track.clone()),
    })
}

pub fn spotify_playlist_to_unified(playlist: &SpotifyPlaylist) -> UnifiedPlaylist {
    UnifiedPlaylist {
        id: playlist.id.clone(),
        name: playlist.name.clone(),
        description: playlist.description.clone().filter(|d| !d.is_empty()),
        image_url: playlist.images.as_deref().and_then(spotify_image),
        track_count: playlist.tracks.map(|t| t.total).unwrap_or(0),
        owner: playlist
            .owner
            .display_name
            .clone()
            .unwrap_or_else(|| playlist.owner.id.clone()),
        source: ProviderTag::Spotify,
        is_public: playlist.public.unwrap_or(false),
        is_collaborative: Some(playlist.collaborative),
        external_url: playlist
            .external_urls
            .spotify
            .clone()
            .unwrap_or_else(|| format!("{}{}", SPOTIFY_PLAYLIST_URL, playlist.id)),
        original_data: PlaylistOrigin::Spotify(playlist.clone()),
    }
}

pub fn spotify_artist_to_unified(artist: &SpotifyArtist) -> UnifiedArtist {
    UnifiedArtist {
        id: artist.id.clone(),
        name: artist.name.clone(),
        image_url: spotify_image(&artist.images),
        followers: artist.followers.map(|f| f.total),
        popularity: artist.popularity,
        genres: Some(artist.genres.clone()),
        source: ProviderTag::Spotify,
        external_url: artist
            .external_urls
            .spotify
            .clone()
            .unwrap_or_else(|| format!("{}{}", SPOTIFY_ARTIST_URL, artist.id)),
        original_data: ArtistOrigin::Spotify(artist.clone()),
    }
}

/// Liked and searched videos carry an ISO-8601 duration when the
/// `contentDetails` part was requested.
pub fn youtube_video_to_unified(video: &YoutubeVideo) -> UnifiedTrack {
    let duration = video
        .content_details
        .as_ref()
        .and_then(|d| d.duration.clone())
        .map(TrackDuration::Known)
        .unwrap_or(TrackDuration::Unknown);

    UnifiedTrack {
        id: video.id.clone(),
        name: video.snippet.title.clone(),
        artist: youtube_artist_name(&video.snippet.channel_title),
        album: None,
        duration,
        image_url: youtube_thumbnail(&video.snippet.thumbnails),
        source: ProviderTag::Youtube,
        external_url: watch_url(&video.id),
        original_data: TrackOrigin::YoutubeVideo(video.clone()),
    }
}

/// Playlist listings never include a duration. Deleted and private
/// placeholders map to `None`.
pub fn youtube_playlist_item_to_unified(item: &YoutubePlaylistItem) -> Option<UnifiedTrack> {
    if !item.is_available() {
        return None;
    }
    let video_id = item.video_id()?.to_string();

    Some(UnifiedTrack {
        external_url: watch_url(&video_id),
        id: video_id,
        name: item.snippet.title.clone(),
        artist: youtube_artist_name(item.channel_title()),
        album: None,
        duration: TrackDuration::Unknown,
        image_url: youtube_thumbnail(&item.snippet.thumbnails),
        source: ProviderTag::Youtube,
        original_data: TrackOrigin::YoutubePlaylistItem(item.clone()),
    })
}

pub fn youtube_playlist_to_unified(playlist: &YoutubePlaylist) -> UnifiedPlaylist {
    UnifiedPlaylist {
        id: playlist.id.clone(),
        name: playlist.snippet.title.clone(),
        description: Some(playlist.snippet.description.clone()).filter(|d| !d.is_empty()),
        image_url: youtube_thumbnail(&playlist.snippet.thumbnails),
        track_count: playlist.content_details.item_count,
        owner: playlist.snippet.channel_title.clone(),
        source: ProviderTag::Youtube,
        is_public: playlist.status.privacy_status.as_deref() == Some("public"),
        is_collaborative: None,
        external_url: format!("{}{}", PLAYLIST_URL, playlist.id),
        original_data: PlaylistOrigin::Youtube(playlist.clone()),
    }
}

pub fn youtube_channel_to_unified(channel: &YoutubeChannel) -> UnifiedArtist {
    UnifiedArtist {
        id: channel.id.clone(),
        name: youtube_artist_name(&channel.title),
        image_url: youtube_thumbnail(&channel.thumbnails),
        followers: None,
        popularity: None,
        genres: None,
        source: ProviderTag::Youtube,
        external_url: format!("{}{}", CHANNEL_URL, channel.id),
        original_data: ArtistOrigin::Youtube(channel.clone()),
    }
}

/// Distinct uploading channels, in first-seen order.
pub fn channels_from_videos<'a>(
    videos: impl IntoIterator<Item = &'a YoutubeVideo>,
) -> Vec<YoutubeChannel> {
    let mut seen = HashSet::new();
    videos
        .into_iter()
        .filter_map(|v| {
            let id = v.snippet.channel_id.clone()?;
            seen.insert(id.clone()).then(|| YoutubeChannel {
                id,
                title: v.snippet.channel_title.clone(),
                thumbnails: v.snippet.thumbnails.clone(),
            })
        })
        .collect()
}

/// Case-insensitive dedup by name; the first occurrence wins and the
/// result stops at `cap` entries.
pub fn merge_artists(
    artists: impl IntoIterator<Item = UnifiedArtist>,
    cap: usize,
) -> Vec<UnifiedArtist> {
    let mut seen = HashSet::new();
    artists
        .into_iter()
        .filter(|a| seen.insert(a.name.to_lowercase()))
        .take(cap)
        .collect()
}
