//! Keyword heuristic deciding whether a video is music content.
//!
//! A video is music when any positive signal fires and no exclusion keyword
//! appears in its title or description. Exclusions always win.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{YoutubePlaylistItem, YoutubeVideo};

const MUSIC_CHANNEL_KEYWORDS: &[&str] = &[
    "vevo",
    "- topic",
    "official",
    "music",
    "records",
    "entertainment",
];

const MUSIC_TITLE_KEYWORDS: &[&str] = &[
    "official video",
    "music video",
    "lyrics",
    "acoustic",
    "live",
    "cover",
    "remix",
    "instrumental",
    "feat.",
    "ft.",
];

const EXCLUDED_KEYWORDS: &[&str] = &[
    "podcast",
    "interview",
    "reaction",
    "review",
    "tutorial",
    "gameplay",
    "vlog",
    "news",
    "talk show",
    "documentary",
    "trailer",
    "comedy",
    "animation",
];

static MUSIC_TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "Artist - Song"
        r"^[^-]+\s[-–—]\s[^-]+",
        // "Song | Something Music"
        r"\|.*music",
        r"[\(\[]official",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// The fields the heuristic reads, borrowed from either video shape.
#[derive(Debug, Clone, Copy)]
pub struct MusicSignals<'a> {
    pub title: &'a str,
    pub channel_title: &'a str,
    pub description: &'a str,
}

impl<'a> From<&'a YoutubeVideo> for MusicSignals<'a> {
    fn from(video: &'a YoutubeVideo) -> Self {
        Self {
            title: &video.snippet.title,
            channel_title: &video.snippet.channel_title,
            description: &video.snippet.description,
        }
    }
}

impl<'a> From<&'a YoutubePlaylistItem> for MusicSignals<'a> {
    fn from(item: &'a YoutubePlaylistItem) -> Self {
        Self {
            title: &item.snippet.title,
            channel_title: item.channel_title(),
            description: &item.snippet.description,
        }
    }
}

pub fn is_music<'a>(signals: impl Into<MusicSignals<'a>>) -> bool {
    let signals = signals.into();
    let title = signals.title.to_lowercase();
    let channel = signals.channel_title.to_lowercase();
    let description = signals.description.to_lowercase();

    let excluded = EXCLUDED_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || description.contains(k));
    if excluded {
        return false;
    }

    MUSIC_CHANNEL_KEYWORDS.iter().any(|k| channel.contains(k))
        || MUSIC_TITLE_KEYWORDS.iter().any(|k| title.contains(k))
        || MUSIC_TITLE_PATTERNS.iter().any(|re| re.is_match(&title))
}
