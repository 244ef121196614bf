pub mod classifier;
pub mod client;
pub mod liked_cache;
pub mod models;
pub mod playlist_classifier;

pub use classifier::is_music;
pub use client::YoutubeClient;
pub use liked_cache::{LikedContentCache, LikedSnapshot};
pub use playlist_classifier::PlaylistMusicClassifier;
