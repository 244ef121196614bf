pub mod auth;
pub mod config;
pub mod dashboard;
pub mod device;
pub mod errors;
pub mod lyrics;
pub mod mapper;
pub mod models;
pub mod now_playing;
pub mod opener;
pub mod playback;
pub mod players;
pub mod poller;
pub mod providers;
pub mod rate_limiter;
pub mod spotify;
pub mod storage;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

pub use dashboard::{Dashboard, DashboardParts};
pub use errors::{AppError, Result};
