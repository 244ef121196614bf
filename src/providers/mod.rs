pub mod traits;
pub mod types;

pub use traits::{SpotifyApi, YoutubeApi};
pub use types::ProviderTag;
