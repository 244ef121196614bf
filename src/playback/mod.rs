pub mod core;
pub mod session;

pub use self::core::{PlayOutcome, PlaybackCore};
pub use session::PlaybackSession;
