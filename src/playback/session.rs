use crate::models::UnifiedTrack;

/// What is playing and the list it was started from.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    pub current_track: Option<UnifiedTrack>,
    pub playlist: Vec<UnifiedTrack>,
    pub is_playing: bool,
}

impl PlaybackSession {
    /// Position of the current track in the playlist, matched by `(source, id)`.
    pub fn current_index(&self) -> Option<usize> {
        let current = self.current_track.as_ref()?;
        self.playlist.iter().position(|t| t.same_track(current))
    }

    /// Wraps from the last track to the first.
    pub fn next_track(&self) -> Option<UnifiedTrack> {
        let idx = self.current_index()?;
        let next_idx = (idx + 1) % self.playlist.len();
        self.playlist.get(next_idx).cloned()
    }

    /// Wraps from the first track to the last.
    pub fn prev_track(&self) -> Option<UnifiedTrack> {
        let idx = self.current_index()?;
        let len = self.playlist.len();
        let prev_idx = (idx + len - 1) % len;
        self.playlist.get(prev_idx).cloned()
    }

    pub fn is_current(&self, track: &UnifiedTrack) -> bool {
        self.current_track
            .as_ref()
            .is_some_and(|current| current.same_track(track))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spotify_unified, youtube_unified};

    fn session(current: Option<UnifiedTrack>, playlist: Vec<UnifiedTrack>) -> PlaybackSession {
        PlaybackSession {
            current_track: current,
            playlist,
            is_playing: true,
        }
    }

    #[test]
    fn test_next_and_prev_wrap_around() {
        let tracks = vec![spotify_unified("a"), youtube_unified("b"), spotify_unified("c")];

        let at_end = session(Some(tracks[2].clone()), tracks.clone());
        assert_eq!(at_end.next_track().unwrap().id, "a");
        assert_eq!(at_end.prev_track().unwrap().id, "b");

        let at_start = session(Some(tracks[0].clone()), tracks.clone());
        assert_eq!(at_start.prev_track().unwrap().id, "c");
        assert_eq!(at_start.next_track().unwrap().id, "b");
    }

    #[test]
    fn test_identity_includes_source() {
        // Same id on both providers is two different tracks.
        let tracks = vec![spotify_unified("x"), youtube_unified("x")];
        let s = session(Some(tracks[1].clone()), tracks.clone());
        assert_eq!(s.current_index(), Some(1));
        assert_eq!(s.next_track().unwrap().source, tracks[0].source);
    }

    #[test]
    fn test_no_neighbors_without_position() {
        assert!(session(None, vec![spotify_unified("a")]).next_track().is_none());
        assert!(session(Some(spotify_unified("a")), Vec::new()).prev_track().is_none());
        assert!(session(Some(spotify_unified("z")), vec![spotify_unified("a")])
            .next_track()
            .is_none());
    }

    #[test]
    fn test_single_track_wraps_to_itself() {
        let s = session(Some(spotify_unified("a")), vec![spotify_unified("a")]);
        assert_eq!(s.next_track().unwrap().id, "a");
        assert_eq!(s.prev_track().unwrap().id, "a");
    }
}
