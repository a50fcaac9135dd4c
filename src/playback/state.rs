//! Playback state and observer hooks

use std::fmt;

use crate::words::WordPair;

/// What the sequencer is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing playing
    #[default]
    Idle,
    /// Speaking the learning-language text
    PlayingSource,
    /// Silence between the two languages
    PausingBetween,
    /// Speaking the native-language text
    PlayingTarget,
    /// Silence before the next word
    PausingNext,
}

impl PlaybackState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PlayingSource => "playing-source",
            Self::PausingBetween => "pausing-between",
            Self::PlayingTarget => "playing-target",
            Self::PausingNext => "pausing-next",
        }
    }

    /// Whether audio may be coming out of the speakers
    #[must_use]
    pub const fn is_speaking(self) -> bool {
        matches!(self, Self::PlayingSource | Self::PlayingTarget)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a `play_word` or `play_all` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step ran
    Completed,
    /// `stop()` ended the run early
    Cancelled,
    /// Nothing ran: another run was active or there was nothing to play
    Rejected,
}

/// Receives sequencer notifications
///
/// Callbacks run synchronously, one at a time and in the order the changes
/// happened, with no sequencer lock held. They may call `stop()` or read the
/// sequencer's state.
pub trait PlaybackObserver: Send + Sync {
    /// The state changed
    fn on_state(&self, _state: PlaybackState) {}

    /// `play_all` moved to a new word
    fn on_word(&self, _index: usize, _pair: &WordPair) {}

    /// A `play_all` run ended; called exactly once per accepted run
    fn on_complete(&self, _outcome: RunOutcome) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlaybackObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(PlaybackState::default(), PlaybackState::Idle);
    }

    #[test]
    fn speaking_states() {
        assert!(PlaybackState::PlayingSource.is_speaking());
        assert!(PlaybackState::PlayingTarget.is_speaking());
        assert!(!PlaybackState::PausingBetween.is_speaking());
        assert!(!PlaybackState::PausingNext.is_speaking());
        assert!(!PlaybackState::Idle.is_speaking());
    }

    #[test]
    fn display_names() {
        assert_eq!(PlaybackState::PausingNext.to_string(), "pausing-next");
    }
}
