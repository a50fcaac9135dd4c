//! Word-pair playback
//!
//! The [`Sequencer`] turns a word pair plus [`PlaybackSettings`] into an
//! ordered series of spoken segments and advances through word lists.
//! Audio itself comes from the tiers of an [`crate::audio::BackendChain`].

mod cancel;
mod sequencer;
mod settings;
mod state;

pub use cancel::CancellationToken;
pub use sequencer::{LanguagePair, REPEAT_GAP, Sequencer};
pub use settings::{
    MAX_REPEATS, MIN_REPEATS, PlaybackSettings, PronunciationSpeed, SharedSettings,
};
pub use state::{NoopObserver, PlaybackObserver, PlaybackState, RunOutcome};
