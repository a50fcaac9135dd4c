//! VOCO - spoken vocabulary drills
//!
//! This library provides the playback core of VOCO:
//! - Word pairs and topics loaded from static vocabulary data
//! - A sequencer that speaks each pair in the learning language, pauses,
//!   then speaks it in the learner's native language
//! - Layered audio production (pre-generated clips, remote synthesis, a
//!   local synthesizer) with per-unit timeouts and cancellation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   voco (CLI)                         │
//! │   topics  │  words  │  play  │  say  │  test-speaker │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Sequencer                          │
//! │   play_word  │  play_all  │  stop  │  observer       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 BackendChain                         │
//! │   pre-generated  →  remote  →  system               │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod words;

pub use audio::{AudioBackend, AudioHandle, BackendChain, Segment};
pub use config::Config;
pub use error::{Error, Result};
pub use playback::{
    CancellationToken, LanguagePair, PlaybackObserver, PlaybackSettings, PlaybackState,
    PronunciationSpeed, RunOutcome, Sequencer, SharedSettings,
};
pub use words::{CachedWordSource, JsonWordSource, Topic, WordPair, WordSource};
