//! Ordered backend tiers with per-segment fallback

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{AudioBackend, AudioHandle, AudioLibrary, RemoteSynthesis, Segment, SystemSynth};
use crate::{Config, Error};
use crate::playback::CancellationToken;

/// Bound on every resolve and every play
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of producing one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// A tier played the segment to the end
    Played(&'static str),
    /// Every tier failed or had nothing; the segment stays silent
    Silent,
    /// The run was cancelled before or during the segment
    Cancelled,
}

/// Holder of the one audio unit currently in flight
#[derive(Default)]
pub struct HandleSlot {
    current: Mutex<Option<(u64, Arc<dyn AudioHandle>)>>,
    next_ticket: AtomicU64,
}

impl HandleSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the in-flight unit unless `token` is already cancelled
    ///
    /// The cancellation check happens under the slot lock, so a concurrent
    /// [`Self::stop_current`] either sees the handle or the handle is never
    /// installed. Returns a ticket for [`Self::release`].
    pub fn install(&self, handle: Arc<dyn AudioHandle>, token: &CancellationToken) -> Option<u64> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            return None;
        }
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        *current = Some((ticket, handle));
        Some(ticket)
    }

    /// Clear the slot if it still holds the unit with this ticket
    pub fn release(&self, ticket: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(t, _)| *t == ticket) {
            *current = None;
        }
    }

    /// Stop and drop the in-flight unit, if any
    pub fn stop_current(&self) {
        let taken = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((_, handle)) = taken {
            handle.stop();
        }
    }

    /// Whether an audio unit is in flight
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("occupied", &self.is_occupied())
            .finish_non_exhaustive()
    }
}

/// Audio backends in priority order
#[derive(Clone)]
pub struct BackendChain {
    tiers: Vec<Arc<dyn AudioBackend>>,
    timeout: Duration,
}

impl BackendChain {
    /// Create a chain that tries `tiers` in order
    #[must_use]
    pub fn new(tiers: Vec<Arc<dyn AudioBackend>>) -> Self {
        Self {
            tiers,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-unit timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the standard pre-generated → remote → system chain
    ///
    /// A tier that cannot be set up is left out with a warning; the system
    /// synthesizer is always present and reports "not available" at resolve
    /// time if no program was found.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut tiers: Vec<Arc<dyn AudioBackend>> = Vec::with_capacity(3);

        match AudioLibrary::open(&config.audio_dir) {
            Ok(library) => tiers.push(Arc::new(library)),
            Err(e) => tracing::warn!(
                path = %config.audio_dir.display(),
                error = %e,
                "pre-generated audio unavailable"
            ),
        }

        if let Some(remote) = &config.audio.remote {
            match RemoteSynthesis::from_config(remote) {
                Ok(synth) => tiers.push(Arc::new(synth)),
                Err(e) => tracing::warn!(error = %e, "remote synthesis disabled"),
            }
        }

        tiers.push(Arc::new(SystemSynth::detect(
            config.audio.synth_program.as_deref(),
        )));

        let chain = Self::new(tiers).with_timeout(config.audio.timeout);
        tracing::debug!(tiers = ?chain.tier_names(), timeout = ?chain.timeout, "audio chain ready");
        chain
    }

    /// Tier names in priority order
    #[must_use]
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Per-unit timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Produce one segment, falling through the tiers until one plays it
    ///
    /// The produced handle is registered in `slot` for the duration of
    /// playback so that `stop()` can halt it.
    pub async fn play(
        &self,
        segment: &Segment<'_>,
        rate: f32,
        token: &CancellationToken,
        slot: &HandleSlot,
    ) -> SegmentOutcome {
        for tier in &self.tiers {
            if token.is_cancelled() {
                return SegmentOutcome::Cancelled;
            }

            let resolved = tokio::select! {
                biased;
                () = token.cancelled() => return SegmentOutcome::Cancelled,
                r = tokio::time::timeout(self.timeout, tier.resolve(segment)) => {
                    r.unwrap_or(Err(Error::Timeout(self.timeout)))
                }
            };

            let handle = match resolved {
                Ok(Some(handle)) => handle,
                Ok(None) => {
                    tracing::debug!(
                        tier = tier.name(),
                        word_id = segment.word_id,
                        language = segment.language,
                        "no audio from tier"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        tier = tier.name(),
                        word_id = segment.word_id,
                        language = segment.language,
                        error = %e,
                        "tier failed to resolve audio"
                    );
                    continue;
                }
            };

            let Some(ticket) = slot.install(Arc::clone(&handle), token) else {
                return SegmentOutcome::Cancelled;
            };

            tracing::trace!(
                tier = tier.name(),
                text = segment.text,
                language = segment.language,
                rate,
                "playing audio unit"
            );

            let played = tokio::select! {
                biased;
                () = token.cancelled() => {
                    handle.stop();
                    slot.release(ticket);
                    return SegmentOutcome::Cancelled;
                }
                r = tokio::time::timeout(self.timeout, handle.play(rate)) => {
                    r.unwrap_or(Err(Error::Timeout(self.timeout)))
                }
            };
            slot.release(ticket);

            match played {
                Ok(()) if token.is_cancelled() => return SegmentOutcome::Cancelled,
                Ok(()) => return SegmentOutcome::Played(tier.name()),
                Err(e) => {
                    if matches!(e, Error::Timeout(_)) {
                        handle.stop();
                    }
                    tracing::warn!(
                        tier = tier.name(),
                        word_id = segment.word_id,
                        language = segment.language,
                        error = %e,
                        "audio unit failed"
                    );
                }
            }
        }

        if token.is_cancelled() {
            SegmentOutcome::Cancelled
        } else {
            SegmentOutcome::Silent
        }
    }
}

impl fmt::Debug for BackendChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendChain")
            .field("tiers", &self.tier_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}
