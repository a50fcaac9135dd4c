//! Playback sequencer
//!
//! One run at a time: either a single word (`play_word`) or an
//! auto-advancing list (`play_all`). `stop()` may be called from any task,
//! including from inside an observer callback.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use super::{
    CancellationToken, NoopObserver, PlaybackObserver, PlaybackState, PronunciationSpeed,
    RunOutcome, SharedSettings,
};
use crate::audio::{BackendChain, HandleSlot, Segment, SegmentOutcome};
use crate::words::WordPair;

/// Silence between repeats of the same segment
pub const REPEAT_GAP: Duration = Duration::from_millis(300);

/// Languages of the two halves of every word pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    /// Language being learned; `source_text` is spoken in it
    pub learning: String,
    /// The learner's own language; `target_text` is spoken in it
    pub native: String,
}

impl LanguagePair {
    pub fn new(learning: impl Into<String>, native: impl Into<String>) -> Self {
        Self {
            learning: learning.into(),
            native: native.into(),
        }
    }
}

/// The run currently holding the in-flight guard
#[derive(Debug, Clone)]
struct Run {
    id: u64,
    token: CancellationToken,
}

/// Observer notification waiting to be delivered
#[derive(Debug)]
enum Report {
    State(PlaybackState),
    Word(usize, WordPair),
}

#[derive(Debug, Default)]
struct Control {
    /// Id of the run holding the in-flight guard
    active: Option<u64>,
    /// Token of the most recent run
    token: Option<CancellationToken>,
    state: PlaybackState,
    current_index: Option<usize>,
    /// Reports in the order their changes were made
    pending: VecDeque<Report>,
    /// Thread currently delivering reports
    reporter: Option<ThreadId>,
}

/// Sequences spoken segments for word pairs
pub struct Sequencer {
    chain: BackendChain,
    languages: LanguagePair,
    observer: Arc<dyn PlaybackObserver>,
    control: Mutex<Control>,
    /// Signalled when a reporter finishes delivering
    delivered: Condvar,
    slot: HandleSlot,
    next_run: AtomicU64,
}

impl Sequencer {
    /// Create an idle sequencer
    #[must_use]
    pub fn new(chain: BackendChain, languages: LanguagePair) -> Self {
        Self {
            chain,
            languages,
            observer: Arc::new(NoopObserver),
            control: Mutex::new(Control::default()),
            delivered: Condvar::new(),
            slot: HandleSlot::new(),
            next_run: AtomicU64::new(1),
        }
    }

    /// Report state, word and completion events to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PlaybackObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub const fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    /// Index of the word `play_all` is on, or was last on
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.lock().current_index
    }

    /// Whether a run holds the in-flight guard
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Whether the most recent run was cancelled
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.lock()
            .token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Play one word pair
    ///
    /// Speaks the source text `repeat_source` times in the learning
    /// language, pauses, then speaks the target text `repeat_target` times
    /// in the native language. A pair with blank text plays nothing.
    /// Returns [`RunOutcome::Rejected`] without playing if another run is
    /// active.
    pub async fn play_word(&self, pair: &WordPair, settings: &SharedSettings) -> RunOutcome {
        let Some(run) = self.begin_run() else {
            return RunOutcome::Rejected;
        };

        tracing::debug!(run = run.id, word_id = pair.id, "playing single word");
        self.speak_pair(&run, pair, settings).await;

        let outcome = Self::outcome_of(&run);
        self.finish_run(&run);
        outcome
    }

    /// Play `words` from `start_index` to the end, pausing between words
    ///
    /// The observer's `on_complete` fires exactly once for an accepted run,
    /// whether it reached the end or was stopped. An empty list, an
    /// out-of-range start or an active run rejects the call.
    pub async fn play_all(
        &self,
        words: &[WordPair],
        start_index: usize,
        settings: &SharedSettings,
    ) -> RunOutcome {
        if start_index >= words.len() {
            tracing::warn!(
                start_index,
                words = words.len(),
                "nothing to play from this position"
            );
            return RunOutcome::Rejected;
        }

        let Some(run) = self.begin_run() else {
            return RunOutcome::Rejected;
        };

        tracing::info!(
            run = run.id,
            words = words.len(),
            start_index,
            "starting auto-play"
        );

        for (index, pair) in words.iter().enumerate().skip(start_index) {
            if !self.enter_word(&run, index, pair) {
                break;
            }

            self.speak_pair(&run, pair, settings).await;

            if index + 1 == words.len() {
                break;
            }
            if !self.transition(&run, PlaybackState::PausingNext) {
                break;
            }
            let pause = settings.snapshot().word_pause();
            if !Self::pause(&run, pause).await {
                break;
            }
        }

        let outcome = Self::outcome_of(&run);
        self.finish_run(&run);
        tracing::info!(run = run.id, ?outcome, "auto-play finished");
        self.observer.on_complete(outcome);
        outcome
    }

    /// Cancel the active run and silence the in-flight audio unit
    ///
    /// Once this returns, the stopped run starts no further audio and
    /// reports no further state. Does nothing when idle. When called from an
    /// observer callback, the `Idle` report follows once that callback
    /// returns.
    pub fn stop(&self) {
        {
            let mut control = self.lock();
            let Some(id) = control.active.take() else {
                return;
            };
            if let Some(token) = &control.token {
                token.cancel();
            }
            Self::set_state(&mut control, PlaybackState::Idle);
            tracing::info!(run = id, "playback stopped");
        }
        self.slot.stop_current();
        self.deliver(self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand queued reports to the observer with the control lock released
    ///
    /// One thread delivers at a time, so the observer sees reports in the
    /// order they were queued. A nested call from inside a callback returns
    /// at once and the outer loop delivers what it queued. Other threads wait
    /// until the queue is drained.
    fn deliver<'a>(&'a self, mut control: MutexGuard<'a, Control>) {
        let me = thread::current().id();
        match control.reporter {
            Some(reporter) if reporter == me => return,
            Some(_) => {
                control = self
                    .delivered
                    .wait_while(control, |c| c.reporter.is_some())
                    .unwrap_or_else(PoisonError::into_inner);
            }
            None => {}
        }
        if control.pending.is_empty() {
            return;
        }

        control.reporter = Some(me);
        let _reporting = Reporting(self);
        while let Some(report) = control.pending.pop_front() {
            drop(control);
            match report {
                Report::State(state) => self.observer.on_state(state),
                Report::Word(index, pair) => self.observer.on_word(index, &pair),
            }
            control = self.lock();
        }
        drop(control);
    }

    fn begin_run(&self) -> Option<Run> {
        let mut control = self.lock();
        if let Some(active) = control.active {
            tracing::warn!(active, "playback already in progress, ignoring request");
            return None;
        }

        let run = Run {
            id: self.next_run.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        control.active = Some(run.id);
        control.token = Some(run.token.clone());
        Some(run)
    }

    fn finish_run(&self, run: &Run) {
        let mut control = self.lock();
        if control.active != Some(run.id) {
            return;
        }
        control.active = None;
        Self::set_state(&mut control, PlaybackState::Idle);
        self.deliver(control);
    }

    fn outcome_of(run: &Run) -> RunOutcome {
        if run.token.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        }
    }

    /// Move to `state` if `run` is still live
    ///
    /// False if the run was stopped, including by the observer reacting to
    /// this very change.
    fn transition(&self, run: &Run, state: PlaybackState) -> bool {
        let mut control = self.lock();
        if control.active != Some(run.id) || run.token.is_cancelled() {
            return false;
        }
        Self::set_state(&mut control, state);
        self.deliver(control);
        !run.token.is_cancelled()
    }

    fn enter_word(&self, run: &Run, index: usize, pair: &WordPair) -> bool {
        let mut control = self.lock();
        if control.active != Some(run.id) || run.token.is_cancelled() {
            return false;
        }
        control.current_index = Some(index);
        tracing::debug!(run = run.id, index, word_id = pair.id, "advancing to word");
        control.pending.push_back(Report::Word(index, pair.clone()));
        self.deliver(control);
        !run.token.is_cancelled()
    }

    fn set_state(control: &mut Control, state: PlaybackState) {
        if control.state == state {
            return;
        }
        tracing::debug!(from = %control.state, to = %state, "playback state");
        control.state = state;
        control.pending.push_back(Report::State(state));
    }

    async fn speak_pair(&self, run: &Run, pair: &WordPair, settings: &SharedSettings) {
        let source = pair.source_text.trim();
        let target = pair.target_text.trim();
        if source.is_empty() || target.is_empty() {
            tracing::debug!(word_id = pair.id, "word pair has blank text, skipping audio");
            return;
        }

        let current = settings.snapshot();
        if !self.transition(run, PlaybackState::PlayingSource) {
            return;
        }
        if !self
            .speak_repeated(
                run,
                pair.id,
                source,
                &self.languages.learning,
                current.repeat_source,
                current.pronunciation_speed,
            )
            .await
        {
            return;
        }

        if !self.transition(run, PlaybackState::PausingBetween) {
            return;
        }
        let current = settings.snapshot();
        if !Self::pause(run, current.language_pause()).await {
            return;
        }

        let current = settings.snapshot();
        if !self.transition(run, PlaybackState::PlayingTarget) {
            return;
        }
        self.speak_repeated(
            run,
            pair.id,
            target,
            &self.languages.native,
            current.repeat_target,
            current.pronunciation_speed,
        )
        .await;
    }

    /// Speak `text` `repeats` times; false if the run was cancelled
    async fn speak_repeated(
        &self,
        run: &Run,
        word_id: u64,
        text: &str,
        language: &str,
        repeats: u8,
        speed: PronunciationSpeed,
    ) -> bool {
        let segment = Segment {
            word_id,
            text,
            language,
        };

        for repeat in 0..repeats {
            if run.token.is_cancelled() {
                return false;
            }

            match self
                .chain
                .play(&segment, speed.rate(), &run.token, &self.slot)
                .await
            {
                SegmentOutcome::Played(tier) => {
                    tracing::trace!(word_id, language, repeat, tier, "segment played");
                }
                SegmentOutcome::Silent => {
                    tracing::warn!(word_id, language, repeat, "no audio for segment, skipping");
                }
                SegmentOutcome::Cancelled => return false,
            }

            if repeat + 1 < repeats && !Self::pause(run, REPEAT_GAP).await {
                return false;
            }
        }

        !run.token.is_cancelled()
    }

    /// Wait out a pause; false if the run was cancelled meanwhile
    async fn pause(run: &Run, duration: Duration) -> bool {
        if !duration.is_zero() {
            tokio::select! {
                biased;
                () = run.token.cancelled() => return false,
                () = tokio::time::sleep(duration) => {}
            }
        }
        !run.token.is_cancelled()
    }
}

/// Releases the reporter role when delivery ends, even by panic
struct Reporting<'a>(&'a Sequencer);

impl Drop for Reporting<'_> {
    fn drop(&mut self) {
        self.0.lock().reporter = None;
        self.0.delivered.notify_all();
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("chain", &self.chain)
            .field("languages", &self.languages)
            .field("control", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::Result;
    use crate::audio::{AudioBackend, AudioHandle};
    use crate::playback::PlaybackSettings;

    /// Records every (text, language, rate) it is asked to play
    #[derive(Default)]
    struct Recording {
        calls: StdMutex<Vec<(String, String, f32)>>,
    }

    struct Unit {
        log: Arc<Recording>,
        text: String,
        language: String,
    }

    #[async_trait]
    impl AudioHandle for Unit {
        async fn play(&self, rate: f32) -> Result<()> {
            self.log
                .calls
                .lock()
                .unwrap()
                .push((self.text.clone(), self.language.clone(), rate));
            Ok(())
        }

        fn stop(&self) {}
    }

    struct Backend(Arc<Recording>);

    #[async_trait]
    impl AudioBackend for Backend {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>> {
            Ok(Some(Arc::new(Unit {
                log: Arc::clone(&self.0),
                text: segment.text.to_string(),
                language: segment.language.to_string(),
            })))
        }
    }

    fn sequencer() -> (Sequencer, Arc<Recording>) {
        let log = Arc::new(Recording::default());
        let chain = BackendChain::new(vec![Arc::new(Backend(Arc::clone(&log)))]);
        (Sequencer::new(chain, LanguagePair::new("es", "en")), log)
    }

    fn pair(id: u64, source: &str, target: &str) -> WordPair {
        WordPair {
            id,
            source_text: source.to_string(),
            target_text: target.to_string(),
            order: u32::try_from(id).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn play_word_speaks_source_then_target() {
        let (sequencer, log) = sequencer();
        let settings = SharedSettings::from(PlaybackSettings {
            repeat_source: 2,
            repeat_target: 1,
            ..Default::default()
        });

        let outcome = sequencer.play_word(&pair(1, "hola", "hello"), &settings).await;

        assert_eq!(outcome, RunOutcome::Completed);
        let calls = log.calls.lock().unwrap().clone();
        let spoken: Vec<(&str, &str)> = calls
            .iter()
            .map(|(t, l, _)| (t.as_str(), l.as_str()))
            .collect();
        assert_eq!(spoken, vec![("hola", "es"), ("hola", "es"), ("hello", "en")]);
        assert_eq!(sequencer.state(), PlaybackState::Idle);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_pair_plays_nothing() {
        let (sequencer, log) = sequencer();
        let outcome = sequencer
            .play_word(&pair(1, "  ", "hello"), &SharedSettings::default())
            .await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(log.calls.lock().unwrap().is_empty());
        assert_eq!(sequencer.state(), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn play_all_rejects_out_of_range_start() {
        let (sequencer, _log) = sequencer();
        let words = vec![pair(1, "uno", "one")];
        let settings = SharedSettings::default();

        assert_eq!(
            sequencer.play_all(&words, 1, &settings).await,
            RunOutcome::Rejected
        );
        assert_eq!(sequencer.play_all(&[], 0, &settings).await, RunOutcome::Rejected);
        assert!(!sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn play_all_honors_start_index() {
        let (sequencer, log) = sequencer();
        let words = vec![pair(1, "uno", "one"), pair(2, "dos", "two"), pair(3, "tres", "three")];

        let outcome = sequencer
            .play_all(&words, 1, &SharedSettings::default())
            .await;

        assert_eq!(outcome, RunOutcome::Completed);
        let texts: Vec<String> = log.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
        assert_eq!(texts, vec!["dos", "two", "tres", "three"]);
        assert_eq!(sequencer.current_index(), Some(2));
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let (sequencer, _log) = sequencer();
        sequencer.stop();
        sequencer.stop();
        assert_eq!(sequencer.state(), PlaybackState::Idle);
        assert!(!sequencer.is_cancel_requested());
    }
}
