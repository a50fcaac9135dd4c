//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use voco::audio::{AudioBackend, AudioHandle, Segment};
use voco::{
    BackendChain, Error, PlaybackObserver, PlaybackState, Result, RunOutcome, WordPair,
};

/// One audio unit that started playing
#[derive(Debug, Clone)]
pub struct Spoken {
    pub tier: &'static str,
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct LogInner {
    attempts: Vec<(&'static str, String)>,
    spoken: Vec<Spoken>,
    finished: Vec<String>,
    aborted: Vec<String>,
}

/// What the fake backends were asked to do
#[derive(Debug, Default, Clone)]
pub struct Log(Arc<Mutex<LogInner>>);

impl Log {
    fn with<T>(&self, f: impl FnOnce(&mut LogInner) -> T) -> T {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Every (tier, text) a tier was asked to resolve
    pub fn attempts(&self) -> Vec<(&'static str, String)> {
        self.with(|l| l.attempts.clone())
    }

    pub fn spoken(&self) -> Vec<Spoken> {
        self.with(|l| l.spoken.clone())
    }

    /// Texts of units that started playing, in order
    pub fn spoken_texts(&self) -> Vec<String> {
        self.with(|l| l.spoken.iter().map(|s| s.text.clone()).collect())
    }

    /// Texts of units that played to the end
    pub fn finished(&self) -> Vec<String> {
        self.with(|l| l.finished.clone())
    }

    /// Texts of units halted by `stop()`
    pub fn aborted(&self) -> Vec<String> {
        self.with(|l| l.aborted.clone())
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Plays,
    Missing,
    Fails,
    Hangs,
}

/// Scriptable audio tier
pub struct FakeTier {
    name: &'static str,
    mode: Mode,
    log: Log,
    duration: Duration,
    block_on: Option<(String, Arc<Notify>)>,
}

impl FakeTier {
    /// A tier that plays every segment instantly
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            mode: Mode::Plays,
            log: log.clone(),
            duration: Duration::ZERO,
            block_on: None,
        }
    }

    /// Reports "not available" for every segment
    pub fn missing(mut self) -> Self {
        self.mode = Mode::Missing;
        self
    }

    /// Errors on every segment
    pub fn failing(mut self) -> Self {
        self.mode = Mode::Fails;
        self
    }

    /// Produces units that never finish playing
    pub fn hanging(mut self) -> Self {
        self.mode = Mode::Hangs;
        self
    }

    /// Each unit plays for `duration`
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Units for `text` signal `started` and play until stopped
    pub fn blocking_on(mut self, text: &str, started: Arc<Notify>) -> Self {
        self.block_on = Some((text.to_string(), started));
        self
    }
}

#[async_trait]
impl AudioBackend for FakeTier {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn resolve(&self, segment: &Segment<'_>) -> Result<Option<Arc<dyn AudioHandle>>> {
        self.log
            .with(|l| l.attempts.push((self.name, segment.text.to_string())));

        let block = self
            .block_on
            .as_ref()
            .filter(|(text, _)| text == segment.text)
            .map(|(_, started)| Arc::clone(started));

        match self.mode {
            Mode::Missing => Ok(None),
            Mode::Fails => Err(Error::Synthesis(format!("{} is down", self.name))),
            Mode::Plays | Mode::Hangs => Ok(Some(Arc::new(FakeUnit {
                tier: self.name,
                text: segment.text.to_string(),
                language: segment.language.to_string(),
                log: self.log.clone(),
                duration: self.duration,
                hangs: matches!(self.mode, Mode::Hangs),
                block,
                stop: Notify::new(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }))),
        }
    }
}

struct FakeUnit {
    tier: &'static str,
    text: String,
    language: String,
    log: Log,
    duration: Duration,
    hangs: bool,
    block: Option<Arc<Notify>>,
    stop: Notify,
    started: AtomicBool,
    stopped: AtomicBool,
}

#[async_trait]
impl AudioHandle for FakeUnit {
    async fn play(&self, rate: f32) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.started.store(true, Ordering::SeqCst);
        self.log.with(|l| {
            l.spoken.push(Spoken {
                tier: self.tier,
                text: self.text.clone(),
                language: self.language.clone(),
                rate,
                at: Instant::now(),
            });
        });

        if self.hangs {
            std::future::pending::<()>().await;
        }

        if let Some(started) = &self.block {
            started.notify_one();
            self.stop.notified().await;
            return Ok(());
        }

        tokio::select! {
            () = self.stop.notified() => return Ok(()),
            () = tokio::time::sleep(self.duration) => {}
        }

        self.log.with(|l| l.finished.push(self.text.clone()));
        Ok(())
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.started.load(Ordering::SeqCst) {
            self.log.with(|l| l.aborted.push(self.text.clone()));
        }
        self.stop.notify_one();
    }
}

/// Chain over the given tiers
pub fn chain(tiers: Vec<FakeTier>) -> BackendChain {
    BackendChain::new(
        tiers
            .into_iter()
            .map(|t| Arc::new(t) as Arc<dyn AudioBackend>)
            .collect(),
    )
}

/// Records every observer callback
#[derive(Debug, Default)]
pub struct Recorder {
    states: Mutex<Vec<PlaybackState>>,
    words: Mutex<Vec<usize>>,
    completions: Mutex<Vec<RunOutcome>>,
}

impl Recorder {
    pub fn states(&self) -> Vec<PlaybackState> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn words(&self) -> Vec<usize> {
        self.words.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn completions(&self) -> Vec<RunOutcome> {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PlaybackObserver for Recorder {
    fn on_state(&self, state: PlaybackState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state);
    }

    fn on_word(&self, index: usize, _pair: &WordPair) {
        self.words
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(index);
    }

    fn on_complete(&self, outcome: RunOutcome) {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }
}

/// A word pair with `order` equal to `id`
pub fn word(id: u64, source: &str, target: &str) -> WordPair {
    WordPair {
        id,
        source_text: source.to_string(),
        target_text: target.to_string(),
        order: u32::try_from(id).unwrap_or(u32::MAX),
    }
}
