//! Decoded clips and speaker output

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::AudioHandle;
use crate::playback::CancellationToken;
use crate::{Error, Result};

/// Sample rate of the output stream (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Rates outside this range are clamped before resampling
const MIN_RATE: f32 = 0.25;
const MAX_RATE: f32 = 4.0;

/// Encoded audio container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Guess the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" | "wave" => Some(Self::Wav),
            _ => None,
        }
    }

    /// Guess the format from an HTTP `Content-Type`
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Mono PCM audio
#[derive(Debug, Clone)]
pub struct Clip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Clip {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Decode MP3 or WAV bytes, mixing down to mono
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid audio of that format
    pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<Self> {
        match format {
            AudioFormat::Mp3 => decode_mp3(bytes),
            AudioFormat::Wav => decode_wav(bytes),
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length at normal speed
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Samples for a [`PLAYBACK_SAMPLE_RATE`] stream that play this clip at
    /// `rate` times normal speed
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails
    pub fn render(&self, rate: f32) -> Result<Vec<f32>> {
        let (input, output) = resample_ratio(self.sample_rate, rate);
        if input == output || self.samples.is_empty() {
            return Ok(self.samples.to_vec());
        }
        resample(&self.samples, input, output)
    }
}

/// Input:output sample ratio, in lowest terms, that makes a clip recorded at
/// `sample_rate` play at `rate` times normal speed on a
/// [`PLAYBACK_SAMPLE_RATE`] stream
///
/// `rate` is taken to 1/100, which keeps 0.7, 1.0 and 1.3 exact.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resample_ratio(sample_rate: u32, rate: f32) -> (u64, u64) {
    let rate = if rate.is_finite() {
        rate.clamp(MIN_RATE, MAX_RATE)
    } else {
        1.0
    };
    let hundredths = (rate * 100.0).round() as u64;

    let input = u64::from(sample_rate.max(1)) * hundredths;
    let output = u64::from(PLAYBACK_SAMPLE_RATE) * 100;
    let divisor = gcd(input, output);
    (input / divisor, output / divisor)
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Resample audio using rubato
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn resample(samples: &[f32], from: u64, to: u64) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from as usize, to as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let frames = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to / from.max(1)) as usize;
    let wanted = expected + delay;

    let mut output: Vec<f32> = Vec::with_capacity(wanted + frames);
    let mut chunks = samples.chunks(frames);

    // Keep feeding (zero-padded once input runs out) until the delayed tail is flushed
    while output.len() < wanted {
        let mut block: Vec<f64> = chunks
            .next()
            .map(|c| c.iter().map(|&s| f64::from(s)).collect())
            .unwrap_or_default();
        block.resize(frames, 0.0);

        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Clip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate.is_none() {
                    sample_rate = u32::try_from(frame.sample_rate).ok();
                }
                let channels = frame.channels.max(1);
                samples.extend(
                    frame
                        .data
                        .chunks(channels)
                        .map(|chunk| chunk.iter().map(|&s| f32::from(s) / 32768.0).sum::<f32>() / chunk_len(chunk)),
                );
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Audio("MP3 contained no audio frames".to_string()))?;
    Ok(Clip::new(samples, sample_rate))
}

/// Decode WAV bytes to mono f32 samples
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav_data: &[u8]) -> Result<Clip> {
    let wav_err = |e: hound::Error| Error::Audio(format!("WAV decode error: {e}"));

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).map_err(wav_err)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(wav_err)?,
        hound::SampleFormat::Int => {
            let scale = 2f32.powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_err)?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk_len(chunk))
        .collect();
    Ok(Clip::new(samples, spec.sample_rate))
}

#[allow(clippy::cast_precision_loss)]
fn chunk_len<T>(chunk: &[T]) -> f32 {
    chunk.len() as f32
}

/// Pick an output config at [`PLAYBACK_SAMPLE_RATE`], mono if possible
fn output_config(device: &Device) -> Result<StreamConfig> {
    let supports = |channels: u16| {
        move |c: &cpal::SupportedStreamConfigRange| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        }
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(supports(1))
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(supports(2))
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported
        .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
        .config())
}

/// Play samples on the default output device until done or stopped
fn play_blocking(samples: Vec<f32>, stop: &CancellationToken) -> Result<()> {
    if samples.is_empty() || stop.is_cancelled() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
    let config = output_config(&device)?;
    let channels = usize::from(config.channels);

    let sample_count = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let stop = stop.clone();

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let halted = stop.is_cancelled();
                    let mut pos = position.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        let sample = match samples.get(pos) {
                            Some(&s) if !halted => {
                                pos += 1;
                                s
                            }
                            _ => {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            }
                        };
                        frame.fill(sample);
                    }

                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion with timeout
    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) && !stop.is_cancelled() {
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    if !stop.is_cancelled() {
        // Let the device drain its buffer
        std::thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    tracing::trace!(
        samples = sample_count,
        played = position.load(Ordering::Relaxed),
        stopped = stop.is_cancelled(),
        "clip playback ended"
    );

    Ok(())
}

/// A decoded clip played through the speakers
#[derive(Debug)]
pub struct ClipHandle {
    clip: Clip,
    stop: CancellationToken,
}

impl ClipHandle {
    #[must_use]
    pub fn new(clip: Clip) -> Self {
        Self {
            clip,
            stop: CancellationToken::new(),
        }
    }

    /// Decode bytes into a playable handle
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails
    pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<Self> {
        Clip::decode(bytes, format).map(Self::new)
    }

    #[must_use]
    pub const fn clip(&self) -> &Clip {
        &self.clip
    }
}

#[async_trait]
impl AudioHandle for ClipHandle {
    async fn play(&self, rate: f32) -> Result<()> {
        if self.stop.is_cancelled() {
            return Ok(());
        }

        let clip = self.clip.clone();
        let stop = self.stop.clone();
        tokio::task::spawn_blocking(move || {
            let samples = clip.render(rate)?;
            play_blocking(samples, &stop)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}
