use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voco::audio::{Clip, ClipHandle, HandleSlot, PLAYBACK_SAMPLE_RATE, SegmentOutcome};
use voco::words::languages;
use voco::{
    AudioHandle, BackendChain, CancellationToken, Config, Error, JsonWordSource, LanguagePair,
    PlaybackObserver, PlaybackSettings, PronunciationSpeed, RunOutcome, Segment, Sequencer,
    SharedSettings, WordPair, WordSource,
};

/// VOCO - Listen-and-repeat vocabulary drills
#[derive(Parser)]
#[command(name = "voco", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List vocabulary topics
    Topics,
    /// List languages available for a topic
    Languages {
        /// Topic id
        #[arg(short, long)]
        topic: u64,
    },
    /// Print a topic's word pairs in learning order
    Words {
        /// Topic id
        #[arg(short, long)]
        topic: u64,
        #[command(flatten)]
        pair: PairArgs,
    },
    /// Play a topic's words aloud
    Play {
        /// Topic id
        #[arg(short, long)]
        topic: u64,
        #[command(flatten)]
        pair: PairArgs,
        /// Index of the first word to play
        #[arg(long, default_value = "0")]
        start: usize,
        /// Play only the word at --start
        #[arg(long)]
        single: bool,
        #[command(flatten)]
        pacing: PacingArgs,
    },
    /// Test speaker output
    TestSpeaker,
    /// Speak text through the audio backends
    Say {
        /// Text to speak
        text: String,
        /// Language code
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Word id for pre-generated audio lookup
        #[arg(long, default_value = "0")]
        word_id: u64,
        /// slow, normal or fast
        #[arg(long, default_value = "normal")]
        speed: PronunciationSpeed,
    },
}

#[derive(clap::Args)]
struct PairArgs {
    /// Language being learned (code or name)
    #[arg(short, long, env = "VOCO_LEARN")]
    learn: String,
    /// Your native language (code or name)
    #[arg(short, long, env = "VOCO_NATIVE", default_value = "en")]
    native: String,
}

/// Overrides for the `[playback]` config table
#[derive(clap::Args)]
struct PacingArgs {
    /// slow, normal or fast
    #[arg(long)]
    speed: Option<PronunciationSpeed>,
    /// Times the learning-language word is spoken (1-5)
    #[arg(long)]
    repeat_source: Option<u8>,
    /// Times the native-language word is spoken (1-5)
    #[arg(long)]
    repeat_target: Option<u8>,
    /// Seconds between the two languages
    #[arg(long)]
    pause_languages: Option<f64>,
    /// Seconds before the next word
    #[arg(long)]
    pause_words: Option<f64>,
}

impl PacingArgs {
    fn apply(&self, settings: &mut PlaybackSettings) {
        if let Some(speed) = self.speed {
            settings.pronunciation_speed = speed;
        }
        if let Some(n) = self.repeat_source {
            settings.repeat_source = n;
        }
        if let Some(n) = self.repeat_target {
            settings.repeat_target = n;
        }
        if let Some(secs) = self.pause_languages {
            settings.pause_between_languages = secs;
        }
        if let Some(secs) = self.pause_words {
            settings.pause_between_words = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voco=info",
        1 => "info,voco=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Topics => list_topics().await,
        Command::Languages { topic } => list_languages(topic).await,
        Command::Words { topic, pair } => list_words(topic, &pair).await,
        Command::Play {
            topic,
            pair,
            start,
            single,
            pacing,
        } => play(topic, &pair, start, single, &pacing).await,
        Command::TestSpeaker => test_speaker().await,
        Command::Say {
            text,
            lang,
            word_id,
            speed,
        } => say(&text, &lang, word_id, speed).await,
    }
}

async fn list_topics() -> anyhow::Result<()> {
    let config = Config::load()?;
    let source = JsonWordSource::new(&config.data_dir);

    for topic in source.topics().await? {
        let marker = match (topic.premium, topic.is_accessible(config.subscription_active)) {
            (false, _) => "",
            (true, true) => "  [premium]",
            (true, false) => "  [premium, locked]",
        };
        println!(
            "{:>4}  {} ({} words){marker}",
            topic.id, topic.name, topic.word_count
        );
    }

    Ok(())
}

async fn list_languages(topic: u64) -> anyhow::Result<()> {
    let config = Config::load()?;
    let source = JsonWordSource::new(&config.data_dir);

    for code in source.available_languages(topic).await? {
        let name = languages::language_name(&code).unwrap_or("unknown");
        println!("{code:>6}  {name}");
    }

    Ok(())
}

async fn list_words(topic: u64, pair: &PairArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    let source = JsonWordSource::new(&config.data_dir);
    let (learn, native) = (languages::normalize(&pair.learn), languages::normalize(&pair.native));

    let words = source.get_words(topic, &learn, &native).await?;
    for (index, word) in words.iter().enumerate() {
        println!("{index:>4}  {}  →  {}", word.source_text, word.target_text);
    }
    println!("\n{} words ({learn} → {native})", words.len());

    Ok(())
}

/// Prints progress while a topic plays
struct ConsoleObserver {
    total: usize,
}

impl PlaybackObserver for ConsoleObserver {
    fn on_word(&self, index: usize, pair: &WordPair) {
        println!(
            "[{}/{}] {}  →  {}",
            index + 1,
            self.total,
            pair.source_text,
            pair.target_text
        );
    }

    fn on_complete(&self, outcome: RunOutcome) {
        tracing::debug!(?outcome, "playback run complete");
    }
}

async fn play(
    topic_id: u64,
    pair: &PairArgs,
    start: usize,
    single: bool,
    pacing: &PacingArgs,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let source = JsonWordSource::new(&config.data_dir);

    let topic = source.topic(topic_id).await?;
    if !topic.is_accessible(config.subscription_active) {
        return Err(Error::SubscriptionRequired(topic.name).into());
    }

    let learn = languages::normalize(&pair.learn);
    let native = languages::normalize(&pair.native);
    let words = source.get_words(topic.id, &learn, &native).await?;
    if words.is_empty() {
        anyhow::bail!("topic \"{}\" has no words in both {learn} and {native}", topic.name);
    }

    let mut settings = config.playback.clone();
    pacing.apply(&mut settings);
    if single {
        settings.auto_play = false;
    }
    let settings = SharedSettings::new(settings);

    let observer = Arc::new(ConsoleObserver { total: words.len() });
    let sequencer = Arc::new(
        Sequencer::new(BackendChain::from_config(&config), LanguagePair::new(learn, native))
            .with_observer(observer),
    );

    // Ctrl-C stops playback instead of killing the process
    let stopper = Arc::clone(&sequencer);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping...");
            stopper.stop();
        }
    });

    println!("Playing \"{}\" ({} words)\n", topic.name, words.len());

    let outcome = if settings.snapshot().auto_play {
        sequencer.play_all(&words, start, &settings).await
    } else {
        let word = words
            .get(start)
            .with_context(|| format!("no word at index {start} ({} words)", words.len()))?;
        println!("{}  →  {}", word.source_text, word.target_text);
        sequencer.play_word(word, &settings).await
    };
    interrupt.abort();

    match outcome {
        RunOutcome::Completed => println!("\nDone."),
        RunOutcome::Cancelled => println!("Stopped."),
        RunOutcome::Rejected => {
            anyhow::bail!("nothing to play from index {start} ({} words)", words.len())
        }
    }

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), PLAYBACK_SAMPLE_RATE);

    ClipHandle::new(Clip::new(samples, PLAYBACK_SAMPLE_RATE))
        .play(1.0)
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Speak text through the backend chain
async fn say(text: &str, lang: &str, word_id: u64, speed: PronunciationSpeed) -> anyhow::Result<()> {
    let config = Config::load()?;
    let chain = BackendChain::from_config(&config);
    let language = languages::normalize(lang);

    println!("Speaking \"{text}\" ({language}, {speed}) via {:?}", chain.tier_names());

    let segment = Segment {
        word_id,
        text,
        language: &language,
    };
    let outcome = chain
        .play(&segment, speed.rate(), &CancellationToken::new(), &HandleSlot::new())
        .await;

    match outcome {
        SegmentOutcome::Played(tier) => {
            println!("Played by the {tier} backend.");
            Ok(())
        }
        SegmentOutcome::Silent => anyhow::bail!("no backend could produce audio for \"{text}\""),
        SegmentOutcome::Cancelled => Ok(()),
    }
}
