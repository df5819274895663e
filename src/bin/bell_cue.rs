use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bell_cue::analysis::DetectionEvent;
use bell_cue::config::AppConfig;
use bell_cue::fixtures::{ExpectationDiff, FixtureCatalog, FixtureProcessor, ReplayReport};
use bell_cue::presenter::{ConfirmationPlayer, Deck, DeckAdvanceSink, LoggingPlayer};
use bell_cue::telemetry;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "bell_cue", about = "Bell strike detector and replay harness")]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,
    /// Detector configuration JSON (defaults to assets/detector_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen on the default microphone and advance a deck of names on each bell
    Listen {
        /// Names to cycle through, in order
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,
        #[arg(long)]
        spike_threshold: Option<f32>,
        #[arg(long)]
        frequency_threshold: Option<f32>,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Skip the confirmation sound
        #[arg(long)]
        no_sound: bool,
    },
    /// Replay a WAV fixture through the detector and optionally compare against expectations
    Replay {
        /// Fixture name or path to a WAV file
        #[arg(long, alias = "wav")]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_frequency_gate: bool,
    },
    /// Print the per-tick loudness readings of a WAV fixture
    Levels {
        #[arg(long, alias = "wav")]
        fixture: String,
    },
    /// List available fixtures on disk
    DumpFixtures,
}

fn main() -> ExitCode {
    bell_cue::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Listen {
            names,
            spike_threshold,
            frequency_threshold,
            duration_secs,
            no_sound,
        } => run_listen(
            config,
            names,
            spike_threshold,
            frequency_threshold,
            duration_secs,
            no_sound,
        ),
        Commands::Replay {
            fixture,
            expect,
            output,
            no_frequency_gate,
        } => run_replay(&catalog, &config, &fixture, expect, output, no_frequency_gate),
        Commands::Levels { fixture } => run_levels(&catalog, &config, &fixture),
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

#[cfg(feature = "mic")]
fn mic_backend(config: &AppConfig) -> Result<Arc<dyn bell_cue::audio::LevelBackend>> {
    Ok(Arc::new(bell_cue::audio::CpalBackend::new(
        config.sampling.level_queue_capacity,
    )))
}

#[cfg(not(feature = "mic"))]
fn mic_backend(_config: &AppConfig) -> Result<Arc<dyn bell_cue::audio::LevelBackend>> {
    Err(anyhow::anyhow!(
        "bell_cue was built without the `mic` feature; live listening is unavailable"
    ))
}

fn run_listen(
    config: AppConfig,
    names: Vec<String>,
    spike_threshold: Option<f32>,
    frequency_threshold: Option<f32>,
    duration_secs: Option<u64>,
    no_sound: bool,
) -> Result<ExitCode> {
    let player: Option<Box<dyn ConfirmationPlayer>> = if config.trigger.play_sound && !no_sound {
        Some(Box::new(LoggingPlayer))
    } else {
        None
    };
    let sink = Arc::new(
        DeckAdvanceSink::new(Deck::from_names(&names), player)
            .with_alternate_probability(config.trigger.alternate_sound_probability),
    );

    let backend = mic_backend(&config)?;
    let listener = bell_cue::ListenerHandle::new(config, backend, sink.clone());
    if let Some(value) = spike_threshold {
        let applied = listener.set_spike_threshold(value);
        tracing::info!("spike threshold {}", applied);
    }
    if let Some(value) = frequency_threshold {
        let applied = listener.set_frequency_threshold(value);
        tracing::info!("frequency threshold {}", applied);
    }

    if let Some(entry) = sink.current_entry() {
        eprintln!("Showing {} ({})", entry.name, sink.counter_label());
    }

    listener.start().context("starting listener")?;
    let mut detections = listener.subscribe_detections();

    let rt = tokio::runtime::Runtime::new().context("creating Tokio runtime")?;
    let outcome = rt.block_on(async {
        let deadline = async {
            match duration_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = &mut deadline => break,
                received = detections.recv() => match received {
                    Ok(event) => {
                        let line = DetectionLine {
                            event: &event,
                            current: sink.current_entry().map(|entry| entry.name),
                            counter: sink.counter_label(),
                        };
                        println!("{}", serde_json::to_string(&line)?);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("detection output lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    listener.stop();
    let snapshot = telemetry::hub().snapshot();
    tracing::info!(
        "session finished: {} telemetry events recorded",
        snapshot.total_events
    );
    outcome?;
    Ok(ExitCode::from(0))
}

fn run_replay(
    catalog: &FixtureCatalog,
    config: &AppConfig,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    no_frequency_gate: bool,
) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(config).with_frequency_gating(!no_frequency_gate);
    let data = catalog
        .load(fixture, override_expect)
        .with_context(|| format!("loading fixture {}", fixture))?;
    let report = processor.run(&data);

    emit_report(&report, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&report.detections) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_levels(catalog: &FixtureCatalog, config: &AppConfig, fixture: &str) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(config);
    let data = catalog
        .load(fixture, None)
        .with_context(|| format!("loading fixture {}", fixture))?;

    for (tick, level_db) in processor.tick_levels(&data).into_iter().enumerate() {
        let line = LevelLine {
            tick,
            offset_ms: tick as u64 * processor.tick_ms(),
            level_db,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(report: &ReplayReport, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct DetectionLine<'a> {
    #[serde(flatten)]
    event: &'a DetectionEvent,
    current: Option<String>,
    counter: String,
}

#[derive(Serialize)]
struct LevelLine {
    tick: usize,
    offset_ms: u64,
    level_db: f32,
}
