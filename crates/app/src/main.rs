use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::mpsc::{self, Receiver},
    thread,
    time::Instant,
};

use clap::{Parser, Subcommand};
use dj_booth_core::{
    audio::{PcmStream, SampleSource, SyntheticSource, WavSource},
    display::{Placed, Presenter, Theme},
    effects, AppConfig, Booth, BoothError, ControlCommand, FrameSink, Rgb,
};
use tracing_subscriber::EnvFilter;

fn main() -> dj_booth_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match &cli.command {
        Commands::Play { input } if input == "-" => {
            // stdin carries audio, so there is no control channel.
            let source = PcmStream::new(io::stdin().lock());
            run_booth(&cli, &config, source, None)
        }
        Commands::Play { input } => {
            let source = WavSource::open(input)?;
            if source.sample_rate() != config.audio.sample_rate {
                tracing::warn!(
                    file = source.sample_rate(),
                    configured = config.audio.sample_rate,
                    "using the file's sample rate"
                );
                config.audio.sample_rate = source.sample_rate();
            }
            run_booth(&cli, &config, source, Some(spawn_controls()))
        }
        Commands::Simulate { bpm, seconds } => {
            let mut source = SyntheticSource::new(config.audio.sample_rate, *bpm);
            if let Some(seconds) = seconds {
                source = source.with_duration(*seconds);
            }
            run_booth(&cli, &config, source, Some(spawn_controls()))
        }
        Commands::List => {
            for (index, name) in config.catalog.animations.iter().enumerate() {
                println!("{:>2}  {name}", index + 1);
            }
            let unused: Vec<_> = effects::BUILTIN_NAMES
                .iter()
                .filter(|name| !config.catalog.animations.iter().any(|n| n == *name))
                .collect();
            if !unused.is_empty() {
                println!("not in catalog: {unused:?}");
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> dj_booth_core::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    if cli.manual {
        config.switching.auto_switch = false;
    }
    if cli.seed.is_some() {
        config.switching.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

fn run_booth<S: SampleSource>(
    cli: &Cli,
    config: &AppConfig,
    source: S,
    controls: Option<Receiver<ControlCommand>>,
) -> dj_booth_core::Result<()> {
    let mut booth = Booth::new(config, source)?;
    tracing::info!(
        animation = booth.controller().current_name().unwrap_or("none"),
        auto = booth.controller().is_auto_switch_enabled(),
        "starting booth"
    );

    let theme = Theme::by_name(&cli.theme).ok_or_else(|| {
        BoothError::config(format!(
            "unknown theme `{}`, expected one of {:?}",
            cli.theme,
            Theme::NAMES
        ))
    })?;
    let mut presenter = Presenter::new(theme);
    let mut sink = TerminalPreview::new(cli.preview);
    let started = Instant::now();

    let summary = booth.run(&mut sink, controls.as_ref(), cli.cycles, |booth, report| {
        if let Some(reason) = report.switched {
            tracing::info!(
                at = ?report.timestamp,
                animation = booth.controller().current_name().unwrap_or("none"),
                %reason,
                "animation changed"
            );
        }
        if cli.preview {
            if booth.cycles() % 8 == 0 {
                let placed = presenter.present(&booth.status());
                print_status(&placed);
            }
            // Keep playback at audio speed while someone is watching.
            if let Some(ahead) = booth.now().checked_sub(started.elapsed()) {
                thread::sleep(ahead);
            }
        }
    });

    tracing::info!(
        cycles = summary.cycles,
        switches = summary.switches,
        shortfalls = summary.shortfalls,
        failed_transmits = summary.failed_transmits,
        stream_time = ?booth.now(),
        "booth stopped"
    );
    Ok(())
}

/// Reads single-letter commands from stdin on a background thread.
fn spawn_controls() -> Receiver<ControlCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "a" | "auto" => ControlCommand::SetAutoSwitch(true),
                "m" | "manual" => ControlCommand::SetAutoSwitch(false),
                "n" | "next" => ControlCommand::Advance,
                "r" | "reset" => ControlCommand::ResetToFirst,
                "" => continue,
                other => {
                    tracing::warn!(input = other, "unknown command, use a/m/n/r");
                    continue;
                }
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

/// Draws the strip as a row of true-colour blocks on stderr.
struct TerminalPreview {
    enabled: bool,
    line: String,
}

impl TerminalPreview {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            line: String::new(),
        }
    }
}

fn print_status(placed: &[Placed]) {
    let text: Vec<String> = placed.iter().map(|p| p.widget.to_string()).collect();
    let _ = writeln!(io::stderr(), "\x1b[2K\r{}", text.join(" | "));
}

impl FrameSink for TerminalPreview {
    fn transmit(&mut self, frame: &[Rgb]) -> dj_booth_core::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.line.clear();
        self.line.push('\r');
        for led in frame {
            self.line
                .push_str(&format!("\x1b[38;2;{};{};{}m█", led.r, led.g, led.b));
        }
        self.line.push_str("\x1b[0m");

        let mut err = io::stderr().lock();
        err.write_all(self.line.as_bytes())?;
        err.flush()?;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive DJ booth lighting controller", long_about = None)]
struct Cli {
    /// JSON configuration file. Missing fields fall back to defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Start with automatic switching disabled.
    #[arg(long, global = true)]
    manual: bool,

    /// Seed for animation selection and effect randomness.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Draw the LED strip and status line in the terminal, paced to real time.
    #[arg(long, global = true)]
    preview: bool,

    /// Stop after this many cycles.
    #[arg(long, global = true)]
    cycles: Option<u64>,

    /// Status screen colour theme.
    #[arg(long, global = true, default_value = "cyberpunk")]
    theme: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the booth from a WAV file, or raw s16le mono PCM on stdin with `-`.
    Play {
        input: String,
    },
    /// Drive the booth from a generated kick pattern.
    Simulate {
        #[arg(long, default_value_t = 128.0)]
        bpm: f32,
        /// Length of the generated signal; runs forever when omitted.
        #[arg(long)]
        seconds: Option<f32>,
    },
    /// Print the configured animation catalog.
    List,
}
