use std::f32::consts::TAU;
use std::io::BufRead;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rgb_effects_core::{
    lerp_color, AudioFrame, AudioSource, Controller, EffectError, MemorySink, PixelFrame,
    PixelSource, RAINBOW_COLORS,
};
use tracing_subscriber::EnvFilter;

fn main() -> rgb_effects_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => run_list(),
        Commands::Describe { effect, json } => run_describe(&effect, json),
        Commands::Run {
            effect,
            options,
            devices,
            duration,
        } => run_effect(&effect, options.as_deref(), devices, duration),
    }
}

fn build_controller(devices: usize) -> rgb_effects_core::Result<Controller> {
    let mut controller = Controller::new(Box::new(MemorySink::new(devices)))?;
    controller.connect()?;
    Ok(controller)
}

fn run_list() -> rgb_effects_core::Result<()> {
    let controller = build_controller(0)?;
    for name in controller.list_effects() {
        match controller.describe_effect(name) {
            Ok(info) => println!("{name} - {}", info.summary),
            Err(_) => println!("{name}"),
        }
    }
    Ok(())
}

fn run_describe(effect: &str, json: bool) -> rgb_effects_core::Result<()> {
    let controller = build_controller(0)?;
    let info = controller.describe_effect(effect)?;
    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => tracing::error!("could not render description: {err}"),
        }
        return Ok(());
    }
    println!("{} - {}", info.name, info.summary);
    for option in &info.options {
        println!(
            "  {} (default: {}, accepts: {})",
            option.name, option.default, option.accepted
        );
    }
    Ok(())
}

fn run_effect(
    effect: &str,
    options: Option<&str>,
    devices: usize,
    duration: Option<f32>,
) -> rgb_effects_core::Result<()> {
    let overrides = parse_overrides(options)?;
    let mut controller = build_controller(devices)?;
    // Synthetic capture sources so the audio and desktop effects are
    // demonstrable without real drivers.
    controller.set_audio_source(Box::new(SweepTone::new(44_100)));
    controller.set_pixel_source(Box::new(DriftingScreen::default()));

    // Stop cleanly on Enter, and optionally after a fixed duration, so the
    // effect's teardown always runs.
    let stop = controller.stop_handle();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_ok() {
            stop.stop();
        }
    });
    if let Some(seconds) = duration {
        let stop = controller.stop_handle();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
            stop.stop();
        });
    }

    println!("Running {effect} on {devices} virtual devices; press Enter to stop.");
    controller.run_effect(effect, &overrides)?;
    controller.disconnect()
}

/// Splits `key=value,key=value` into override pairs. Values may not contain
/// commas outside brackets; bracketed lists pass through unsplit.
fn parse_overrides(options: Option<&str>) -> rgb_effects_core::Result<Vec<(String, String)>> {
    let Some(options) = options else {
        return Ok(Vec::new());
    };
    let mut pairs = Vec::new();
    for chunk in split_top_level(options) {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            EffectError::InvalidValue {
                expected: "key=value pair",
                value: trimmed.to_string(),
            }
        })?;
        pairs.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(pairs)
}

/// Splits on commas that are not inside a bracketed list.
fn split_top_level(options: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    for ch in options.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => chunks.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    chunks.push(current);
    chunks
}

/// Sine generator whose frequency sweeps the audible range, loud enough to
/// trip the default peak threshold.
struct SweepTone {
    sample_rate: f32,
    phase: f32,
    elapsed: f32,
}

impl SweepTone {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            phase: 0.0,
            elapsed: 0.0,
        }
    }
}

impl AudioSource for SweepTone {
    fn read_frame(&mut self, sample_count: usize) -> rgb_effects_core::Result<Option<AudioFrame>> {
        let mut samples = Vec::with_capacity(sample_count);
        for _ in 0..sample_count {
            let frequency = 300.0 + 2700.0 * (0.5 + 0.5 * (TAU * 0.05 * self.elapsed).sin());
            self.phase = (self.phase + TAU * frequency / self.sample_rate) % TAU;
            self.elapsed += 1.0 / self.sample_rate;
            samples.push(self.phase.sin() * 0.6);
        }
        Ok(Some(AudioFrame::new(samples)))
    }
}

/// Screen stand-in drifting slowly through the rainbow.
#[derive(Default)]
struct DriftingScreen {
    step: usize,
}

impl PixelSource for DriftingScreen {
    fn capture_frame(&mut self) -> rgb_effects_core::Result<Option<PixelFrame>> {
        let index = (self.step / 16) % RAINBOW_COLORS.len();
        let next = (index + 1) % RAINBOW_COLORS.len();
        let t = (self.step % 16) as f32 / 16.0;
        let color = lerp_color(RAINBOW_COLORS[index], RAINBOW_COLORS[next], t);
        self.step += 1;
        Ok(Some(PixelFrame::new(8, 8, vec![color; 64])))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "RGB lighting effects controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available effects.
    List,
    /// Show an effect's options, defaults and accepted formats.
    Describe {
        /// Effect name as printed by `list`.
        effect: String,
        /// Render the description as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run an effect against the in-memory demo sink.
    Run {
        /// Effect name as printed by `list`.
        effect: String,
        /// Comma-separated overrides, e.g. `color=#00FF00,max_brightness=50%`.
        #[arg(short, long)]
        options: Option<String>,
        /// Number of virtual devices to drive.
        #[arg(short, long, default_value_t = 4)]
        devices: usize,
        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<f32>,
    },
}
