use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use harmony_core::constants::{FRAME_RATE, KEYBOARD_WIDTH, PRELOAD_INPUTS};
use harmony_core::pitch::midi_to_name;
use harmony_core::{
    parse_notes, AudioSink, GenerationMode, HarmonizeRequest, HarmonizeResponse, Harmonizer,
    HarmonyError, Offline, Studio, StudioParams, SystemClock, Waterfall,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Notes,
    Chords,
}

impl From<Mode> for GenerationMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Notes => GenerationMode::Notes,
            Mode::Chords => GenerationMode::Chords,
        }
    }
}

#[derive(Parser)]
#[command(name = "harmony")]
#[command(about = "Harmonize a phrase and play it against a text waterfall", long_about = None)]
struct Cli {
    /// Phrase text, e.g. "C4:2 D4:8 E4:4" or "Cmaj7 Am7 Dm7 G7"
    phrase: Option<String>,

    /// Read one phrase per line from stdin (":notes", ":chords", ":cache",
    /// ":clear-cache" and ":preload" are commands)
    #[arg(long)]
    stdin: bool,

    #[arg(short, long, value_enum, default_value = "notes")]
    mode: Mode,

    /// Seconds per duration unit
    #[arg(long, default_value = "0.125")]
    unit: f64,

    #[arg(long, default_value = "1.0")]
    temperature: f32,

    #[arg(long, default_value = "20")]
    k: u32,

    /// Seed for the simulated generator and live-note colours
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Give up on a phrase after this many frames
    #[arg(long, default_value = "3600")]
    frames: u64,

    /// Print the waterfall every N frames (0 = never)
    #[arg(long, default_value = "0")]
    render: u64,

    /// Replay this JSON service response instead of calling the service.
    /// Without it the service is treated as unreachable and the simulator
    /// stands in.
    #[arg(long)]
    response: Option<PathBuf>,

    /// Warm the cache with simulated results for a few common phrases
    #[arg(long)]
    preload: bool,

    /// Print the service request for the phrase as JSON and exit
    #[arg(long)]
    dump_request: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// Answers every request with one recorded response.
struct Replay {
    response: HarmonizeResponse,
}

impl Harmonizer for Replay {
    fn harmonize(&mut self, request: &HarmonizeRequest) -> harmony_core::Result<HarmonizeResponse> {
        if self.response.output.is_empty() {
            return Err(HarmonyError::Harmonizer("recorded response has no chords".into()));
        }
        log::info!("[native] replaying response for {} note(s)", request.melody.len());
        Ok(self.response.clone())
    }
}

/// Audio collaborator that writes every call to the log.
struct LogSink;

impl AudioSink for LogSink {
    fn trigger_attack(&mut self, note: &str) -> harmony_core::Result<()> {
        log::info!("[audio] attack {}", note);
        Ok(())
    }
    fn trigger_release(&mut self, note: &str) -> harmony_core::Result<()> {
        log::info!("[audio] release {}", note);
        Ok(())
    }
    fn trigger_attack_release(
        &mut self,
        note: &str,
        duration_sec: f64,
        at: f64,
        velocity: f32,
    ) -> harmony_core::Result<()> {
        log::debug!(
            "[audio] {} for {:.3}s at {:.3}s (vel {:.2})",
            note,
            duration_sec,
            at,
            velocity
        );
        Ok(())
    }
    fn release_all(&mut self) -> harmony_core::Result<()> {
        log::info!("[audio] release all");
        Ok(())
    }
}

const RENDER_COLUMNS: usize = 64;

fn shade(alpha: f32) -> char {
    if alpha > 0.66 {
        '#'
    } else if alpha > 0.33 {
        '+'
    } else {
        '.'
    }
}

/// One text row per key, highest pitch first.
fn render(waterfall: &Waterfall) -> String {
    let track = (waterfall.params.width - KEYBOARD_WIDTH).max(1.0);
    let col = |x: f32| -> usize {
        (((x - KEYBOARD_WIDTH) / track) * RENDER_COLUMNS as f32).clamp(0.0, RENDER_COLUMNS as f32)
            as usize
    };
    let mut out = String::new();
    for key in waterfall.layout().keys().iter().rev() {
        let mut row = vec![' '; RENDER_COLUMNS];
        for p in waterfall.particles().iter().filter(|p| p.pitch == key.midi) {
            let (from, to) = (col(p.head.x - p.extent), col(p.head.x));
            for cell in row.iter_mut().take(to).skip(from) {
                *cell = shade(p.alpha);
            }
        }
        let lit = waterfall
            .key_color(key.midi)
            .map(|c| c != key.idle_color())
            .unwrap_or(false);
        out.push_str(&format!(
            "{:>4} {}|{}\n",
            midi_to_name(key.midi),
            if lit { '*' } else if key.black { ':' } else { ' ' },
            row.into_iter().collect::<String>()
        ));
    }
    out
}

fn run_phrase(studio: &mut Studio<SystemClock>, text: &str, cli: &Cli) {
    studio.set_text(text);
    let frame = Duration::from_secs_f64(1.0 / FRAME_RATE);
    let mut started = false;
    for n in 0..cli.frames {
        studio.frame();
        started |= studio.performer().is_active();
        if cli.render > 0 && n % cli.render == 0 && started {
            print!("{}", render(studio.waterfall()));
            println!("{}", "-".repeat(RENDER_COLUMNS + 6));
        }
        let settled = started || studio.coordinator().has_failed() || studio.latest().is_none();
        if studio.is_idle() && settled {
            break;
        }
        thread::sleep(frame);
    }
    println!("{}", studio.status());
    if let Some(result) = studio.latest() {
        println!("  input:  {}", result.input.to_text());
        println!("  output: {}", result.output.to_text());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if cli.dump_request {
        let text = cli.phrase.as_deref().unwrap_or_default();
        let request = HarmonizeRequest::from_notes(&parse_notes(text), cli.temperature, cli.k);
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let primary: Box<dyn Harmonizer> = match &cli.response {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading response file {}", path.display()))?;
            let response: HarmonizeResponse = serde_json::from_str(&raw)
                .with_context(|| format!("parsing response file {}", path.display()))?;
            Box::new(Replay { response })
        }
        None => Box::new(Offline),
    };

    let params = StudioParams {
        base_unit_sec: cli.unit,
        temperature: cli.temperature,
        k: cli.k,
        seed: cli.seed,
        ..StudioParams::default()
    };
    let mut studio = Studio::new(SystemClock::default(), params, primary, Box::new(LogSink));
    studio.set_mode(cli.mode.into());
    if cli.preload {
        studio.preload(&PRELOAD_INPUTS);
    }
    log::info!("[native] harmony studio ready ({} mode)", studio.mode());

    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("reading stdin")?;
            match line.trim() {
                "" => continue,
                ":notes" => studio.set_mode(GenerationMode::Notes),
                ":chords" => studio.set_mode(GenerationMode::Chords),
                ":cache" => println!("{} cached result(s)", studio.cache_len()),
                ":clear-cache" => studio.clear_cache(),
                ":preload" => {
                    let added = studio.preload(&PRELOAD_INPUTS);
                    println!("{} result(s) preloaded", added);
                }
                text => run_phrase(&mut studio, text, &cli),
            }
        }
    } else if let Some(text) = cli.phrase.as_deref() {
        run_phrase(&mut studio, text, &cli);
    } else {
        anyhow::bail!("no phrase given (pass one as an argument or use --stdin)");
    }
    Ok(())
}
