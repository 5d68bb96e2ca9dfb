use clap::{Parser, ValueEnum};
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::error::Error;
use std::path::{Path, PathBuf};

use midi_markov_gen::generator::checked_length;
use midi_markov_gen::midi::{self, RenderOptions};
use midi_markov_gen::state::{transpose, PitchClass};
use midi_markov_gen::{AbsorbingPolicy, Generator, MarkovChain, NoteState, StartPolicy, StopReason};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartOpt {
    /// First note of the training data
    First,
    /// Any known note, uniformly
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AbsorbingOpt {
    /// Stop early, the output may be shorter than --length
    Terminate,
    /// Pick a new start note and continue
    Restart,
    /// Continue with any known note, uniformly
    UniformRestart,
    /// Continue with a note weighted by how often it led somewhere in training
    FrequencyWeighted,
}

impl From<AbsorbingOpt> for AbsorbingPolicy {
    fn from(opt: AbsorbingOpt) -> Self {
        match opt {
            AbsorbingOpt::Terminate => AbsorbingPolicy::Terminate,
            AbsorbingOpt::Restart => AbsorbingPolicy::Restart,
            AbsorbingOpt::UniformRestart => AbsorbingPolicy::UniformRestart,
            AbsorbingOpt::FrequencyWeighted => AbsorbingPolicy::FrequencyWeighted,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "midi-markov-gen",
    version,
    about = "Markov chain MIDI generator trained on existing MIDI files"
)]
struct Cli {
    /// MIDI files or directories of MIDI files to train on
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Only use directory entries whose name contains this text (e.g. major, minor)
    #[arg(long)]
    filter: Option<String>,

    /// Output .mid path (if omitted, a timestamped name is generated)
    #[arg(short, long)]
    out: Option<String>,

    /// RNG seed (same seed and inputs => same MIDI)
    #[arg(long, default_value_t = 0xC0FFEEu64)]
    seed: u64,

    /// Number of notes and rests to generate
    #[arg(long, default_value_t = 128i64, allow_negative_numbers = true)]
    length: i64,

    /// Size the output in bars instead (32 states per bar, overrides --length)
    #[arg(long, conflicts_with = "length")]
    bars: Option<u32>,

    /// What to do on a note that never led anywhere in the training data
    #[arg(long, value_enum)]
    absorbing: AbsorbingOpt,

    /// How to pick the first note when --start is not given
    #[arg(long, value_enum, default_value_t = StartOpt::Random)]
    start_policy: StartOpt,

    /// Explicit first note as PITCH:TWELFTHS (e.g. C4:3, Bb3:12, rest:6)
    #[arg(long)]
    start: Option<NoteState>,

    /// Additive smoothing factor for transition counts (0 = off)
    #[arg(long, default_value_t = 0.0)]
    smoothing: f64,

    /// Key of the training material
    #[arg(long, default_value = "C")]
    source_key: PitchClass,

    /// Transpose the output into this key (e.g. C, F#, Bb)
    #[arg(long)]
    key: Option<PitchClass>,

    /// Tempo in BPM
    #[arg(long, default_value_t = 120u32)]
    bpm: u32,

    /// Ticks per quarter note (PPQN)
    #[arg(long, default_value_t = 480u16)]
    ppqn: u16,

    /// MIDI channel (0..15)
    #[arg(long, default_value_t = 0u8)]
    channel: u8,

    /// Program (0..127). 0 = Acoustic Grand Piano in General MIDI.
    #[arg(long, default_value_t = 0u8)]
    program: u8,
}

/// States generated per bar when sizing by --bars.
const STATES_PER_BAR: i64 = 32;

fn requested_length(length: i64, bars: Option<u32>) -> i64 {
    bars.map_or(length, |b| b as i64 * STATES_PER_BAR)
}

// Generate default output path if none provided
fn default_out_path(seed: u64) -> String {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    format!("out/markov_{ts}_{seed}.mid")
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let out_path = cli
        .out
        .clone()
        .unwrap_or_else(|| default_out_path(cli.seed));

    // Basic argument sanity
    if cli.channel > 15 {
        return Err("channel must be 0..15".into());
    }
    if cli.program > 127 {
        return Err("program must be 0..127".into());
    }
    let length = checked_length(requested_length(cli.length, cli.bars))?;

    let files = midi::collect_midi_files(&cli.inputs, cli.filter.as_deref())?;
    if files.is_empty() {
        return Err("no MIDI files found for the given inputs".into());
    }

    let mut training: Vec<NoteState> = Vec::new();
    for path in &files {
        let states = midi::load_states(path)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        info!("{}: {} states", path.display(), states.len());
        training.extend(states);
    }

    let chain = MarkovChain::build_smoothed(&training, cli.smoothing)?;
    info!(
        "Trained on {} states from {} file(s): {} distinct, {} transitions, {} absorbing",
        training.len(),
        files.len(),
        chain.len(),
        chain.matrix().total_transitions(),
        chain.matrix().absorbing_states().count()
    );

    let start = match (cli.start, cli.start_policy) {
        (Some(state), _) => StartPolicy::Explicit(state),
        (None, StartOpt::First) => StartPolicy::First,
        (None, StartOpt::Random) => StartPolicy::Random,
    };
    let generator = Generator::new(start, cli.absorbing.into());
    info!(
        "Generating {} states, start {:?}, absorbing policy {:?}, seed 0x{:X}",
        length,
        generator.start_policy(),
        generator.absorbing_policy(),
        cli.seed
    );

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let generated = generator.generate(&chain, length, &mut rng)?;
    if let Some(w) = generated.warning {
        warn!("{w}");
    }
    if generated.stop == StopReason::Absorbed {
        warn!(
            "Stopped early at an absorbing state: {} of {} states",
            generated.states.len(),
            length
        );
    }

    let shift = cli.key.map_or(0, |key| cli.source_key.interval_to(key));
    if shift != 0 {
        info!("Transposing by {shift} semitones");
    }
    let notes = transpose(&generated.states, shift);

    let opts = RenderOptions {
        bpm: cli.bpm,
        ppqn: cli.ppqn,
        channel: cli.channel,
        program: cli.program,
        ..RenderOptions::default()
    };
    let smf = midi::render(&notes, &opts);
    midi::save(&smf, Path::new(&out_path))?;
    info!("Wrote {}", out_path);
    Ok(())
}
