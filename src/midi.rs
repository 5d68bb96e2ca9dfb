// MIDI input and output around the chain.
//
// Input: notes from every track of a Standard MIDI File, ordered by start
// tick, each turned into a NoteState. Durations (and gaps longer than a 16th,
// which become rests) are quantized to whichever of the 16th grid or the
// 16th-triplet grid is nearer.
//
// Output: a format 0 (single track) file, one note after another, rests
// advancing time.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use midly::num::u28;
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use thiserror::Error;

use crate::state::NoteState;

/// Shortest duration a state can have: one 16th-note triplet.
const MIN_TWELFTHS: u32 = 2;

/// Largest delta time a track event can carry (28-bit variable length).
const MAX_DELTA: u64 = 0x0FFF_FFFF;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("Timecode-based MIDI timing is not supported")]
    UnsupportedTiming,

    #[error("No notes found")]
    NoNotes,
}

/// Output settings for [`render`].
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub bpm: u32,
    pub ppqn: u16,
    pub channel: u8,
    pub program: u8,
    pub velocity: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            bpm: 120,
            ppqn: 480,
            channel: 0,
            program: 0,
            velocity: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TimedNote {
    start: u64,
    end: u64,
    pitch: u8,
}

pub fn load(path: &Path) -> Result<Vec<u8>, MidiError> {
    Ok(fs::read(path)?)
}

pub fn parse(bytes: &[u8]) -> Result<Smf<'_>, MidiError> {
    Ok(Smf::parse(bytes)?)
}

/// Read a file and extract its training states.
pub fn load_states(path: &Path) -> Result<Vec<NoteState>, MidiError> {
    let bytes = load(path)?;
    let smf = parse(&bytes)?;
    extract_states(&smf)
}

pub fn extract_states(smf: &Smf) -> Result<Vec<NoteState>, MidiError> {
    let ppqn = match smf.header.timing {
        Timing::Metrical(t) if t.as_int() > 0 => t.as_int(),
        _ => return Err(MidiError::UnsupportedTiming),
    };

    let mut notes = collect_notes(smf);
    if notes.is_empty() {
        return Err(MidiError::NoNotes);
    }
    notes.sort_by_key(|n| (n.start, n.pitch));

    let rest_threshold = ppqn as u64 / 4;
    let mut states = Vec::with_capacity(notes.len());
    let mut last_end = 0u64;
    for note in notes {
        if note.start > last_end && note.start - last_end > rest_threshold {
            let gap = ticks_to_beats(note.start - last_end, ppqn);
            states.push(NoteState::rest(quantize_beats(gap)));
        }
        let beats = ticks_to_beats(note.end - note.start, ppqn);
        states.push(NoteState::note(note.pitch, quantize_beats(beats)));
        last_end = last_end.max(note.end);
    }

    log::debug!("extracted {} states at {} ppqn", states.len(), ppqn);
    Ok(states)
}

/// Pair note-ons with their note-offs (or zero-velocity note-ons), per track
/// and channel.
fn collect_notes(smf: &Smf) -> Vec<TimedNote> {
    let mut notes = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        let mut open: HashMap<(u8, u8), u64> = HashMap::new();
        for event in track {
            tick += event.delta.as_int() as u64;
            let TrackEventKind::Midi { channel, message } = event.kind else {
                continue;
            };
            let (key, sounding) = match message {
                MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int() > 0),
                MidiMessage::NoteOff { key, .. } => (key.as_int(), false),
                _ => continue,
            };
            let slot = (channel.as_int(), key);
            if sounding {
                open.insert(slot, tick);
            } else if let Some(start) = open.remove(&slot) {
                notes.push(TimedNote {
                    start,
                    end: tick,
                    pitch: key,
                });
            }
        }
    }
    notes
}

fn ticks_to_beats(ticks: u64, ppqn: u16) -> f64 {
    ticks as f64 / ppqn as f64
}

/// Snap a duration in beats to the nearer of the 16th and 16th-triplet grids,
/// in twelfths of a beat.
pub fn quantize_beats(beats: f64) -> u32 {
    let sixteenths = beats * 4.0;
    let triplets = beats * 6.0;
    let sixteenth_distance = (sixteenths.round() - sixteenths).abs();
    let triplet_distance = (triplets.round() - triplets).abs();
    let twelfths = if sixteenth_distance < triplet_distance {
        sixteenths.round() * 3.0
    } else {
        triplets.round() * 2.0
    };
    (twelfths as u32).max(MIN_TWELFTHS)
}

fn bpm_to_us_per_quarter(bpm: u32) -> u32 {
    // 60_000_000 microseconds per minute / bpm
    60_000_000u32 / bpm.max(1)
}

/// Delta time between two absolute ticks, saturated to what SMF can encode.
fn delta_ticks(from: u64, to: u64) -> u28 {
    u28::new(to.saturating_sub(from).min(MAX_DELTA) as u32)
}

/// Order of events sharing a tick: setup first, then note-offs before note-ons.
fn event_order_key(kind: &TrackEventKind) -> u8 {
    match kind {
        TrackEventKind::Meta(_) => 0,
        TrackEventKind::Midi { message, .. } => match message {
            MidiMessage::NoteOff { .. } => 2,
            MidiMessage::NoteOn { .. } => 3,
            _ => 1,
        },
        TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => 4,
    }
}

/// Lay states end to end on a single track.
pub fn render(states: &[NoteState], opts: &RenderOptions) -> Smf<'static> {
    let mut abs_events: Vec<(u64, TrackEventKind<'static>)> = Vec::new();

    abs_events.push((
        0,
        TrackEventKind::Meta(MetaMessage::Tempo(bpm_to_us_per_quarter(opts.bpm).into())),
    ));

    abs_events.push((
        0,
        TrackEventKind::Midi {
            channel: opts.channel.into(),
            message: MidiMessage::ProgramChange {
                program: opts.program.into(),
            },
        },
    ));

    let mut t0: u64 = 0;
    for state in states {
        let t1 = t0.saturating_add(state.ticks(opts.ppqn));
        if let Some(pitch) = state.pitch {
            abs_events.push((
                t0,
                TrackEventKind::Midi {
                    channel: opts.channel.into(),
                    message: MidiMessage::NoteOn {
                        key: pitch.into(),
                        vel: opts.velocity.into(),
                    },
                },
            ));
            abs_events.push((
                t1,
                TrackEventKind::Midi {
                    channel: opts.channel.into(),
                    message: MidiMessage::NoteOff {
                        key: pitch.into(),
                        vel: 0.into(),
                    },
                },
            ));
        }
        t0 = t1;
    }

    abs_events.sort_by(|(ta, ea), (tb, eb)| {
        ta.cmp(tb)
            .then_with(|| event_order_key(ea).cmp(&event_order_key(eb)))
    });

    let mut track: Vec<TrackEvent<'static>> = Vec::new();
    let mut last_tick: u64 = 0;
    for (tick, kind) in abs_events {
        track.push(TrackEvent {
            delta: delta_ticks(last_tick, tick),
            kind,
        });
        last_tick = tick;
    }

    // End-of-track must be last; it also carries any trailing rest.
    track.push(TrackEvent {
        delta: delta_ticks(last_tick, t0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header::new(Format::SingleTrack, Timing::Metrical(opts.ppqn.into()));
    Smf {
        header,
        tracks: vec![track],
    }
}

pub fn save(smf: &Smf, path: &Path) -> Result<(), MidiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    smf.save(path)?;
    Ok(())
}

fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}

/// Expand `inputs` into a sorted list of MIDI files.
///
/// Directories are listed one level deep and their entries kept only when the
/// file name contains `filter` (case-insensitive). Files named directly are
/// always kept.
pub fn collect_midi_files(
    inputs: &[PathBuf],
    filter: Option<&str>,
) -> Result<Vec<PathBuf>, MidiError> {
    let filter = filter.map(str::to_lowercase);
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if !path.is_file() || !is_midi_file(&path) {
                    continue;
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                match filter.as_deref() {
                    Some(f) if !name.contains(f) => {}
                    _ => files.push(path),
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
