// Musical states fed to the chain.
//
// A NoteState is a pitch (or a rest) plus a duration quantized to twelfths of
// a beat, which holds both the 16th grid (3 twelfths) and the 16th-triplet
// grid (2 twelfths) exactly, so states hash and compare without float issues.
// The chain itself never looks inside a NoteState.

use std::fmt;
use std::str::FromStr;

/// Duration units per quarter-note beat.
pub const TWELFTHS_PER_BEAT: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteState {
    /// MIDI key number, `None` for a rest.
    pub pitch: Option<u8>,
    /// Duration in twelfths of a beat.
    pub twelfths: u32,
}

impl NoteState {
    pub fn note(pitch: u8, twelfths: u32) -> Self {
        NoteState {
            pitch: Some(pitch),
            twelfths,
        }
    }

    pub fn rest(twelfths: u32) -> Self {
        NoteState {
            pitch: None,
            twelfths,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn beats(&self) -> f64 {
        self.twelfths as f64 / TWELFTHS_PER_BEAT as f64
    }

    /// Length in MIDI ticks at the given resolution.
    pub fn ticks(&self, ppqn: u16) -> u64 {
        self.twelfths as u64 * ppqn as u64 / TWELFTHS_PER_BEAT as u64
    }

    /// Shift by `semitones`, clamped to the MIDI range. Rests are unchanged.
    pub fn transposed(self, semitones: i32) -> Self {
        NoteState {
            pitch: self
                .pitch
                .map(|p| (p as i32 + semitones).clamp(0, 127) as u8),
            ..self
        }
    }
}

/// Written as `C4:3` or `rest:6` (pitch, then duration in twelfths).
impl fmt::Display for NoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pitch {
            Some(p) => write!(f, "{}:{}", note_to_string(p), self.twelfths),
            None => write!(f, "rest:{}", self.twelfths),
        }
    }
}

impl FromStr for NoteState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (pitch, dur) = input
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected PITCH:TWELFTHS, got {input:?}"))?;

        let twelfths: u32 = dur
            .trim()
            .parse()
            .map_err(|_| format!("bad duration: {dur}"))?;
        if twelfths == 0 {
            return Err("duration must be at least one twelfth of a beat".into());
        }

        let pitch = pitch.trim();
        if pitch.eq_ignore_ascii_case("rest") || pitch.eq_ignore_ascii_case("r") {
            return Ok(NoteState::rest(twelfths));
        }
        Ok(NoteState::note(parse_spn(pitch)?, twelfths))
    }
}

/// A pitch class without octave, used to name keys (`C`, `F#`, `Bb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Smallest shift from `self` to `target`, folded into -6..=5.
    pub fn interval_to(self, target: PitchClass) -> i32 {
        let d = (target.0 as i32 - self.0 as i32).rem_euclid(12);
        if d > 5 {
            d - 12
        } else {
            d
        }
    }
}

impl FromStr for PitchClass {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (pc, rest) = parse_letter_and_accidental(input.trim())?;
        if !rest.trim().is_empty() {
            return Err(format!("unexpected trailing text in key: {rest}"));
        }
        Ok(PitchClass(pc.rem_euclid(12) as u8))
    }
}

/// Transpose a whole sequence; rests pass through.
pub fn transpose(states: &[NoteState], semitones: i32) -> Vec<NoteState> {
    states.iter().map(|s| s.transposed(semitones)).collect()
}

/// Parse scientific pitch notation (C4 = 60).
fn parse_spn(input: &str) -> Result<u8, String> {
    let (pc, octave_str) = parse_letter_and_accidental(input)?;

    let octave_str = octave_str.trim();
    if octave_str.is_empty() {
        return Err("missing octave, expected like C#4".into());
    }

    let octave: i32 = octave_str
        .parse()
        .map_err(|_| format!("bad octave: {octave_str}"))?;

    let midi: i32 = (octave + 1) * 12 + pc;

    if !(0..=127).contains(&midi) {
        return Err(format!("note out of MIDI range 0..127: {midi}"));
    }

    Ok(midi as u8)
}

/// Returns the pitch class offset (may be -1 for Cb) and the unparsed tail.
fn parse_letter_and_accidental(s: &str) -> Result<(i32, &str), String> {
    if s.is_empty() {
        return Err("empty note".into());
    }

    let mut it = s.chars();

    let letter = it.next().ok_or_else(|| "empty note".to_string())?;
    let base_pc: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(format!("bad note letter: {letter}")),
    };

    let mut pc = base_pc;
    let mut tail = it.as_str();

    if let Some(acc) = it.clone().next() {
        match acc {
            '#' | '♯' => {
                pc += 1;
                it.next();
                tail = it.as_str();
            }
            'b' | '♭' => {
                pc -= 1;
                it.next();
                tail = it.as_str();
            }
            _ => {}
        }
    }

    Ok((pc, tail))
}

pub fn note_to_string(pitch: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (pitch / 12) as i32 - 1;
    let note = note_names[(pitch % 12) as usize];
    format!("{}{}", note, octave)
}
