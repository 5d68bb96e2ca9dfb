// MIDI Markov Generator
//
// Learns a first-order Markov chain from the notes of existing MIDI files and
// samples new note sequences from it.
//
// Layout:
// - state.rs: NoteState (pitch or rest + quantized duration), key parsing
// - dictionary.rs: distinct states -> dense indices, first-seen order
// - matrix.rs: sparse transition probabilities, optional additive smoothing
// - chain.rs: trained chain (dictionary + matrix), degenerate-chain warnings
// - generator.rs: weighted sampling with start and absorbing-state policies
// - midi.rs: note extraction from SMF files and single-track rendering
// - error.rs: ChainError / ChainWarning
//
// The chain is generic over any `Clone + Eq + Hash` state and never looks
// inside it; only midi.rs knows about ticks and channels. Generation takes the
// RNG as an argument, so a fixed seed gives the same output.

pub mod chain;
pub mod dictionary;
pub mod error;
pub mod generator;
pub mod matrix;
pub mod midi;
pub mod state;

pub use chain::MarkovChain;
pub use error::{ChainError, ChainWarning};
pub use generator::{generate, AbsorbingPolicy, Generated, Generator, StartPolicy, StopReason};
pub use state::NoteState;
