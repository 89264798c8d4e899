//! Semantic interpretation of raw C64 hardware state.
//!
//! Everything here is a pure, stateless transform over byte buffers the
//! monitor client hands back: screen RAM to text, the VIC-II register
//! file to a structured view, sprite data to pixels, and machine code to
//! assembly listings. No I/O, no protocol knowledge.

pub mod disasm;
pub mod error;
pub mod petscii;
pub mod sprite;
pub mod vic;

pub use error::DecodeError;
