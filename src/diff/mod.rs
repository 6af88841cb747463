//! Structural differs: character, binary, and line level.

pub mod bytes;
pub mod chars;
pub mod lines;
