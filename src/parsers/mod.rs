// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Streaming parsers for annotated variant files
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod nirvana;

pub use nirvana::{open_positions, DecodeError, PositionReader};
