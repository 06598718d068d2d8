//! gd-core: level generation core for Gloomdelve
//!
//! This crate contains the dungeon generator, the tactical cover engine,
//! and the monster patrol state machine. It is pure logic with no I/O
//! dependencies and is designed to be deterministic under a fixed seed.

pub mod cave;
pub mod cover;
pub mod data;
pub mod dungeon;
pub mod feature;
pub mod generator;
pub mod geom;
pub mod monster;
pub mod object;
pub mod patrol;
pub mod pursuit;

mod consts;
mod rng;

pub use cave::{Cave, CellFlags, Elevation, Sector};
pub use consts::*;
pub use feature::Feature;
pub use generator::{GenOptions, GenerationError, Generator, SpecialLevel};
pub use rng::{GameRng, RngMode};
