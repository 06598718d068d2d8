//! Dungeon generation.
//!
//! The director drives a fixed pass order: background fill, sector pass,
//! room pass, tunnels, streamers, destruction, stairs, allocation,
//! feature pass, monster pass, cover pass. Everything mutates the
//! [`crate::generator::Generator`] context; the scratch bookkeeping for
//! one generation lives in [`dun::DunState`].

pub mod director;
pub mod dun;
pub mod plasma;
pub mod primitives;
pub mod rooms;
pub mod sanctum;
pub mod sectors;
pub mod tunnel;
pub mod vault;

pub use dun::DunState;
