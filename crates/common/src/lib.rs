//! Small helpers shared across the relay crates.

pub mod secret;
