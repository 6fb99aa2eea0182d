//! CLI module for fairdice

pub mod app;
pub mod commands;

pub use app::{roll, roll_local, DiceNode};
pub use commands::{Cli, Commands};
