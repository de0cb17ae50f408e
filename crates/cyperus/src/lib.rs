//! cyperus - launcher and preset compiler for the cyperus audio engine

pub mod commands;
pub mod supervisor;
pub mod telemetry;

pub use supervisor::{Supervisor, SupervisorError, Unit, UnitExit, UnitOutcome};
