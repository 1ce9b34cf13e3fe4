pub mod assignment;
pub mod builder;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod moves;
pub mod ot_and_room_assignment;
pub mod search;
pub mod solution;
pub mod state;
pub mod surgery_assignment;
pub mod telemetry;
pub mod validator;

#[cfg(test)]
mod fixtures;

pub use error::{Error, Result};
