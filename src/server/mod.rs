//! Ephemeral instances of the API under test.

mod config;
mod manager;
mod probe;

pub use config::{ServerCommand, ServerManagerConfig};
pub use manager::{ServerHandle, ServerManager, StopOutcome};
