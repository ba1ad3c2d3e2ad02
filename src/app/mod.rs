mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::{Devices, LapsecamOrchestrator};
pub use types::{ComponentState, ShutdownReason};
