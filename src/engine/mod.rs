mod builder;
mod lifecycle;
mod shutdown;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use builder::{Engine, EngineBuilder};
pub use types::EngineState;
