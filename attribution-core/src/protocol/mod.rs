pub mod attribution;
pub mod basics;
pub mod boolean;
pub mod engine;
pub mod prss;

pub use engine::{EagerEngine, EngineKind, EngineSetup, LazyEngine, PlaintextEngine, SecureEngine};
