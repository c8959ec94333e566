// Integrity Scan Core Services

pub mod text_processor;
pub mod similarity;
pub mod config_store;
pub mod providers;
pub mod detection;

pub use text_processor::*;
pub use similarity::similarity;
pub use config_store::*;
pub use providers::*;

pub use detection::{DetectionEngine, EngineBuilder, EngineError};
