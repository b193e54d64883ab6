pub mod config;
pub mod logging;

// Job engine: store → scheduler → transfer executor.
pub mod capacity;
pub mod destinations;
pub mod error;
pub mod job_log;
pub mod job_store;
pub mod progress;
pub mod scheduler;
pub mod transfer;
pub mod url_model;

pub use error::EngineError;
