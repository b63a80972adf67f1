//! Frame-directory analysis worker.
//!
//! This crate provides:
//! - A frame provider over a directory of decoded stills
//! - Environment and argument configuration
//! - Tracing and Prometheus setup for the binary

pub mod config;
pub mod error;
pub mod frames;
pub mod logging;
pub mod runner;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use frames::DirectoryFrameProvider;
pub use runner::analyze_directory;
