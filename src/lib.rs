//! JinglePress Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod error;
pub mod finalize;
pub mod library;
pub mod media;
pub mod overlay;
pub mod pipeline;
pub mod quota;
pub mod server;
pub mod source;
pub mod staging;
pub mod tagging;

// Re-export commonly used types for convenience
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineDeps};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
