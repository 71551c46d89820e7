use super::RequestsLoggingLevel;
use std::path::PathBuf;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Served under `/uploads`.
    pub uploads_dir: PathBuf,
    /// Upper bound for request bodies, uploads included.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            uploads_dir: PathBuf::from("uploads"),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}
