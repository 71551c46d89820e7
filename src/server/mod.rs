pub mod config;
mod http_layers;
pub mod metrics;
mod pipeline_routes;
pub mod server;
pub(self) mod session;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use session::{Session, HEADER_USER_ID, HEADER_USER_PLAN};
