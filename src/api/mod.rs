//! HTTP API exposing the analysis pipeline (feature `api`).

pub mod handlers;
pub mod models;
pub mod server;

pub use models::{AnalyzeRequest, ApiResponse};
pub use server::start_http_server;
