//! Match Service Library
//!
//! Background side of the job annotator: keeps the session (API token and
//! active résumé), answers page messages over a Unix socket and calls the
//! scoring API on their behalf.

pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod payload;
pub mod server;
pub mod session;

pub use api::{ApiClient, ApiError, MatchApi};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use handler::Handler;
pub use payload::{ServiceMessage, ServiceResponse};
pub use server::MatchServer;
pub use session::Session;
