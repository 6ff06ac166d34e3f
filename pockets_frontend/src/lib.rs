//! Client core for the pockets photo-sharing front end: REST access, the
//! upload-then-claim pipeline, query caching, voice notes and the UI state a
//! renderer draws from.

pub mod api;
pub mod app;
pub mod audio;
pub mod backend;
pub mod cache;
pub mod config;
pub mod dropdown;
pub mod error;
pub mod local_store;
pub mod media;
pub mod models;
pub mod requests;
pub mod session;
pub mod single_flight;
pub mod telemetry;
pub mod upload;

#[cfg(test)]
mod testing;

pub use api::ApiClient;
pub use app::PocketsApp;
pub use backend::PocketsBackend;
pub use config::FrontendConfig;
pub use error::{ApiError, ClaimError, RecorderError, UploadError};
pub use session::Session;
pub use telemetry::init_tracing;
