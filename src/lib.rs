//! clubgate: scoped public-access API for the club attendance links.
//!
//! Library crate shared by the `clubgate` binary and the integration tests in `tests/`.

use std::sync::Arc;

pub mod admin;
pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;

use store::Store;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: config::Config) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}
