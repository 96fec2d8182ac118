//! Application state shared across handlers.

use std::sync::Arc;

use mailgram_pipeline::Pipeline;

use crate::config::ServerConfig;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The dispatch pipeline with its wired collaborators.
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Creates the shared state.
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
