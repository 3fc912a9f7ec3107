//! Init command handler.

use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;
use crate::di::FromRef;
use crate::services::KnowledgeGraphManager;

use super::App;

impl App {
    /// Connect to the backend (creating the AGE graph if needed) and set up
    /// the vector index.
    pub async fn run_init(&self) -> Result<()> {
        let config = Config::load()?;
        tracing::info!(backend = %config.backend.describe(), "Initializing graph store");

        let ctx = Context::connect(&config).await?;
        let manager = KnowledgeGraphManager::from_ref(&ctx);

        if manager.initialize().await {
            tracing::info!(index = %config.memory.vector_index, "Vector index ready");
        } else {
            tracing::info!("No vector index created, search will use name matching");
        }

        tracing::info!("Initialization complete");
        Ok(())
    }
}
