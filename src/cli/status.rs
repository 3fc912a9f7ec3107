//! Status and schema command handlers.

use color_eyre::Result;

use crate::config::Config;
use crate::context::Context;
use crate::di::FromRef;
use crate::graph::BackendStatus;
use crate::services::KnowledgeGraphManager;

use super::App;

impl App {
    async fn manager(&self) -> Result<KnowledgeGraphManager> {
        let config = Config::load()?;
        let ctx = Context::connect(&config).await?;
        Ok(KnowledgeGraphManager::from_ref(&ctx))
    }

    /// Print backend status as JSON; fails if the backend is unreachable.
    pub async fn run_status(&self) -> Result<()> {
        let status = self.manager().await?.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);

        if status.status == BackendStatus::Unavailable {
            color_eyre::eyre::bail!("backend '{}' is unavailable", status.backend);
        }
        Ok(())
    }

    pub async fn run_schema(&self) -> Result<()> {
        let schema = self.manager().await?.schema().await?;
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
