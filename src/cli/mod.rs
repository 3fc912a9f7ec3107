//! CLI module for memograph.
//!
//! Subcommands:
//! - `mcp`: Run the MCP server (stdio transport)
//! - `init`: Prepare the graph store and vector index
//! - `status`: Check backend connectivity
//! - `schema`: Print the observed graph schema

mod init;
mod mcp;
mod status;

use clap::{Parser, Subcommand};

/// memograph - knowledge graph memory
#[derive(Parser)]
#[command(name = "memograph")]
#[command(about = "Knowledge graph memory - MCP server for entities, relations and observations")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the MCP server (stdio transport)
    Mcp,

    /// Create the graph (AGE) and the vector index if supported
    Init,

    /// Check backend connectivity and search mode
    Status,

    /// Print node labels, relationship types and property keys as JSON
    Schema,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Mcp => self.run_mcp().await,
            Command::Init => self.run_init().await,
            Command::Status => self.run_status().await,
            Command::Schema => self.run_schema().await,
        }
    }
}
