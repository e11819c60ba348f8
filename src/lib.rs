pub mod agent;
pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod render;
pub mod server;
pub mod session;

use agent::TrustAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("History Store Type: {}", args.history_type);
    info!("History Store Host: {}", args.history_host);
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("System Prompt: {}", args.system_prompt_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", args.tls_paths().is_some());
    info!("-------------------------");

    let agent = Arc::new(TrustAgent::new(args.clone()).await?);
    let server = Server::new(args.server_addr.clone(), agent, args);
    server.run().await?;

    Ok(())
}
