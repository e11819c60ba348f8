pub mod api;

use crate::agent::TrustAgent;
use crate::cli::Args;
use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    addr: String,
    agent: Arc<TrustAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<TrustAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(api::AppState {
            agent: self.agent.clone(),
            request_timeout: Duration::from_secs(self.args.request_timeout_secs),
        });

        if let Some((cert_path, key_path)) = self.args.tls_paths() {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;
            info!("Starting HTTPS API server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Starting HTTP API server on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
