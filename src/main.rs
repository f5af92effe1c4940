use role_chat::config::RelayConfig;
use role_chat::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("[SERVER] {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(config).await {
        tracing::error!("[SERVER] {}", e);
        std::process::exit(1);
    }
}
