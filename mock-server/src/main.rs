use mock_server::{MockConfig, MockState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = MockConfig::default();
    if let Ok(id) = std::env::var("MOCK_CLIENT_ID") {
        config.client_id = id;
    }
    if let Ok(secret) = std::env::var("MOCK_CLIENT_SECRET") {
        config.client_secret = secret;
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock case-status API listening");
    mock_server::run_with_state(listener, std::sync::Arc::new(MockState::new(config))).await
}
