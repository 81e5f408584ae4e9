use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let token = std::env::var("MOCK_TOKEN").unwrap_or_else(|_| mock_server::DEFAULT_TOKEN.to_string());
    let seeded = std::env::var("MOCK_WIDGETS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(25);

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, widgets = seeded, "mock server listening; discovery at /discover");
    mock_server::run(listener, mock_server::app_with(&token, mock_server::seed(seeded))).await
}
