use swapgraph_api::{config::ServerConfig, server::Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    swapgraph_api::telemetry::init();

    let config = ServerConfig::from_env();
    let server = Server::new(config).await?;
    server.start().await?;
    Ok(())
}
