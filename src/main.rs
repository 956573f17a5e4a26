use log::error;
use tokio::sync::broadcast;

use v20_bridge::options::Options;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Options::new();

    // Create a channel for shutdown signaling
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl+C
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        if let Err(e) = shutdown_tx.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    if let Err(e) = v20_bridge::app(shutdown_rx, options).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
