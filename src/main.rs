use relay::{config::RelayConfig, init_relay, init_tracing};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize tracing
    init_tracing();

    // Config file is optional; defaults plus environment cover the
    // single-secret deployment case
    let config = match env::args().nth(1) {
        Some(path) => match RelayConfig::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {}", path, e);
                eprintln!("Usage: relay [config_file]");
                process::exit(1);
            }
        },
        None => RelayConfig::from_env(),
    };

    // Start the relay
    if let Err(e) = init_relay(config).await {
        eprintln!("Relay error: {}", e);
        process::exit(1);
    }
}
