use std::process;

use tracing::error;

use crimson::server::{Config, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let config = match Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "invalid command line arguments");
            process::exit(1);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(error) => {
            error!(%error, "failed to start");
            process::exit(1);
        }
    };

    if let Err(error) = server.run().await {
        error!(%error, "server terminated");
        process::exit(1);
    }
}
