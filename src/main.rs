use std::process::ExitCode;

use twitter_mcp_gateway::{cli, infra::logging};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    cli::run().await
}
