use clap::{Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;

use crate::clients::twitter::ops;
use crate::clients::TwitterWeb;
use crate::core::Params;
use crate::infra::config::{Config, UpstreamConfig};
use crate::session::{CredentialPair, SessionCache};
use crate::tools::catalog;

#[derive(Parser)]
#[command(name = "twitter-mcp-gateway")]
#[command(about = "Twitter MCP Gateway - server and admin CLI")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway (the default)
    Serve,
    /// Health check the service
    Health {
        /// Service URL to check
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Validate configuration
    Config {
        /// Validate config without starting service
        #[arg(long)]
        validate: bool,
    },
    /// Show service status and configuration
    Status {
        /// Service URL to check
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Authenticate a cookie pair against the upstream and print the account
    TestAuth {
        #[arg(long)]
        ct0: String,
        #[arg(long)]
        auth_token: String,
        /// Upstream base URL; defaults to the configured one
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print the tool catalog as JSON
    Tools,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    run_commands(cli.command.unwrap_or(Commands::Serve)).await
}

pub async fn run_commands(command: Commands) -> ExitCode {
    match command {
        Commands::Serve => match crate::infra::boot::run_server().await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "gateway stopped");
                eprintln!("❌ Gateway failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Health { url } => match health_check(&url).await {
            Ok(_) => {
                println!("✅ Service is healthy");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Health check failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Config { validate: _ } => match validate_config() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Configuration validation failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Status { url } => match show_status(&url).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("❌ Status check failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::TestAuth {
            ct0,
            auth_token,
            base_url,
        } => match test_auth(CredentialPair::new(ct0, auth_token), base_url).await {
            Ok(_) => {
                println!("✅ Authentication succeeded");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Authentication failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Tools => match print_tools() {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("❌ Cannot render tools: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn health_check(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/healthz", url))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("HTTP {}", response.status())
    }
}

fn validate_config() -> anyhow::Result<Config> {
    Ok(Config::from_env()?)
}

async fn show_status(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    let health_response = client
        .get(format!("{}/healthz", url))
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await?;

    println!(
        "🏥 Health Status: {}",
        if health_response.status().is_success() {
            "✅ Healthy"
        } else {
            "❌ Unhealthy"
        }
    );

    // A bare initialize is enough to tell whether the MCP endpoint answers.
    let mcp_response = client
        .post(format!("{}/mcp", url))
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream")
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "twitter-mcp-gateway-cli", "version": env!("CARGO_PKG_VERSION")}
            }
        }))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await;

    match mcp_response {
        Ok(resp) if resp.status().is_success() => {
            println!("🔧 MCP: ✅ Available");
        }
        Ok(resp) => {
            println!("🔧 MCP: ❌ HTTP {}", resp.status());
        }
        Err(_) => {
            println!("🔧 MCP: ❌ Unavailable");
        }
    }

    println!("\n📋 Configuration:");
    match Config::from_env() {
        Ok(cfg) => {
            println!("  Mode: {}", cfg.mode);
            println!("  Port: {}", cfg.port);
            println!("  Upstream: {}", cfg.upstream.base_url);
            match cfg.session.idle_timeout {
                Some(t) => println!("  Session idle timeout: {}s", t.as_secs()),
                None => println!("  Session idle timeout: none"),
            }
            println!(
                "  Environment credentials: {}",
                match (&cfg.credentials.environment, cfg.credentials.allow_environment_fallback) {
                    (Some(_), true) => "configured, used as fallback",
                    (Some(_), false) => "configured, resources only",
                    (None, _) => "not configured",
                }
            );
        }
        Err(e) => println!("  ❌ {}", e),
    }
    println!(
        "  Log Level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    );

    Ok(())
}

async fn test_auth(creds: CredentialPair, base_url: Option<String>) -> anyhow::Result<()> {
    let mut upstream = Config::from_env()
        .map(|c| c.upstream)
        .unwrap_or_else(|_| UpstreamConfig::default());
    if let Some(base) = base_url {
        upstream.base_url = base;
    }

    let cache = SessionCache::new(TwitterWeb::from_config(&upstream)?);
    let profile = cache.invoke(&creds, ops::WHOAMI, &Params::new()).await?;

    println!("🔑 Session {}", creds.fingerprint().short());
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn print_tools() -> anyhow::Result<()> {
    let required = Config::from_env()
        .map(|c| !c.credentials.allow_environment_fallback)
        .unwrap_or(true);
    println!("{}", serde_json::to_string_pretty(&catalog::describe(required))?);
    Ok(())
}
