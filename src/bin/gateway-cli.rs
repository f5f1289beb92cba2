use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use stream_gateway::config::{load_config, ConfigError};
use stream_gateway::routing::RouteTable;
use stream_gateway::resilience::FallbackRegistry;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the stream gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List the live route table in match order
    Routes,
    /// Validate a gateway config file without starting anything
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = match cli.command {
        Commands::Status => "/admin/status",
        Commands::Routes => "/admin/routes",
        Commands::Validate { file } => return validate(&file),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = reqwest::Client::new()
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

fn validate(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match load_config(file) {
        Ok(config) => {
            let table = RouteTable::from_config(&config.routes, &FallbackRegistry::new())
                .map_err(ConfigError::Validation)?;
            println!("{}: ok", file.display());
            for route in table.routes() {
                println!("  {:<16} -> {}", route.id(), route.upstream());
            }
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            eprintln!("{}: {} problem(s)", file.display(), errors.len());
            for error in &errors {
                eprintln!("  {}", error);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
