use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use payload_gateway::security::{PatternSet, Scanner};

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the payload gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Scan a JSON file locally with the baseline registry
    Scan {
        /// Path to a JSON document
        file: PathBuf,
        /// Maximum recursion depth
        #[arg(long, default_value_t = 10)]
        max_depth: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let client = reqwest::Client::new();
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
            );

            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Scan { file, max_depth } => {
            let content = std::fs::read_to_string(&file)?;
            let value: Value = serde_json::from_str(&content)?;

            let scanner = Scanner::new(Arc::new(PatternSet::baseline()), max_depth);
            let result = scanner.scan(&value);

            if result.is_safe {
                println!("SAFE: no dangerous patterns found");
            } else {
                println!("UNSAFE");
                if let Some(reason) = &result.reason {
                    println!("  reason: {reason}");
                }
                for key in &result.dangerous_keys {
                    println!("  dangerous key: {key}");
                }
                for value in &result.dangerous_values {
                    println!("  dangerous value: {value}");
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await?;
    println!("{} {}", status, serde_json::to_string_pretty(&body)?);
    Ok(())
}
