use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "batch-cli")]
#[command(about = "Command-line client for the batch dispatch service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a batch from a JSON file
    Submit {
        /// Path to the batch JSON file
        file: PathBuf,
    },
    /// Show pool load and circuit breaker states
    Status,
    /// Check service liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Submit { file } => {
            let content = std::fs::read_to_string(&file)?;
            let batch: Value = serde_json::from_str(&content)?;
            let res = client
                .post(format!("{}/api/v1/bulk-transactions", base))
                .json(&batch)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) if status.is_success() => println!("{}", serde_json::to_string_pretty(&json)?),
        Ok(json) => eprintln!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if status.is_success() => println!("{}", text),
        Err(_) => eprintln!("Response: {}", text),
    }
    Ok(())
}
