use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "netconf-cli")]
#[command(about = "Command line client for the network configuration service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Reverse-proxy path prefix, e.g. /netconf
    #[arg(short, long, default_value = "")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show link status of every interface
    Status,
    /// Show the configuration of all interfaces, or of one
    Config {
        #[arg(short, long)]
        interface: Option<String>,
    },
    /// List configurable interfaces
    Interfaces,
    /// Apply a JSON configuration file
    Apply {
        file: PathBuf,
        /// Apply the file to a single interface
        #[arg(short, long)]
        interface: Option<String>,
    },
    /// Show service name, version and state
    Service,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!(
        "{}{}",
        cli.url.trim_end_matches('/'),
        cli.prefix.trim_end_matches('/')
    );

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/api/status", base)).send().await?,
        Commands::Config { interface: None } => {
            client.get(format!("{}/api/config", base)).send().await?
        }
        Commands::Config {
            interface: Some(device),
        } => {
            client
                .get(format!("{}/api/{}/config", base, device))
                .send()
                .await?
        }
        Commands::Interfaces => client.get(format!("{}/api/interfaces", base)).send().await?,
        Commands::Apply { file, interface } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let url = match interface {
                Some(device) => format!("{}/api/{}/config", base, device),
                None => format!("{}/api/config", base),
            };
            client.post(url).json(&body).send().await?
        }
        Commands::Service => client.get(format!("{}/api/service", base)).send().await?,
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
