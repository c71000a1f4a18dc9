use std::path::PathBuf;

use clap::{Parser, Subcommand};
use webgrapple::config::load_services;
use webgrapple::registry::ServiceId;
use webgrapple::rpc::{ServiceClient, DEFAULT_ENDPOINT};

#[derive(Parser)]
#[command(name = "webgrapple-cli")]
#[command(about = "Register services with a running webgrapple proxy", long_about = None)]
struct Cli {
    /// Control-plane origin.
    #[arg(short, long, default_value = "http://127.0.0.1:8888")]
    url: String,

    /// Control-plane endpoint path.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or replace the services described in a YAML, JSON or TOML file
    Upsert {
        #[arg(short, long, default_value = "webgrapple.yaml")]
        file: PathBuf,
    },
    /// Remove services by id
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ServiceClient::new(cli.url).with_endpoint(cli.endpoint);

    match cli.command {
        Commands::Upsert { file } => {
            let services = load_services(&file)?;
            client.upsert(&services).await?;
            for service in &services {
                println!("upserted {} -> {}", service.id, service.address);
            }
        }
        Commands::Remove { ids } => {
            let ids: Vec<ServiceId> = ids.into_iter().map(ServiceId::from).collect();
            client.remove(&ids).await?;
            for id in &ids {
                println!("removed {}", id);
            }
        }
    }

    Ok(())
}
