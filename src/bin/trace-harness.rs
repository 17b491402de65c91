use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use trace_harness::client::ClientFactory;
use trace_harness::config::load_config;
use trace_harness::observability::logging::init_logging;
use trace_harness::{HarnessConfig, Traceparent};

#[derive(Parser)]
#[command(name = "trace-harness")]
#[command(about = "Traceparent tooling for test-scoped trace propagation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print fresh traceparent values
    Generate {
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Load, validate and print a configuration file
    CheckConfig { path: PathBuf },
    /// Send a GET request carrying a fresh traceparent
    Probe { url: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { count } => {
            for _ in 0..count {
                println!("{}", Traceparent::random());
            }
        }
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(config) => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Probe { url } => {
            init_logging(&HarnessConfig::default().observability);

            let traceparent = Arc::new(Traceparent::random());
            let client = ClientFactory::new().http_client(traceparent.clone())?;
            let res = client.get(url.as_str()).send().await?;

            println!("traceparent: {}", traceparent);
            println!("status: {}", res.status());
        }
    }

    Ok(())
}
