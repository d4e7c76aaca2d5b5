use clap::{Parser, Subcommand};
use controller::{publish, run};
use std::process;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Parameters {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the LandingPage and Catalogue controllers
    Run(run::Parameters),
    /// Advertise an application to a LandingPage or a Catalogue
    Publish(publish::Parameters),
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let collector = Registry::default().with(env_filter);
    let res = if json {
        tracing::subscriber::set_global_default(collector.with(tracing_subscriber::fmt::layer().json()))
    } else {
        tracing::subscriber::set_global_default(collector.with(tracing_subscriber::fmt::layer()))
    };
    if let Err(e) = res {
        eprintln!("Cannot initialize logging: {e}");
    }
}

#[tokio::main]
async fn main() {
    let args = Parameters::parse();
    init_tracing(args.log_json);
    match &args.command {
        Commands::Run(args) => {
            if let Err(e) = run::run(args).await {
                tracing::error!("Run failed with: {e:}");
                process::exit(1)
            }
        }
        Commands::Publish(args) => {
            if let Err(e) = publish::run(args).await {
                tracing::error!("Publish failed with: {e:}");
                process::exit(1)
            }
        }
    }
}
