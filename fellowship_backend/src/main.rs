use anyhow::Result;
use clap::{Parser, Subcommand};
use fellowship_backend::cli::{self, SetupArgs};
use fellowship_backend::config::FellowshipConfig;
use fellowship_backend::node::FellowshipNode;
use fellowship_backend::telemetry;
use fellowship_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Fellowship community backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server
    Serve,
    /// Create the first super-admin and mark the deployment initialized
    Setup {
        #[arg(long)]
        deployment_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Print paths, limits and setup state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = FellowshipConfig::from_env()?;
    let node = FellowshipNode::start(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => cli::run_server(&node).await,
        Command::Setup {
            deployment_name,
            email,
            password,
            display_name,
        } => {
            cli::run_setup(
                &node,
                SetupArgs {
                    deployment_name,
                    email,
                    password,
                    display_name,
                },
            )
            .await
        }
        Command::Status => cli::print_status(&node),
    }
}
