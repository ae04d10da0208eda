use crate::node::FellowshipNode;
use crate::setup::InitializeInput;
use anyhow::{anyhow, Result};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Arguments for first-run setup from the command line. Missing values are
/// prompted for on stdin.
#[derive(Debug, Clone, Default)]
pub struct SetupArgs {
    pub deployment_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

pub async fn run_server(node: &FellowshipNode) -> Result<()> {
    let setup = node.setup().status()?;
    if !setup.initialized {
        tracing::warn!("deployment not initialized; API answers setup_required until POST /setup");
    }
    tracing::info!(port = node.config().api_port, "starting fellowship HTTP server");
    node.run_http_server().await
}

pub async fn run_setup(node: &FellowshipNode, args: SetupArgs) -> Result<()> {
    let service = node.setup();
    if service.is_initialized()? {
        let status = service.status()?;
        println!(
            "Already initialized as {:?} at {}",
            status.deployment_name.unwrap_or_default(),
            status.initialized_at.unwrap_or_default()
        );
        return Ok(());
    }

    let mut reader = BufReader::new(tokio::io::stdin());
    let input = InitializeInput {
        deployment_name: value_or_prompt(&mut reader, args.deployment_name, "Deployment name").await?,
        email: value_or_prompt(&mut reader, args.email, "Super-admin email").await?,
        password: value_or_prompt(&mut reader, args.password, "Super-admin password").await?,
        display_name: value_or_prompt(&mut reader, args.display_name, "Display name").await?,
    };
    let outcome = service.initialize(input)?;
    println!(
        "Initialized {} with super-admin {} ({})",
        outcome.system.deployment_name, outcome.super_admin.display_name, outcome.super_admin.email
    );
    Ok(())
}

pub fn print_status(node: &FellowshipNode) -> Result<()> {
    let status = node.setup().status()?;
    let config = node.config();
    println!("database:        {}", config.paths.db_path.display());
    println!("blobs:           {}", config.paths.blobs_dir.display());
    println!("api port:        {}", config.api_port);
    println!(
        "admin limit:     {} per family ({:?})",
        config.membership.max_admins_per_family, config.membership.admin_limit_policy
    );
    match (status.initialized, status.deployment_name) {
        (true, Some(name)) => println!("deployment:      {name}"),
        _ => println!("deployment:      not initialized (run `setup`)"),
    }
    Ok(())
}

async fn value_or_prompt<R>(reader: &mut R, value: Option<String>, label: &str) -> Result<String>
where
    R: AsyncBufReadExt + Unpin,
{
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        return Ok(value);
    }
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(anyhow!("stdin closed before {label} was entered"));
    }
    Ok(line.trim().to_string())
}
