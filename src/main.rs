use clap::{Parser, Subcommand};
use localdock::container::envvars::EnvvarCollector;
use localdock::container::factory::{make_container, ContainerOptions};
use localdock::container::paths::PathConfig;
use localdock::container::platform::SolutionStack;
use localdock::container::viewmodel::ContainerViewModel;
use localdock::container::{compat, logdir, state, ContainerError};
use localdock::runner::CommandRunner;
use tracing::{error, info};

/// Used when neither `--platform` nor `LOCALDOCK_PLATFORM` names one.
const DEFAULT_PLATFORM: &str = "64bit Amazon Linux 2015.03 v1.4.3 running Docker 1.6.2";

const PLATFORM_ENV_VAR: &str = "LOCALDOCK_PLATFORM";

#[derive(Parser)]
#[command(name = "localdock", version, about = "Run your project in local docker containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and run the project locally
    Run {
        /// Host port to bind instead of the exposed container port
        #[arg(long)]
        port: Option<String>,
        /// Environment variable overlay, e.g. A=1,B=2 (B= removes B)
        #[arg(long)]
        envvars: Option<String>,
        /// Pass --allow-insecure-ssl through to docker-compose
        #[arg(long)]
        allow_insecure_ssl: bool,
        /// Platform name; defaults to $LOCALDOCK_PLATFORM or a generic
        /// Docker platform
        #[arg(long)]
        platform: Option<String>,
    },
    /// Show where local run logs are stored
    Logs,
    /// Show the state of the project's local containers
    Status {
        /// Platform name; defaults to $LOCALDOCK_PLATFORM or a generic
        /// Docker platform
        #[arg(long)]
        platform: Option<String>,
    },
    /// Persist environment variables for future local runs
    Setenv {
        /// K=V sets a variable, K= removes one
        #[arg(required = true)]
        vars: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "localdock=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        // Engine output verbatim first; the interpretation after.
        if let Some(ContainerError::Command(cmd_err)) = err.downcast_ref::<ContainerError>() {
            if !cmd_err.output.is_empty() {
                eprintln!("{}", cmd_err.output.trim_end());
            }
        }
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            port,
            envvars,
            allow_insecure_ssl,
            platform,
        } => run(port, envvars, allow_insecure_ssl, platform).await,
        Commands::Logs => logs(),
        Commands::Status { platform } => status(platform).await,
        Commands::Setenv { vars } => setenv(&vars),
    }
}

async fn run(
    port: Option<String>,
    envvars: Option<String>,
    allow_insecure_ssl: bool,
    platform: Option<String>,
) -> anyhow::Result<()> {
    let runner = CommandRunner::new();
    compat::validate_docker_installed(&runner).await?;

    let container = make_container(
        PathConfig::discover()?,
        resolve_platform(platform),
        ContainerOptions {
            envvars,
            host_port: port,
            allow_insecure_ssl,
        },
    )?;
    container.validate()?;
    container.start().await?;

    let view = ContainerViewModel::from_container(&container, &runner).await?;
    print!("{}", view);
    Ok(())
}

fn logs() -> anyhow::Result<()> {
    let pathconfig = PathConfig::discover()?;
    logdir::print_logs(pathconfig.logdir_path());
    Ok(())
}

async fn status(platform: Option<String>) -> anyhow::Result<()> {
    let runner = CommandRunner::new();
    let container = make_container(
        PathConfig::discover()?,
        resolve_platform(platform),
        ContainerOptions::default(),
    )?;

    let view = ContainerViewModel::from_container(&container, &runner).await?;
    if view.num_services() == 0 {
        println!("no local containers");
        return Ok(());
    }
    println!(
        "local run is {}",
        if view.is_running() { "running" } else { "stopped" }
    );
    print!("{}", view);
    Ok(())
}

fn setenv(vars: &[String]) -> anyhow::Result<()> {
    let pathconfig = PathConfig::discover()?;
    let joined = vars.join(",");
    let overlay = EnvvarCollector::from_str(Some(joined.as_str()));
    let result = state::setenv(pathconfig.state_file_path(), &overlay)?;

    info!("persisted {} variable(s)", result.map().len());
    let mut keys: Vec<_> = result.map().keys().collect();
    keys.sort();
    for key in keys {
        println!("{}={}", key, result.map()[key]);
    }
    Ok(())
}

fn resolve_platform(platform: Option<String>) -> SolutionStack {
    let name = platform
        .or_else(|| std::env::var(PLATFORM_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());
    SolutionStack::new(name)
}
