use clap::{Parser, Subcommand};
use colored::Colorize;
use helpline_core::{CoordinatorConfig, Database};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{
    handle_agents_command, handle_serve_command, handle_tenants_command,
    handle_workspaces_command, AgentsCommand, TenantsCommand, WorkspacesCommand,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "helpline")]
#[command(version = VERSION)]
#[command(about = "Helpline - multi-tenant support session coordinator")]
#[command(long_about = r#"
Helpline routes chat sessions between an automated assistant and human
agents across multiple tenants. Run 'helpline init' to set up the
database, provision tenants and workspaces with the 'tenants' and
'workspaces' commands, then 'helpline serve' to start the coordinator.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize the database and run migrations")]
    Init,

    #[command(about = "Run the coordinator loops until interrupted")]
    Serve,

    #[command(about = "Provision and inspect tenants")]
    Tenants {
        #[command(subcommand)]
        action: TenantsCommand,
    },

    #[command(about = "Register workspaces and their coordinator settings")]
    Workspaces {
        #[command(subcommand)]
        action: WorkspacesCommand,
    },

    #[command(about = "Agent login and logout")]
    Agents {
        #[command(subcommand)]
        action: AgentsCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CoordinatorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Serve => handle_serve_command(&config).await,
        Commands::Tenants { action } => handle_tenants_command(&config, action).await,
        Commands::Workspaces { action } => handle_workspaces_command(&config, action).await,
        Commands::Agents { action } => handle_agents_command(&config, action).await,
    }
}

async fn cmd_init(config: &CoordinatorConfig) -> anyhow::Result<()> {
    println!("{}", "Initializing Helpline...".cyan().bold());
    println!();

    println!(
        "  {} Database URL: {}",
        "→".blue(),
        mask_password(&config.database.url)
    );

    println!("  {} Connecting to database...", "→".blue());
    let db = Database::connect(&config.database).await?;

    println!("  {} Running migrations...", "→".blue());
    db.run_migrations().await?;

    println!("  {} Verifying connection...", "→".blue());
    db.health_check().await?;

    db.close().await;

    println!();
    println!(
        "{} {}",
        "✓".green().bold(),
        "Database initialized successfully!".green()
    );

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let credentials = &url[scheme_end + 3..at];
            if let Some(colon) = credentials.find(':') {
                let user = &credentials[..colon];
                return format!("{}://{}:****{}", &url[..scheme_end], user, &url[at..]);
            }
        }
    }
    url.to_string()
}
