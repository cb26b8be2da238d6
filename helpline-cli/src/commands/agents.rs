use clap::Subcommand;
use colored::Colorize;

use helpline_core::{AgentKey, AgentService, CoordinatorConfig};

#[derive(Subcommand)]
pub enum AgentsCommand {
    #[command(about = "Activate an agent in a workspace")]
    Login {
        #[arg(help = "Tenant slug")]
        tenant: String,

        #[arg(help = "Workspace id")]
        workspace_id: i64,

        #[arg(help = "Agent id")]
        agent_id: String,

        #[arg(help = "Agent display name")]
        name: String,

        #[arg(help = "Agent email")]
        email: String,
    },

    #[command(about = "Deactivate an agent; active sessions are requeued")]
    Logout {
        #[arg(help = "Tenant slug")]
        tenant: String,

        #[arg(help = "Workspace id")]
        workspace_id: i64,

        #[arg(help = "Agent id")]
        agent_id: String,

        #[arg(help = "Agent display name")]
        name: String,

        #[arg(help = "Agent email")]
        email: String,
    },
}

pub async fn handle_agents_command(
    config: &CoordinatorConfig,
    cmd: AgentsCommand,
) -> anyhow::Result<()> {
    let (db, directory) = super::connect(config).await?;
    let queue = super::queue_store(config, &db);
    let service = AgentService::new(directory, queue, config.queue.transfer_prefix.clone());

    let result = match cmd {
        AgentsCommand::Login {
            tenant,
            workspace_id,
            agent_id,
            name,
            email,
        } => {
            let key = AgentKey::new(agent_id, name, email);
            service.login(&tenant, workspace_id, &key).await?;
            println!(
                "{} Agent {} logged in to {}/{}",
                "✓".green().bold(),
                key.to_string().cyan(),
                tenant,
                workspace_id
            );
            Ok(())
        }
        AgentsCommand::Logout {
            tenant,
            workspace_id,
            agent_id,
            name,
            email,
        } => {
            let key = AgentKey::new(agent_id, name, email);
            service.logout(&tenant, workspace_id, &key).await?;
            println!(
                "{} Agent {} logged out of {}/{}",
                "✓".green().bold(),
                key.to_string().cyan(),
                tenant,
                workspace_id
            );
            Ok(())
        }
    };

    db.close().await;
    result
}
