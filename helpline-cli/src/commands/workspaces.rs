use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use helpline_core::{
    CoordinatorConfig, LlmKind, TenantService, Workspace, WorkspaceSettings,
};

#[derive(Subcommand)]
pub enum WorkspacesCommand {
    #[command(about = "Register a workspace and its coordinator settings")]
    Add {
        #[arg(help = "Owning tenant (bot) id")]
        bot_id: i64,

        #[arg(help = "Numeric workspace id")]
        workspace_id: i64,

        #[arg(help = "Chat backend (openai, groq, ollama, anythingllm)")]
        llm: String,

        #[arg(help = "Model name (or AnythingLLM workspace slug)")]
        model: String,

        #[arg(long, help = "API key for the chat backend")]
        api_key: Option<String>,

        #[arg(long, help = "Base URL override for the chat backend")]
        url: Option<String>,

        #[arg(
            long,
            default_value_t = 3,
            help = "Max concurrent sessions per agent"
        )]
        sessions_limit: i64,

        #[arg(long, help = "Auto-assign queued sessions to agents")]
        auto_assignment: bool,

        #[arg(long, help = "Classify conversation sentiment and language")]
        conversation_sentiment: bool,

        #[arg(long, help = "Capture agent-response sentiment")]
        agent_sentiment: bool,

        #[arg(long, help = "Summarize sessions that expire without handoff")]
        summary: bool,
    },
}

fn parse_llm(raw: &str) -> anyhow::Result<LlmKind> {
    match raw.to_lowercase().as_str() {
        "openai" => Ok(LlmKind::Openai),
        "groq" => Ok(LlmKind::Groq),
        "ollama" => Ok(LlmKind::Ollama),
        "anythingllm" => Ok(LlmKind::Anythingllm),
        other => anyhow::bail!("unknown chat backend '{other}'"),
    }
}

pub async fn handle_workspaces_command(
    config: &CoordinatorConfig,
    cmd: WorkspacesCommand,
) -> anyhow::Result<()> {
    let (db, directory) = super::connect(config).await?;
    let service = TenantService::new(directory);

    let WorkspacesCommand::Add {
        bot_id,
        workspace_id,
        llm,
        model,
        api_key,
        url,
        sessions_limit,
        auto_assignment,
        conversation_sentiment,
        agent_sentiment,
        summary,
    } = cmd;

    let now = Utc::now();
    let workspace = Workspace {
        bot_id,
        workspace_id,
        llm: parse_llm(&llm)?,
        model,
        llm_api_key: api_key,
        llm_url: url,
        sessions_limit,
        is_active: true,
        created_at: now,
        modified_at: now,
    };
    let settings = WorkspaceSettings {
        bot_id,
        workspace_id,
        auto_assignment,
        conversation_sentiment,
        agent_sentiment,
        summary,
    };

    let result = service.create_workspace(&workspace, &settings).await;
    db.close().await;
    result?;

    println!(
        "{} Workspace {} registered for tenant {}",
        "✓".green().bold(),
        workspace_id,
        bot_id
    );
    Ok(())
}
