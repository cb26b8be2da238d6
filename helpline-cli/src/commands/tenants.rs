use clap::Subcommand;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use helpline_core::{CoordinatorConfig, TenantService};

#[derive(Subcommand)]
pub enum TenantsCommand {
    #[command(about = "Provision a tenant and its isolated schema")]
    Add {
        #[arg(help = "Numeric tenant (bot) id")]
        bot_id: i64,

        #[arg(help = "Human-readable tenant name")]
        name: String,

        #[arg(
            short,
            long,
            default_value_t = 30,
            help = "Default session timeout in minutes"
        )]
        timeout: i64,
    },

    #[command(about = "Deactivate a tenant (records are kept)")]
    Disable {
        #[arg(help = "Numeric tenant (bot) id")]
        bot_id: i64,
    },

    #[command(about = "List all tenants")]
    List {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },
}

pub async fn handle_tenants_command(
    config: &CoordinatorConfig,
    cmd: TenantsCommand,
) -> anyhow::Result<()> {
    let (db, directory) = super::connect(config).await?;
    let service = TenantService::new(directory);

    let result = match cmd {
        TenantsCommand::Add {
            bot_id,
            name,
            timeout,
        } => {
            let tenant = service.create_tenant(bot_id, &name, timeout).await?;
            println!(
                "{} Tenant {} provisioned (schema {})",
                "✓".green().bold(),
                tenant.slug.cyan(),
                tenant
                    .schema_name(&config.tenancy.schema_suffix)
                    .dimmed()
            );
            Ok(())
        }
        TenantsCommand::Disable { bot_id } => {
            service.deactivate_tenant(bot_id).await?;
            println!("{} Tenant {} deactivated", "✓".green().bold(), bot_id);
            Ok(())
        }
        TenantsCommand::List { format } => cmd_tenants_list(&service, &format).await,
    };

    db.close().await;
    result
}

async fn cmd_tenants_list(service: &TenantService, format: &str) -> anyhow::Result<()> {
    let tenants = service.list_tenants().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&tenants)?);
        return Ok(());
    }

    if tenants.is_empty() {
        println!("{}", "No tenants registered".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Slug").fg(Color::Cyan),
            Cell::new("Active").fg(Color::Cyan),
            Cell::new("Timeout (min)").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
        ]);

    for tenant in &tenants {
        let active = if tenant.is_active {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(tenant.bot_id),
            Cell::new(&tenant.bot_name),
            Cell::new(&tenant.slug),
            active,
            Cell::new(tenant.timeout_minutes),
            Cell::new(tenant.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!("{table}");
    Ok(())
}
