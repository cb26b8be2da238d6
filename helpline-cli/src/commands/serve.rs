use colored::Colorize;
use std::sync::Arc;

use helpline_core::{ClassifierClient, Coordinator, CoordinatorConfig, LlmProviderFactory};

pub async fn handle_serve_command(config: &CoordinatorConfig) -> anyhow::Result<()> {
    println!("{}", "Starting Helpline coordinator...".cyan().bold());

    let (db, directory) = super::connect(config).await?;
    db.run_migrations().await?;
    let queue = super::queue_store(config, &db);

    let providers = Arc::new(LlmProviderFactory::new()?);
    let classifier = ClassifierClient::new(&config.classifier)?;

    let coordinator = Coordinator::new(config, directory, queue, providers, classifier);
    coordinator.start().await;

    println!(
        "{} fast loop every {}s, slow loop every {}s (Ctrl-C to stop)",
        "✓".green().bold(),
        config.scheduler.fast_interval_secs,
        config.scheduler.slow_interval_secs
    );

    tokio::signal::ctrl_c().await?;
    println!();
    println!("{}", "Shutting down...".yellow());

    coordinator.stop().await;
    db.close().await;

    println!("{} {}", "✓".green().bold(), "Coordinator stopped".green());
    Ok(())
}
