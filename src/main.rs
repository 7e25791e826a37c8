//! taskflow - command-line entry point
//!
//! Plans a request, runs it to completion, and prints the resulting task tree.

use taskflow::{EngineConfig, Orchestrator};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let request = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if request.trim().is_empty() {
        anyhow::bail!("usage: taskflow <request>");
    }

    let config = EngineConfig::from_env()?;
    info!(
        "Loaded configuration: delay_scale={}, dataset={}",
        config.delay_scale,
        config
            .dataset_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string())
    );

    let engine = Orchestrator::from_config(&config).await?;
    let _subscription = engine.subscribe(|events| {
        for event in events {
            let task = event.task();
            info!(
                task_id = %task.id(),
                "{} {} ({})",
                event.kind(),
                task.task_type(),
                task.status()
            );
        }
    });

    let id = engine.submit(&request)?;
    engine.run(id).await;

    let tree = engine
        .get_task_tree(id)
        .ok_or_else(|| anyhow::anyhow!("task {} disappeared", id))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    Ok(())
}
