use server_manage::error::Result;
use server_manage::{Supervisor, SupervisorConfig};
use std::env;
use tracing_subscriber::{EnvFilter, fmt};

// Usage: cargo run --example bot_farm -- <start|restart|update> [server...]
#[tokio::main]
async fn main() -> Result<()> {
    // `with_env_filter` reads the RUST_LOG environment variable to set the log level.
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    let mut args = env::args().skip(1);
    let action = args.next().unwrap_or_else(|| "start".to_string());
    let names: Vec<String> = args.collect();

    let mut supervisor = Supervisor::bot_farm(SupervisorConfig::default());
    tracing::info!(registry_path = ?supervisor.registry_path(), "Loading servers");
    supervisor.load_servers()?;

    let report = supervisor.run_action(&action, &names).await?;

    for name in &report.successes {
        println!("ok      {}", name);
    }
    for failure in &report.failures {
        println!("failed  {}: {}", failure.name, failure.error);
    }
    for name in &report.skipped {
        println!("unknown {}", name);
    }

    Ok(())
}
