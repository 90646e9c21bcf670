//! `forkreach agents` — List the built-in marketing agents.

use forkreach_agents::HandlerRegistry;
use forkreach_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = HandlerRegistry::builtin(&config.routing.priority_handler)?;
    let priority = registry.priority().id().to_string();

    println!();
    for info in registry.infos() {
        let marker = if info.id == priority { " (priority)" } else { "" };
        println!("  {} {}  [{}]{marker}", info.icon, info.name, info.id);
        println!("     {}", info.description);
        println!("     {}", info.capabilities.join(", "));
        println!();
    }
    Ok(())
}
