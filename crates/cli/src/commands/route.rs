//! `forkreach route` — Show the routing decision for a message.

use std::sync::Arc;

use forkreach_agents::{HandlerRegistry, Router};
use forkreach_config::AppConfig;

pub async fn run(message: &str, agent: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let router = Router::new(Arc::new(HandlerRegistry::builtin(
        &config.routing.priority_handler,
    )?));

    let routed = router.route(message, agent);
    let how = if routed.explicit { "explicit" } else { "auto" };

    println!();
    println!(
        "  → {} [{}] ({how}, score {:.2})",
        routed.handler.info().name,
        routed.handler.id(),
        routed.score
    );
    println!();
    for score in router.scores(message) {
        println!("    {:<10} {:.2}", score.id, score.score);
    }
    println!();
    Ok(())
}
