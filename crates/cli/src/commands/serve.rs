//! `forkreach serve` — Start the HTTP gateway.

use forkreach_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(p) = port {
        config.gateway.port = p;
    }

    println!();
    println!("  ForkReach gateway");
    println!("  ─────────────────");
    println!("  Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:      {}", config.default_model);
    println!("  Store:      {:?}", config.store.backend);
    println!();
    println!("  Endpoints:");
    println!("    POST /api/chat       UI message stream (SSE)");
    println!("    POST /api/stream     Plain-text completion");
    println!("    GET  /api/agents     Agent list");
    println!("    POST /api/route      Routing preview");
    println!("    GET  /api/models     Configured models");
    println!("    GET  /api/events     Domain events (SSE)");
    println!("    /api/conversations   Device-scoped conversations");
    println!("    /api/products        Device-scoped products");
    println!();

    forkreach_gateway::start(config).await
}
