//! `delve serve` - Start the HTTP task API.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Delve Research API");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Workers:   {} (queue capacity {})",
        config.gateway.max_workers, config.gateway.queue_capacity
    );

    delve_gateway::start(config).await?;

    Ok(())
}
