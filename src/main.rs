use route_chain::config::Config;
use route_chain::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config file path without extension, e.g. `route_chain config`
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;

    logger::init(&cfg)?;
    let router = cfg.build_router()?;

    // Tokio runtime, sized by the workers setting when present
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(server::run(&cfg, router))?;
    Ok(())
}
