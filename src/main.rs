use std::process::exit;

use anyhow::Result;
use log::*;

use engine::{Engine, EngineConfig};

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = EngineConfig::default()
        .with_title("DOOM Engine")
        .with_size(1024, 768);

    info!("{} v{}", config.window.title, env!("CARGO_PKG_VERSION"));

    let result = Engine::new(config).and_then(|e| e.run());
    if let Err(err) = result {
        error!("{}", err);
        exit(err.kind().exit_code());
    }

    Ok(())
}
