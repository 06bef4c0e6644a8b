mod config;
mod error;
mod gradebook;
mod logging;
mod server;

use tokio::runtime::Builder;

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::logging::init_logging;

fn main() -> Result<()> {
    let cli_config = std::env::args().nth(1);
    let config = DaemonConfig::from_sources(cli_config.as_deref())?;
    init_logging(&config)?;

    if let Err(err) = run(&config) {
        fatal!("gradebook daemon stopped: {err}");
        return Err(err);
    }
    Ok(())
}

fn run(config: &DaemonConfig) -> Result<()> {
    let mut runtime = Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(threads) = config.server().worker_threads() {
        runtime.worker_threads(threads);
    }
    let runtime = runtime.build()?;

    let service = gradebook::shared_service(config);
    log::info!(
        "gradebook daemon starting (pid {}, entries backend {:?})",
        std::process::id(),
        config.data().entries_backend
    );

    runtime.block_on(server::run(config, service))
}
