use anyhow::Result;
use mission_plan::config::parse_args;
use mission_plan::logging::init as init_logging;
use mission_plan::runtime;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("mission-plan starting");
    debug!("config path: {}", config.config_path.display());

    let res = runtime::run(&config);
    if let Err(err) = &res {
        warn!("runtime error: {err:#}");
    }

    info!("mission-plan exited");
    res
}
