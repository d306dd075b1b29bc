use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use resync_core::config::DEFAULT_CONFIG_PATH;
use resync_core::ResyncConfig;

mod app;
mod daemon;
mod http;
mod logging;

#[derive(Debug, Parser)]
#[command(name = "resync", version, about = "Runs rsync jobs on cron schedules")]
struct Args {
    /// Configuration file (.toml, or .yaml/.yml)
    #[arg(long, env = "RESYNC_CONF", default_value = DEFAULT_CONFIG_PATH)]
    conf: PathBuf,

    /// Print the stored sync stats and exit
    #[arg(long)]
    stats: bool,

    /// Log to the terminal instead of <log_path>/resync.log
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ResyncConfig::load(&args.conf)
        .with_context(|| format!("loading {}", args.conf.display()))?;

    if args.stats {
        let components = app::Components::build(config)?;
        components.scheduler.dump(&mut std::io::stdout().lock())?;
        return Ok(());
    }

    logging::init(&config, args.debug)?;
    logging::install_panic_hook();

    daemon::run(args.conf, config).await
}
