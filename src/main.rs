mod app;
mod cli;

use std::process;
use tracing::Level;
use upscaler::config::Config;

fn main() {
    let cli = cli::parse();

    let debug = cli.overrides.debug
        || Config::load()
            .map(|c| c.defaults.debug_mode)
            .unwrap_or(false);
    tracing_subscriber::fmt()
        .with_max_level(if debug { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = app::run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
