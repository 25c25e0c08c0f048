pub mod commands;
pub mod db;
pub mod detection;
pub mod pose;
pub mod settings;
pub mod store;
pub mod utils;
pub mod workout;

use clap::Parser;

use commands::Cli;

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    log::debug!("repcounter starting with {:?}", cli.command);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::dispatch(cli))
}
