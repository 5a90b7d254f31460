use clap::Parser;

use itsm_engine::cli::{self, Cli};
use itsm_infra::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    itsm_observability::init_with(cli.log_format.unwrap_or(config.log_format));

    cli::run(cli, &config).await
}
