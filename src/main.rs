use clap::Parser;
use system_globals::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let registry = cli::bootstrap().await?;
    cli::run(&registry, cli.command, &mut std::io::stdout()).await
}
