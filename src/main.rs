use clap::Parser;
use vitalwatch_lib::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vitalwatch_lib::run(Cli::parse()).await
}
