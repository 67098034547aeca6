use anyhow::Result;
use clap::Parser;
use pdfchat_cli::{Cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    pdfchat_cli::run(cli).await
}
