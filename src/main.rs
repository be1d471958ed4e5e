use anyhow::Result;
use clap::Parser;
use deckgen_rs::{cli, generator::workflow::launch, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 中的API KEY只在入口处读取
    let _ = dotenvy::dotenv();

    let args = cli::Args::parse();
    logging::init_tracing(args.verbose);

    let request = args.request();
    let config = args.into_config()?;

    let outcome = launch(&config, request).await?;
    println!("💾 已保存演示文稿: {}", outcome.artifact.path.display());
    Ok(())
}
