use clap::Parser;

use adlog_cli::{App, Cli};
use adlog_logging::AdlogSubscriberBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.app_config()?;

    let _guard = AdlogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    let app = App::open(config).await?;
    let output = app.run(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
