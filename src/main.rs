use std::sync::Arc;

use anyhow::Result;
use chatbench::{cli::BenchCli, openai::OpenAiIssuer};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = BenchCli::parse();
    let issuer = OpenAiIssuer::new(&cli.base_url, cli.api_key.as_str(), cli.model.as_str(), cli.timeout.into())?;
    chatbench::cli::run(&cli, Arc::new(issuer)).await
}
