//! Demonstration CLI wiring a [`FileEnumerator`] to the [`pipeline`] for
//! manual exercise of the library. This is not a full provider-API client;
//! concrete REST/GraphQL clients, interactive configuration, and log routing
//! are left to whoever embeds `git_bundle_vault` as a library.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use git_bundle_vault::config::ProviderConfig;
use git_bundle_vault::enumerator::{Enumerator, FileEnumerator};
use git_bundle_vault::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "vaultd",
    about = "Run a single point-in-time Git bundle backup pass",
    long_about = "Reads a provider configuration TOML file and a JSON list of repositories, \
                  then backs up each one to timestamped Git bundles under the configured backup directory."
)]
struct Cli {
    /// Path to a provider configuration TOML file.
    #[arg(long)]
    config: PathBuf,

    /// Path to a JSON array of repository descriptors, in lieu of a real
    /// provider API client.
    #[arg(long)]
    repos: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_text = std::fs::read_to_string(&cli.config)?;
    let config = ProviderConfig::from_toml_str(&config_text)?;

    let enumerator: Arc<dyn Enumerator> = Arc::new(FileEnumerator::new(
        cli.repos,
        config.provider,
        config.api_url.clone(),
    ));

    let (_cancel_handle, cancel_rx) = pipeline::new_cancellation();
    let result = pipeline::run(config, enumerator, cancel_rx).await;

    println!(
        "ok={} skipped={} failed={}",
        result.ok_count(),
        result.skipped_count(),
        result.failed_count()
    );
    if let Some(provider_error) = &result.provider_error {
        eprintln!("enumeration failed: {provider_error}");
        std::process::exit(1);
    }
    if result.failed_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
