//! Build and deploy command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quire_static::StaticBuilder;

use crate::config;

/// Run the deploy command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let file = config::load(config_path)?;
    let deployer = file
        .deploy
        .as_ref()
        .context("No [deploy] section in config")?
        .deployer()?;

    let mut config = file.build_config()?;
    if let Some(output) = output {
        config.output_dir = output;
    }

    tracing::info!("Building and deploying with {}...", deployer.name());

    let builder = StaticBuilder::new(config);
    super::cancel_on_ctrl_c(builder.cancel_flag());

    let result = builder.deploy(deployer).await?;

    tracing::info!(
        "Deployed {} pages from {} in {}ms",
        result.pages,
        result.output_dir.display(),
        result.duration_ms
    );

    Ok(())
}
