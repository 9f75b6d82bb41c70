//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use quire_static::StaticBuilder;

use crate::config;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, minify: Option<bool>) -> Result<()> {
    tracing::info!("Building site...");

    let mut config = config::load(config_path)?.build_config()?;
    if let Some(output) = output {
        config.output_dir = output;
    }
    if let Some(minify) = minify {
        config.minify = minify;
    }

    let builder = StaticBuilder::new(config);
    super::cancel_on_ctrl_c(builder.cancel_flag());

    let result = builder.build().await?;

    tracing::info!(
        "Built {} pages and {} other files in {}ms",
        result.pages,
        result.documents,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
