//! Preview server for a published site.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config;

/// Where to serve from and under which URL path.
#[derive(Debug, PartialEq, Eq)]
struct Preview {
    dir: PathBuf,
    /// Base path of the site URL, e.g. `/blog/`
    base: String,
}

/// Run the serve command.
///
/// Without `--dir` the configured output directory is served. The tree is
/// mounted under the site's base path so absolute links resolve.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>) -> Result<()> {
    let preview = resolve(config_path, dir)?;
    if !preview.dir.exists() {
        bail!(
            "Directory not found: {}. Run 'quire build' first.",
            preview.dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    let service = ServeDir::new(&preview.dir);
    let app = match mount_path(&preview.base) {
        Some(path) => Router::new().nest_service(path, service),
        None => Router::new().fallback_service(service),
    };

    let url = format!("http://{}{}", addr, preview.base);
    tracing::info!("Previewing {} at {}", preview.dir.display(), url);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if let Err(e) = open::that(&url) {
        tracing::debug!("Could not open browser: {}", e);
    }

    axum::serve(listener, app).await?;

    Ok(())
}

fn resolve(config_path: &Path, dir: Option<PathBuf>) -> Result<Preview> {
    if !config_path.exists() {
        let Some(dir) = dir else {
            bail!(
                "Config file not found: {}. Pass --dir to serve a directory.",
                config_path.display()
            );
        };
        return Ok(Preview {
            dir,
            base: "/".to_string(),
        });
    }

    let file = config::load(config_path)?;
    let build = file.build_config()?;
    Ok(Preview {
        dir: dir.unwrap_or(build.output_dir),
        base: build.site.url.path().to_string(),
    })
}

/// Route prefix for a base path; `None` for the site root.
fn mount_path(base: &str) -> Option<&str> {
    Some(base.trim_end_matches('/')).filter(|path| !path.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_to_configured_output() {
        let root = TempDir::new().unwrap();
        let config_path = root.path().join("quire.toml");
        fs::write(
            &config_path,
            "[site]\nname = \"Blog\"\nurl = \"https://chuy.github.io/blog\"\n[content]\noutput = \"dist\"\n",
        )
        .unwrap();

        let preview = resolve(&config_path, None).unwrap();

        assert_eq!(
            preview,
            Preview {
                dir: PathBuf::from("dist"),
                base: "/blog/".to_string(),
            }
        );
        assert_eq!(
            resolve(&config_path, Some(PathBuf::from("out"))).unwrap().dir,
            PathBuf::from("out")
        );
    }

    #[test]
    fn serves_a_directory_without_config() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("quire.toml");

        let preview = resolve(&missing, Some(PathBuf::from("public"))).unwrap();
        assert_eq!(preview.base, "/");

        assert!(resolve(&missing, None).is_err());
    }

    #[test]
    fn mounts_under_base_path() {
        assert_eq!(mount_path("/blog/"), Some("/blog"));
        assert_eq!(mount_path("/"), None);
    }
}
