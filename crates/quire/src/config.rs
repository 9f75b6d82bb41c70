//! quire.toml parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use quire_content::{Metadata, SectionSpec};
use quire_static::{
    BuildConfig, Deployer, DirectoryDeployer, FeedConfig, GitDeployer, SiteInfo, ThemeConfig,
};
use serde::Deserialize;

/// Configuration file structure (quire.toml).
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub site: SiteSettings,
    #[serde(default)]
    pub content: ContentSettings,
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionSpec>,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub theme: ThemeSettings,
    #[serde(default)]
    pub build: BuildSettings,
    pub deploy: Option<DeploySettings>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSettings {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentSettings {
    #[serde(default = "default_content_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_resources_dir")]
    pub resources: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            dir: default_content_dir(),
            resources: default_resources_dir(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedSettings {
    /// Sections included in the feed; empty means all
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default = "default_feed_path")]
    pub path: String,
    #[serde(default = "default_sitemap_path")]
    pub sitemap: String,
    pub max_items: Option<usize>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            path: default_feed_path(),
            sitemap: default_sitemap_path(),
            max_items: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ThemeSettings {
    pub dir: Option<PathBuf>,
    /// Metadata defaults for templates
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_true")]
    pub minify: bool,
    #[serde(default = "default_true")]
    pub clean: bool,
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify: true,
            clean: true,
            plugins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Git,
    Directory,
}

/// The `[deploy]` table.
#[derive(Debug, Deserialize)]
pub struct DeploySettings {
    pub provider: Provider,
    pub remote: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub message: Option<String>,
    pub target: Option<PathBuf>,
}

fn default_sections() -> Vec<SectionSpec> {
    vec![SectionSpec::new("posts")]
}
fn default_language() -> String {
    "en".to_string()
}
fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}
fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}
fn default_output() -> PathBuf {
    PathBuf::from("public")
}
fn default_feed_path() -> String {
    "feed.rss".to_string()
}
fn default_sitemap_path() -> String {
    "sitemap.xml".to_string()
}
fn default_true() -> bool {
    true
}
fn default_branch() -> String {
    "gh-pages".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

/// Load and parse a config file.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        bail!(
            "Config file not found: {}. Run 'quire init' first.",
            path.display()
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn parse(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

impl ConfigFile {
    /// Turn the file into a validated build configuration.
    pub fn build_config(&self) -> Result<BuildConfig> {
        let site = SiteInfo::new(
            &self.site.name,
            &self.site.url,
            &self.site.description,
            &self.site.language,
        )?;

        let config = BuildConfig {
            site,
            content_dir: self.content.dir.clone(),
            resources_dir: Some(self.content.resources.clone()),
            output_dir: self.content.output.clone(),
            sections: self.sections.clone(),
            feed: FeedConfig {
                sections: self.feed.sections.clone(),
                path: self.feed.path.clone(),
                sitemap_path: self.feed.sitemap.clone(),
                max_items: self.feed.max_items,
            },
            theme: ThemeConfig {
                dir: self.theme.dir.clone(),
                defaults: self
                    .theme
                    .defaults
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<Metadata>(),
            },
            plugins: self.build.plugins.clone(),
            minify: self.build.minify,
            clean: self.build.clean,
        };

        config.validate()?;
        Ok(config)
    }
}

impl DeploySettings {
    /// The deployer described by this table.
    pub fn deployer(&self) -> Result<Arc<dyn Deployer>> {
        match self.provider {
            Provider::Git => {
                let Some(remote) = &self.remote else {
                    bail!("[deploy] provider \"git\" needs a remote");
                };
                let mut git = GitDeployer::new(remote, &self.branch)
                    .with_timeout(Duration::from_secs(self.timeout_secs));
                if let Some(message) = &self.message {
                    git = git.with_message(message);
                }
                Ok(Arc::new(git))
            }
            Provider::Directory => {
                let Some(target) = &self.target else {
                    bail!("[deploy] provider \"directory\" needs a target");
                };
                Ok(Arc::new(DirectoryDeployer::new(target)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quire_content::{SortKey, SortOrder};

    use super::*;

    const FULL: &str = r#"
[site]
name = "Chuy's Blog"
url = "https://chuy.github.io/blog"
description = "Notes"

[content]
dir = "src/content"
output = "dist"

[[sections]]
id = "posts"
title = "Posts"

[[sections]]
id = "apps"
sort = { key = "title", order = "ascending" }

[feed]
sections = ["posts"]
max_items = 20

[theme]
defaults = { author = "Chuy" }

[build]
minify = false
plugins = ["heading-anchors"]

[deploy]
provider = "git"
remote = "git@github.com:chuy/blog.git"
timeout_secs = 30
"#;

    #[test]
    fn parses_full_config() {
        let file = parse(FULL).unwrap();
        let config = file.build_config().unwrap();

        assert_eq!(config.site.url.as_str(), "https://chuy.github.io/blog/");
        assert_eq!(config.site.language, "en");
        assert_eq!(config.content_dir, PathBuf::from("src/content"));
        assert_eq!(config.resources_dir, Some(PathBuf::from("resources")));
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        assert_eq!(config.sections.len(), 2);
        assert_eq!(config.sections[1].sort.key, SortKey::Title);
        assert_eq!(config.sections[1].sort.order, SortOrder::Ascending);
        assert_eq!(config.sections[1].display_title(), "Apps");
        assert_eq!(config.feed.sections, vec!["posts".to_string()]);
        assert_eq!(config.feed.path, "feed.rss");
        assert_eq!(config.feed.max_items, Some(20));
        assert_eq!(config.theme.defaults.get("author"), "Chuy");
        assert!(!config.minify);
        assert!(config.clean);

        let deploy = file.deploy.unwrap();
        assert_eq!(deploy.provider, Provider::Git);
        assert_eq!(deploy.branch, "gh-pages");
        assert_eq!(deploy.deployer().unwrap().name(), "git");
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = parse("[site]\nname = \"Blog\"\nurl = \"https://example.com\"\n").unwrap();
        let config = file.build_config().unwrap();

        assert_eq!(config.content_dir, PathBuf::from("content"));
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.sections, vec![SectionSpec::new("posts")]);
        assert_eq!(config.feed, FeedConfig::default());
        assert!(config.minify);
        assert!(file.deploy.is_none());
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(parse("[content]\ndir = \"x\"\n").is_err());

        let bad_url = parse("[site]\nname = \"Blog\"\nurl = \"/blog\"\n").unwrap();
        assert!(bad_url.build_config().is_err());

        let bad_feed = parse(
            "[site]\nname = \"Blog\"\nurl = \"https://example.com\"\n[feed]\nsections = [\"apps\"]\n",
        )
        .unwrap();
        let err = bad_feed.build_config().unwrap_err();
        assert!(err.to_string().contains("apps"));
    }

    #[test]
    fn deploy_needs_a_destination() {
        let file = parse(
            "[site]\nname = \"Blog\"\nurl = \"https://example.com\"\n[deploy]\nprovider = \"directory\"\n",
        )
        .unwrap();

        assert!(file.deploy.unwrap().deployer().is_err());
    }
}
