//! Static site builder.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use quire_content::{Metadata, SectionSpec};

use crate::deploy::Deployer;
use crate::feed::{FeedConfig, FeedGenerator};
use crate::pipeline::{CancelFlag, Pipeline, PipelineError, Step};
use crate::plugins::{self, BUILTIN_PLUGINS};
use crate::publisher::Publisher;
use crate::renderer::Renderer;
use crate::site::{Site, SiteInfo};
use crate::steps::{
    Deploy, GenerateHtml, GenerateRssFeed, GenerateSiteMap, LoadContent, Publish, SortItems,
};
use crate::templates::{MinijinjaTheme, Theme, ThemeError};

/// Theme selection and template defaults.
#[derive(Debug, Clone, Default)]
pub struct ThemeConfig {
    /// Directory overriding the built-in templates
    pub dir: Option<PathBuf>,

    /// Metadata values used when an item does not set them
    pub defaults: Metadata,
}

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub site: SiteInfo,

    /// Markdown source directory
    pub content_dir: PathBuf,

    /// Files copied verbatim into the output
    pub resources_dir: Option<PathBuf>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Declared sections, in display order
    pub sections: Vec<SectionSpec>,

    pub feed: FeedConfig,

    pub theme: ThemeConfig,

    /// Plugin names, applied in order
    pub plugins: Vec<String>,

    /// Minify the stylesheet
    pub minify: bool,

    /// Remove previous output before publishing
    pub clean: bool,
}

impl BuildConfig {
    /// Defaults for everything except the site metadata.
    pub fn new(site: SiteInfo) -> Self {
        Self {
            site,
            content_dir: PathBuf::from("content"),
            resources_dir: Some(PathBuf::from("resources")),
            output_dir: PathBuf::from("public"),
            sections: vec![SectionSpec::new("posts")],
            feed: FeedConfig::default(),
            theme: ThemeConfig::default(),
            plugins: Vec::new(),
            minify: true,
            clean: true,
        }
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::NoSections);
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            if RESERVED_SECTIONS.contains(&section.id.as_str()) {
                return Err(ConfigError::ReservedSection(section.id.clone()));
            }
            if !seen.insert(section.id.as_str()) {
                return Err(ConfigError::DuplicateSection(section.id.clone()));
            }
        }

        if let Some(unknown) = self
            .feed
            .sections
            .iter()
            .find(|id| !seen.contains(id.as_str()))
        {
            return Err(ConfigError::UnknownFeedSection(unknown.clone()));
        }

        if let Some(unknown) = self
            .plugins
            .iter()
            .find(|name| !BUILTIN_PLUGINS.contains(&name.as_str()))
        {
            return Err(ConfigError::UnknownPlugin(unknown.clone()));
        }

        Ok(())
    }
}

/// Output directories owned by generated pages.
const RESERVED_SECTIONS: &[&str] = &["tags"];

/// Invalid build configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No sections declared")]
    NoSections,

    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),

    #[error("Feed includes undeclared section: {0}")]
    UnknownFeedSection(String),

    #[error("Section id '{0}' is reserved for generated pages")]
    ReservedSection(String),

    #[error("Unknown plugin '{0}' (available: {available})", available = BUILTIN_PLUGINS.join(", "))]
    UnknownPlugin(String),

    #[error("Failed to load theme: {0}")]
    Theme(#[from] ThemeError),
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of item pages generated
    pub pages: usize,

    /// Number of other generated documents
    pub documents: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,

    pub deployed: bool,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Build task failed: {0}")]
    Interrupted(String),
}

/// Static site builder.
pub struct StaticBuilder {
    config: Arc<BuildConfig>,
    cancel: CancelFlag,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: CancelFlag::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Flag that stops the build between steps and between written files.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Assemble the step list. A deploy step is appended when `deployer` is set.
    pub fn pipeline(&self, deployer: Option<Arc<dyn Deployer>>) -> Result<Pipeline, BuildError> {
        let config = &self.config;
        config.validate()?;

        let theme: Arc<dyn Theme> = match &config.theme.dir {
            Some(dir) => Arc::new(MinijinjaTheme::from_dir(dir).map_err(ConfigError::from)?),
            None => Arc::new(MinijinjaTheme::new()),
        };

        let mut renderer = Renderer::new(theme)
            .with_defaults(config.theme.defaults.clone())
            .with_feed_path(config.feed.path.clone())
            .with_minify(config.minify);
        for name in &config.plugins {
            let plugin = plugins::builtin(name, &config.site)
                .ok_or_else(|| ConfigError::UnknownPlugin(name.clone()))?;
            renderer = renderer.with_plugin(plugin);
        }

        let feed = FeedGenerator::new(config.feed.clone());
        let publisher = Publisher::new(&config.output_dir).with_clean(config.clean);

        let mut steps: Vec<Box<dyn Step>> = vec![
            Box::new(LoadContent::new(&config.content_dir, config.sections.clone())),
            Box::new(SortItems::new(config.sections.clone())),
            Box::new(GenerateHtml::new(renderer)),
            Box::new(GenerateRssFeed::new(feed.clone())),
            Box::new(GenerateSiteMap::new(feed)),
            Box::new(Publish::new(publisher, config.resources_dir.clone())),
        ];
        if let Some(deployer) = deployer {
            steps.push(Box::new(Deploy::new(deployer, &config.output_dir)));
        }

        Ok(Pipeline::new(steps).with_cancel_flag(self.cancel.clone()))
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        self.run(None).await
    }

    /// Build the site, then hand the output to `deployer`.
    pub async fn deploy(&self, deployer: Arc<dyn Deployer>) -> Result<BuildResult, BuildError> {
        self.run(Some(deployer)).await
    }

    async fn run(&self, deployer: Option<Arc<dyn Deployer>>) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let deployed = deployer.is_some();

        let mut pipeline = self.pipeline(deployer)?;
        let site = Site::new(Arc::new(self.config.site.clone()));

        // Steps do blocking file I/O and rayon work
        let site = tokio::task::spawn_blocking(move || pipeline.run(site))
            .await
            .map_err(|e| BuildError::Interrupted(e.to_string()))??;

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: site.items().count(),
            documents: site.documents.len(),
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
            deployed,
        })
    }
}
