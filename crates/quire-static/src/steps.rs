//! The standard build steps.

use std::path::PathBuf;
use std::sync::Arc;

use quire_content::{load_sections, organize, SectionSpec};

use crate::deploy::Deployer;
use crate::feed::FeedGenerator;
use crate::pipeline::{CancelFlag, Step, StepError};
use crate::publisher::{PublishPlan, Publisher};
use crate::renderer::Renderer;
use crate::site::Site;

/// Reads markdown files into the declared sections.
pub struct LoadContent {
    content_dir: PathBuf,
    sections: Vec<SectionSpec>,
}

impl LoadContent {
    pub const NAME: &'static str = "add-markdown-files";

    pub fn new(content_dir: impl Into<PathBuf>, sections: Vec<SectionSpec>) -> Self {
        Self {
            content_dir: content_dir.into(),
            sections,
        }
    }
}

impl Step for LoadContent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        let sections = load_sections(&self.content_dir, &self.sections)?;
        Ok(site.with_sections(sections))
    }
}

/// Orders each section by its sort rule.
pub struct SortItems {
    sections: Vec<SectionSpec>,
}

impl SortItems {
    pub const NAME: &'static str = "sort-items";

    pub fn new(sections: Vec<SectionSpec>) -> Self {
        Self { sections }
    }
}

impl Step for SortItems {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        let Site {
            info,
            sections,
            documents,
        } = site;

        Ok(Site {
            info,
            sections: organize(sections, &self.sections),
            documents,
        })
    }
}

pub struct GenerateHtml {
    renderer: Renderer,
}

impl GenerateHtml {
    pub const NAME: &'static str = "generate-html";

    pub fn new(renderer: Renderer) -> Self {
        Self { renderer }
    }
}

impl Step for GenerateHtml {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        Ok(self.renderer.render_site(site)?)
    }
}

pub struct GenerateRssFeed {
    generator: FeedGenerator,
}

impl GenerateRssFeed {
    pub const NAME: &'static str = "generate-rss-feed";

    pub fn new(generator: FeedGenerator) -> Self {
        Self { generator }
    }
}

impl Step for GenerateRssFeed {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        Ok(self.generator.generate_feed(site)?)
    }
}

/// Adds `sitemap.xml` and `robots.txt`.
pub struct GenerateSiteMap {
    generator: FeedGenerator,
}

impl GenerateSiteMap {
    pub const NAME: &'static str = "generate-site-map";

    pub fn new(generator: FeedGenerator) -> Self {
        Self { generator }
    }
}

impl Step for GenerateSiteMap {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        Ok(self.generator.generate_sitemap(site))
    }
}

/// Writes resources and generated files to the output directory.
pub struct Publish {
    publisher: Publisher,
    resources_dir: Option<PathBuf>,
}

impl Publish {
    pub const NAME: &'static str = "publish";

    pub fn new(publisher: Publisher, resources_dir: Option<PathBuf>) -> Self {
        Self {
            publisher,
            resources_dir,
        }
    }
}

impl Step for Publish {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, cancel: &CancelFlag) -> Result<Site, StepError> {
        let plan = PublishPlan::from_site(&site, self.resources_dir.as_deref())?;
        self.publisher.publish(plan, cancel)?;
        Ok(site)
    }
}

/// Hands the published output directory to a deployer.
pub struct Deploy {
    deployer: Arc<dyn Deployer>,
    output_dir: PathBuf,
}

impl Deploy {
    pub const NAME: &'static str = "deploy";

    pub fn new(deployer: Arc<dyn Deployer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            deployer,
            output_dir: output_dir.into(),
        }
    }
}

impl Step for Deploy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, site: Site, _cancel: &CancelFlag) -> Result<Site, StepError> {
        tracing::info!("Deploying with {}", self.deployer.name());
        self.deployer.deploy(&self.output_dir)?;
        Ok(site)
    }
}
