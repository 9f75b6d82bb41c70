//! Static site generation for quire blogs.
//!
//! Renders loaded content through a theme, generates the RSS feed and sitemap,
//! publishes the output tree and optionally deploys it. The whole build runs
//! as an ordered [`Pipeline`] of steps.

pub mod assets;
pub mod builder;
pub mod deploy;
pub mod feed;
pub mod pipeline;
pub mod plugins;
pub mod publisher;
pub mod renderer;
pub mod site;
pub mod steps;
pub mod templates;

pub use builder::{
    BuildConfig, BuildError, BuildResult, ConfigError, StaticBuilder, ThemeConfig,
};
pub use deploy::{DeployError, Deployer, DirectoryDeployer, GitDeployer};
pub use feed::{FeedConfig, FeedError, FeedGenerator};
pub use pipeline::{
    CancelFlag, FnStep, Pipeline, PipelineError, PipelineState, Step, StepError,
};
pub use plugins::{Plugin, PluginError};
pub use publisher::{PublishError, PublishPlan, PublishReport, Publisher};
pub use renderer::{RenderError, Renderer};
pub use site::{Document, Site, SiteError, SiteInfo};
pub use templates::{MinijinjaTheme, Theme, ThemeError};
