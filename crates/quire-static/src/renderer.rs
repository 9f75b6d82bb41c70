//! Markdown rendering and theme application.

use std::collections::BTreeMap;
use std::sync::Arc;

use pulldown_cmark::{html, Options, Parser};
use quire_content::{Item, Metadata, Section};
use rayon::prelude::*;

use crate::assets::AssetPipeline;
use crate::plugins::{Plugin, PluginError};
use crate::site::{Document, Site, SiteInfo};
use crate::templates::{
    tag_slug, ItemContext, SectionContext, SiteContext, TagContext, Theme, ThemeError,
};

/// Errors that can occur while rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to render {page}: {source}")]
    Template {
        page: String,
        #[source]
        source: ThemeError,
    },

    #[error("Plugin '{plugin}' failed on {item}: {source}")]
    Plugin {
        plugin: String,
        item: String,
        #[source]
        source: PluginError,
    },
}

/// Convert markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}

/// Renders items and listing pages through a theme.
#[derive(Clone)]
pub struct Renderer {
    theme: Arc<dyn Theme>,
    plugins: Vec<Arc<dyn Plugin>>,
    defaults: Metadata,
    feed_path: String,
    minify: bool,
}

impl Renderer {
    pub fn new(theme: Arc<dyn Theme>) -> Self {
        Self {
            theme,
            plugins: Vec::new(),
            defaults: Metadata::new(),
            feed_path: "feed.rss".to_string(),
            minify: false,
        }
    }

    /// Install a plugin. Plugins run in installation order.
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Metadata values templates see when an item does not set them.
    pub fn with_defaults(mut self, defaults: Metadata) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_feed_path(mut self, feed_path: impl Into<String>) -> Self {
        self.feed_path = feed_path.into();
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Render an item's body and run every plugin over it.
    pub fn render_fragment(&self, item: &Item) -> Result<String, RenderError> {
        self.plugins
            .iter()
            .try_fold(render_markdown(&item.raw_body), |html, plugin| {
                plugin
                    .transform(item, html)
                    .map_err(|source| RenderError::Plugin {
                        plugin: plugin.name().to_string(),
                        item: page_name(item),
                        source,
                    })
            })
    }

    /// Render every item and listing page of `site`.
    ///
    /// Items get their full HTML document; listing pages and the stylesheet are
    /// added as documents. Item order is preserved.
    pub fn render_site(&self, site: Site) -> Result<Site, RenderError> {
        let Site {
            info,
            sections,
            documents,
        } = site;
        let site_ctx = SiteContext::new(&info, &sections, &self.feed_path);

        let mut rendered_sections = Vec::with_capacity(sections.len());
        let mut listings = Vec::with_capacity(sections.len());
        let mut item_count = 0;

        for section in sections {
            let Section { id, title, items } = section;

            let results: Vec<Result<(Item, ItemContext), RenderError>> = items
                .into_par_iter()
                .map(|item| self.render_item(&info, &site_ctx, item))
                .collect();
            let (items, contexts): (Vec<_>, Vec<_>) = results
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .unzip();

            item_count += items.len();
            listings.push(SectionContext {
                id: id.clone(),
                title: title.clone(),
                url: info.path_for(&format!("{id}/")),
                items: contexts,
            });
            rendered_sections.push(Section { id, title, items });
        }

        let mut site = Site {
            info: Arc::clone(&info),
            sections: rendered_sections,
            documents,
        };

        for listing in &listings {
            let html = self
                .theme
                .render_section(&site_ctx, listing)
                .map_err(|source| RenderError::Template {
                    page: format!("{}/", listing.id),
                    source,
                })?;
            site = site.with_document(Document::new(format!("{}/index.html", listing.id), html));
        }

        let index = self
            .theme
            .render_index(&site_ctx, &listings)
            .map_err(|source| RenderError::Template {
                page: "index".to_string(),
                source,
            })?;
        site = site.with_document(Document::new("index.html", index));

        for tag in collect_tags(&info, &listings) {
            let html = self
                .theme
                .render_tag(&site_ctx, &tag)
                .map_err(|source| RenderError::Template {
                    page: format!("tags/{}/", tag.slug),
                    source,
                })?;
            site = site.with_document(Document::new(format!("tags/{}/index.html", tag.slug), html));
        }

        if let Some(css) = self.theme.stylesheet() {
            let css = AssetPipeline::prepare_css(css, self.minify);
            site = site.with_document(Document::new("styles.css", css));
        }

        tracing::info!(
            "Rendered {} items with theme '{}'",
            item_count,
            self.theme.name()
        );

        Ok(site)
    }

    fn render_item(
        &self,
        info: &SiteInfo,
        site_ctx: &SiteContext,
        item: Item,
    ) -> Result<(Item, ItemContext), RenderError> {
        let fragment = self.render_fragment(&item)?;
        let ctx = ItemContext::new(info, &item, fragment, &self.defaults);

        let html = self
            .theme
            .render_item(site_ctx, &ctx)
            .map_err(|source| RenderError::Template {
                page: page_name(&item),
                source,
            })?;

        tracing::debug!("Rendered {}", page_name(&item));

        Ok((item.with_rendered_html(html), ctx))
    }
}

fn page_name(item: &Item) -> String {
    format!("{}/{}", item.section, item.id)
}

/// Group item contexts by tag slug, in slug order. Items keep their listing order.
///
/// Tags without a slug get no page.
fn collect_tags(info: &SiteInfo, listings: &[SectionContext]) -> Vec<TagContext> {
    let mut tags: BTreeMap<String, TagContext> = BTreeMap::new();

    for item in listings.iter().flat_map(|l| l.items.iter()) {
        for tag in &item.tags {
            let Some(slug) = tag_slug(&tag.name) else {
                continue;
            };
            tags.entry(slug.clone())
                .or_insert_with(|| TagContext {
                    name: tag.name.clone(),
                    url: info.path_for(&format!("tags/{slug}/")),
                    slug,
                    items: Vec::new(),
                })
                .items
                .push(item.clone());
        }
    }

    tags.into_values().collect()
}
