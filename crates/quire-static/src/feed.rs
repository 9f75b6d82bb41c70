//! RSS feed and sitemap generation.
//!
//! Both documents list items in the order the organizer left them: sections
//! in site order, items in section order. Neither contains build timestamps,
//! so identical input yields identical bytes.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quire_content::Item;
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};

use crate::site::{Document, Site};
use crate::templates::tag_slug;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Feed and sitemap settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Sections included in the feed; empty means all
    pub sections: Vec<String>,

    /// Output path of the RSS feed
    pub path: String,

    /// Output path of the sitemap
    pub sitemap_path: String,

    /// Keep only the first N feed entries
    pub max_items: Option<usize>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            path: "feed.rss".to_string(),
            sitemap_path: "sitemap.xml".to_string(),
            max_items: None,
        }
    }
}

/// Errors that can occur while generating feeds.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("RSS validation failed: {0}")]
    Invalid(String),
}

/// Builds the RSS feed, sitemap and robots.txt for a rendered site.
#[derive(Debug, Clone, Default)]
pub struct FeedGenerator {
    config: FeedConfig,
}

impl FeedGenerator {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Items that appear in the feed, in feed order.
    pub fn feed_items<'a>(&self, site: &'a Site) -> Vec<&'a Item> {
        let included = site
            .sections
            .iter()
            .filter(|s| self.config.sections.is_empty() || self.config.sections.contains(&s.id))
            .flat_map(|s| s.items.iter());

        match self.config.max_items {
            Some(max) => included.take(max).collect(),
            None => included.collect(),
        }
    }

    /// Build the RSS 2.0 document.
    pub fn build_feed(&self, site: &Site) -> Result<String, FeedError> {
        let info = &site.info;

        let items: Vec<rss::Item> = self
            .feed_items(site)
            .into_iter()
            .map(|item| {
                let link = info.url_for(&item.path());
                ItemBuilder::default()
                    .title(item.title.clone())
                    .link(Some(link.clone()))
                    .guid(GuidBuilder::default().permalink(true).value(link).build())
                    .description(item.summary())
                    .pub_date(item.date.to_rfc2822())
                    .build()
            })
            .collect();

        let channel = ChannelBuilder::default()
            .title(&info.name)
            .link(info.url.as_str())
            .description(&info.description)
            .language(info.language.clone())
            .generator("quire".to_string())
            .items(items)
            .build();

        channel
            .validate()
            .map_err(|e| FeedError::Invalid(e.to_string()))?;

        Ok(channel.to_string())
    }

    /// Build the sitemap: home page, section pages, tag pages, then every item.
    pub fn build_sitemap(&self, site: &Site) -> String {
        let info = &site.info;
        let mut urls = vec![UrlEntry {
            loc: info.url.to_string(),
            lastmod: site.items().map(|i| i.date).max(),
        }];

        for section in &site.sections {
            urls.push(UrlEntry {
                loc: info.url_for(&section.path()),
                lastmod: section.last_modified(),
            });
        }

        // Tag pages share the renderer's slug rule, newest tagged item wins
        let mut tags: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
        for item in site.items() {
            for slug in item.tags.iter().filter_map(|tag| tag_slug(tag)) {
                let lastmod = tags.entry(slug).or_insert(item.date);
                *lastmod = (*lastmod).max(item.date);
            }
        }
        urls.extend(tags.into_iter().map(|(slug, lastmod)| UrlEntry {
            loc: info.url_for(&format!("tags/{slug}/")),
            lastmod: Some(lastmod),
        }));

        urls.extend(site.items().map(|item| UrlEntry {
            loc: info.url_for(&item.path()),
            lastmod: Some(item.date),
        }));

        let mut xml = String::with_capacity(4096);

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<urlset xmlns=\"");
        xml.push_str(SITEMAP_NS);
        xml.push_str("\">\n");

        for entry in urls {
            xml.push_str("  <url>\n    <loc>");
            xml.push_str(&escape_xml(&entry.loc));
            xml.push_str("</loc>\n");
            if let Some(lastmod) = entry.lastmod {
                xml.push_str("    <lastmod>");
                xml.push_str(&lastmod.format("%Y-%m-%d").to_string());
                xml.push_str("</lastmod>\n");
            }
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }

    /// robots.txt allowing everything and pointing at the sitemap.
    pub fn build_robots(&self, site: &Site) -> String {
        format!(
            "User-agent: *\nAllow: /\nSitemap: {}\n",
            site.info.url_for(&self.config.sitemap_path)
        )
    }

    /// Add the feed document to the site.
    pub fn generate_feed(&self, site: Site) -> Result<Site, FeedError> {
        let feed = self.build_feed(&site)?;
        tracing::info!(
            "Generated feed with {} entries at {}",
            self.feed_items(&site).len(),
            self.config.path
        );
        Ok(site.with_document(Document::new(self.config.path.clone(), feed)))
    }

    /// Add the sitemap and robots.txt to the site.
    pub fn generate_sitemap(&self, site: Site) -> Site {
        let sitemap = self.build_sitemap(&site);
        let robots = self.build_robots(&site);
        tracing::info!("Generated sitemap at {}", self.config.sitemap_path);

        site.with_document(Document::new(self.config.sitemap_path.clone(), sitemap))
            .with_document(Document::new("robots.txt", robots))
    }
}

struct UrlEntry {
    loc: String,
    lastmod: Option<DateTime<Utc>>,
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> Cow<'_, str> {
    // Fast path: check if escaping is needed
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use quire_content::{parse_date, Frontmatter, Metadata, Section};

    use super::*;
    use crate::site::SiteInfo;

    fn item(section: &str, id: &str, date: &str) -> Item {
        let frontmatter = Frontmatter {
            title: format!("Post {id}"),
            date: parse_date(date).unwrap(),
            tags: BTreeSet::new(),
            description: Some(format!("About {id}")),
            metadata: Metadata::new(),
        };
        Item::new(id, section, frontmatter, "", format!("{id}.md"))
    }

    fn site() -> Site {
        let info = SiteInfo::new("Blog", "https://example.com/blog/", "Notes & more", "en").unwrap();
        Site::new(Arc::new(info)).with_sections(vec![
            Section {
                id: "posts".to_string(),
                title: "Posts".to_string(),
                items: vec![
                    item("posts", "c", "2021-09-01"),
                    item("posts", "b", "2021-06-01"),
                    item("posts", "a", "2021-06-01"),
                ],
            },
            Section {
                id: "apps".to_string(),
                title: "Apps".to_string(),
                items: vec![item("apps", "tool", "2022-01-01")],
            },
        ])
    }

    fn entry_links(feed: &str) -> Vec<String> {
        let channel: rss::Channel = feed.parse().unwrap();
        channel
            .items()
            .iter()
            .map(|i| i.link().unwrap().to_string())
            .collect()
    }

    #[test]
    fn feed_preserves_section_and_item_order() {
        let generator = FeedGenerator::default();

        let feed = generator.build_feed(&site()).unwrap();

        assert_eq!(
            entry_links(&feed),
            vec![
                "https://example.com/blog/posts/c/",
                "https://example.com/blog/posts/b/",
                "https://example.com/blog/posts/a/",
                "https://example.com/blog/apps/tool/",
            ]
        );
    }

    #[test]
    fn feed_honors_inclusion_list_and_limit() {
        let generator = FeedGenerator::new(FeedConfig {
            sections: vec!["posts".to_string()],
            max_items: Some(2),
            ..Default::default()
        });

        let feed = generator.build_feed(&site()).unwrap();

        assert_eq!(
            entry_links(&feed),
            vec![
                "https://example.com/blog/posts/c/",
                "https://example.com/blog/posts/b/",
            ]
        );
    }

    #[test]
    fn feed_entries_carry_dates_and_summaries() {
        let feed = FeedGenerator::default().build_feed(&site()).unwrap();
        let channel: rss::Channel = feed.parse().unwrap();

        assert_eq!(channel.title(), "Blog");
        assert_eq!(channel.link(), "https://example.com/blog/");
        let first = &channel.items()[0];
        assert_eq!(first.title(), Some("Post c"));
        assert_eq!(first.description(), Some("About c"));
        let published = DateTime::parse_from_rfc2822(first.pub_date().unwrap()).unwrap();
        assert_eq!(published.with_timezone(&Utc), parse_date("2021-09-01").unwrap());
    }

    #[test]
    fn feed_is_deterministic() {
        let generator = FeedGenerator::default();
        assert_eq!(
            generator.build_feed(&site()).unwrap(),
            generator.build_feed(&site()).unwrap()
        );
    }

    #[test]
    fn sitemap_lists_pages_with_lastmod() {
        let xml = FeedGenerator::default().build_sitemap(&site());

        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#)));
        assert!(xml.contains(
            "<loc>https://example.com/blog/</loc>\n    <lastmod>2022-01-01</lastmod>"
        ));
        assert!(xml.contains(
            "<loc>https://example.com/blog/posts/</loc>\n    <lastmod>2021-09-01</lastmod>"
        ));
        assert!(xml.contains(
            "<loc>https://example.com/blog/posts/a/</loc>\n    <lastmod>2021-06-01</lastmod>"
        ));
        let c = xml.find("/posts/c/").unwrap();
        let a = xml.find("/posts/a/").unwrap();
        assert!(c < a);
    }

    #[test]
    fn sitemap_lists_tag_pages() {
        let mut first = item("posts", "a", "2021-01-01");
        first.tags = ["Swift".to_string(), "#".to_string()].into();
        let mut second = item("posts", "b", "2021-06-01");
        second.tags = ["swift".to_string(), "life".to_string()].into();
        let info = SiteInfo::new("Blog", "https://example.com/", "", "en").unwrap();
        let site = Site::new(Arc::new(info)).with_sections(vec![Section {
            id: "posts".to_string(),
            title: "Posts".to_string(),
            items: vec![second, first],
        }]);

        let xml = FeedGenerator::default().build_sitemap(&site);

        assert!(xml.contains(
            "<loc>https://example.com/tags/life/</loc>\n    <lastmod>2021-06-01</lastmod>"
        ));
        assert!(xml.contains(
            "<loc>https://example.com/tags/swift/</loc>\n    <lastmod>2021-06-01</lastmod>"
        ));
        assert_eq!(xml.matches("/tags/").count(), 2);
        assert!(xml.find("/tags/swift/").unwrap() < xml.find("/posts/b/").unwrap());
    }

    #[test]
    fn adds_documents() {
        let generator = FeedGenerator::default();

        let site = generator.generate_feed(site()).unwrap();
        let site = generator.generate_sitemap(site);

        assert!(site.document("feed.rss").is_some());
        assert!(site.document("sitemap.xml").is_some());
        assert_eq!(
            site.document("robots.txt").unwrap().contents,
            "User-agent: *\nAllow: /\nSitemap: https://example.com/blog/sitemap.xml\n"
        );
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("hello"), "hello");
        assert_eq!(escape_xml("<test>"), "&lt;test&gt;");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("it's"), "it&apos;s");
    }
}
