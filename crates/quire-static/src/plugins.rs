//! Plugins that post-process rendered item fragments.
//!
//! Plugins run in the order they were installed, after markdown conversion and
//! before the theme wraps the fragment into a page.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use quire_content::{slugify, Item};
use regex::{Captures, Regex};

use crate::site::SiteInfo;

/// A transformation applied to every item's HTML fragment.
pub trait Plugin: Send + Sync {
    /// Plugin identifier, as used in configuration
    fn name(&self) -> &str;

    /// Transform the fragment rendered for `item`.
    fn transform(&self, item: &Item, html: String) -> Result<String, PluginError>;
}

/// A plugin failed on an item.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PluginError(pub String);

/// Names of the built-in plugins.
pub const BUILTIN_PLUGINS: &[&str] = &[HeadingAnchors::NAME, ExternalLinks::NAME];

/// Look up a built-in plugin by name.
pub fn builtin(name: &str, site: &SiteInfo) -> Option<Arc<dyn Plugin>> {
    match name {
        HeadingAnchors::NAME => Some(Arc::new(HeadingAnchors)),
        ExternalLinks::NAME => Some(Arc::new(ExternalLinks::new(site))),
        _ => None,
    }
}

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h([1-6])>(.*?)</h[1-6]>").expect("valid heading regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="(https?://[^"]*)"([^>]*)>"#).expect("valid link regex"));

/// Adds slug `id` attributes to headings that have none.
///
/// Repeated headings get `-1`, `-2`, ... suffixes.
pub struct HeadingAnchors;

impl HeadingAnchors {
    pub const NAME: &'static str = "heading-anchors";
}

impl Plugin for HeadingAnchors {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, _item: &Item, html: String) -> Result<String, PluginError> {
        let mut used = HashSet::new();

        let result = HEADING_RE.replace_all(&html, |caps: &Captures| {
            let level = &caps[1];
            let inner = &caps[2];
            let text = TAG_RE.replace_all(inner, "");
            let base = match slugify(&text) {
                slug if slug.is_empty() => "section".to_string(),
                slug => slug,
            };

            let mut id = base.clone();
            let mut n = 1;
            while !used.insert(id.clone()) {
                id = format!("{base}-{n}");
                n += 1;
            }

            format!(r#"<h{level} id="{id}">{inner}</h{level}>"#)
        });

        Ok(result.into_owned())
    }
}

/// Opens links that leave the site in a new tab.
pub struct ExternalLinks {
    site_url: String,
}

impl ExternalLinks {
    pub const NAME: &'static str = "external-links";

    pub fn new(site: &SiteInfo) -> Self {
        Self {
            site_url: site.url.to_string(),
        }
    }
}

impl Plugin for ExternalLinks {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, _item: &Item, html: String) -> Result<String, PluginError> {
        let result = LINK_RE.replace_all(&html, |caps: &Captures| {
            let href = &caps[1];
            let rest = &caps[2];
            if href.starts_with(&self.site_url) {
                caps[0].to_string()
            } else {
                format!(r#"<a href="{href}"{rest} target="_blank" rel="noopener noreferrer">"#)
            }
        });

        Ok(result.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use quire_content::{parse_date, Frontmatter, Metadata};

    use super::*;

    fn item() -> Item {
        let frontmatter = Frontmatter {
            title: "T".to_string(),
            date: parse_date("2021-01-01").unwrap(),
            tags: BTreeSet::new(),
            description: None,
            metadata: Metadata::new(),
        };
        Item::new("t", "posts", frontmatter, "", "t.md")
    }

    fn site() -> SiteInfo {
        SiteInfo::new("Blog", "https://example.com/", "", "en").unwrap()
    }

    #[test]
    fn adds_heading_ids() {
        let html = "<h1>Hello <em>World</em></h1>\n<p>x</p>\n<h2>Hello World</h2>\n<h2>!!</h2>".to_string();

        let out = HeadingAnchors.transform(&item(), html).unwrap();

        assert_eq!(
            out,
            "<h1 id=\"hello-world\">Hello <em>World</em></h1>\n<p>x</p>\n\
             <h2 id=\"hello-world-1\">Hello World</h2>\n<h2 id=\"section\">!!</h2>"
        );
    }

    #[test]
    fn marks_only_external_links() {
        let html = r#"<a href="https://example.com/posts/a/">in</a> <a href="https://swift.org">out</a> <a href="/about/">rel</a>"#.to_string();

        let out = ExternalLinks::new(&site()).transform(&item(), html).unwrap();

        assert_eq!(
            out,
            r#"<a href="https://example.com/posts/a/">in</a> <a href="https://swift.org" target="_blank" rel="noopener noreferrer">out</a> <a href="/about/">rel</a>"#
        );
    }

    #[test]
    fn keeps_titles_on_external_links() {
        let html = crate::renderer::render_markdown(
            r#"[Swift](https://swift.org/?lang=en&v=5 "Swift home")"#,
        );

        let out = ExternalLinks::new(&site()).transform(&item(), html).unwrap();

        assert_eq!(
            out.trim(),
            r#"<p><a href="https://swift.org/?lang=en&amp;v=5" title="Swift home" target="_blank" rel="noopener noreferrer">Swift</a></p>"#
        );
    }

    #[test]
    fn resolves_builtin_names() {
        for name in BUILTIN_PLUGINS {
            assert_eq!(builtin(name, &site()).unwrap().name(), *name);
        }
        assert!(builtin("splash", &site()).is_none());
    }
}
