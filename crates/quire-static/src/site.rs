//! The site value passed between pipeline steps.

use std::sync::Arc;

use quire_content::{Item, Section};
use url::Url;

/// Site-wide metadata. Created once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub name: String,
    /// Absolute base URL, always ending in `/`
    pub url: Url,
    pub description: String,
    pub language: String,
}

impl SiteInfo {
    /// Create site info, validating that `url` is an absolute http(s) URL.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        description: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, SiteError> {
        let mut parsed = Url::parse(url).map_err(|e| SiteError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(SiteError::InvalidUrl {
                url: url.to_string(),
                message: "expected an absolute http or https URL".to_string(),
            });
        }

        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        parsed.set_query(None);
        parsed.set_fragment(None);

        Ok(Self {
            name: name.into(),
            url: parsed,
            description: description.into(),
            language: language.into(),
        })
    }

    /// Path component of the base URL, e.g. `/blog/`.
    pub fn base_path(&self) -> &str {
        self.url.path()
    }

    /// Root-relative URL for a site path, e.g. `posts/a/` -> `/blog/posts/a/`.
    pub fn path_for(&self, path: &str) -> String {
        format!("{}{}", self.base_path(), path.trim_start_matches('/'))
    }

    /// Absolute URL for a site path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path.trim_start_matches('/'))
    }
}

/// Errors in site metadata.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Invalid site URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// A generated output that is not an item page (index pages, feeds, stylesheets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Output-relative path, `/` separated
    pub path: String,
    pub contents: String,
}

impl Document {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// The whole site as it moves through the pipeline.
///
/// Steps take a site by value and hand back a new one.
#[derive(Debug, Clone)]
pub struct Site {
    pub info: Arc<SiteInfo>,
    pub sections: Vec<Section>,
    pub documents: Vec<Document>,
}

impl Site {
    /// An empty site with no content loaded yet.
    pub fn new(info: Arc<SiteInfo>) -> Self {
        Self {
            info,
            sections: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn with_sections(self, sections: Vec<Section>) -> Self {
        Self { sections, ..self }
    }

    /// Return the site with `document` added, replacing any document at the same path.
    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.retain(|d| d.path != document.path);
        self.documents.push(document);
        self
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn document(&self, path: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.path == path)
    }

    /// All items, section by section, in order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_base_url() {
        let info = SiteInfo::new("Blog", "https://chuy.github.io/blog", "", "en").unwrap();

        assert_eq!(info.url.as_str(), "https://chuy.github.io/blog/");
        assert_eq!(info.base_path(), "/blog/");
        assert_eq!(info.path_for("posts/a/"), "/blog/posts/a/");
        assert_eq!(info.url_for("posts/a/"), "https://chuy.github.io/blog/posts/a/");
    }

    #[test]
    fn rejects_relative_urls() {
        assert!(SiteInfo::new("Blog", "/blog/", "", "en").is_err());
        assert!(SiteInfo::new("Blog", "mailto:me@example.com", "", "en").is_err());
    }

    #[test]
    fn replaces_documents_by_path() {
        let info = Arc::new(SiteInfo::new("Blog", "https://example.com", "", "en").unwrap());

        let site = Site::new(info)
            .with_document(Document::new("feed.rss", "one"))
            .with_document(Document::new("feed.rss", "two"));

        assert_eq!(site.documents.len(), 1);
        assert_eq!(site.document("feed.rss").unwrap().contents, "two");
    }
}
