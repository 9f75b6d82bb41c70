//! Content items and the sections that group them.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::Deserialize;

use crate::frontmatter::Frontmatter;
use crate::metadata::Metadata;
use crate::organizer::SortSpec;

/// A declared section of the site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionSpec {
    /// Section id, also the content subdirectory and URL prefix
    pub id: String,

    /// Display title (defaults to the capitalized id)
    #[serde(default)]
    pub title: Option<String>,

    /// Ordering applied to the section's items
    #[serde(default)]
    pub sort: SortSpec,
}

impl SectionSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            sort: SortSpec::default(),
        }
    }

    /// Display title, falling back to the capitalized id.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| capitalize(&self.id))
    }
}

/// A loaded section and its items, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub items: Vec<Item>,
}

impl Section {
    /// URL path of the section index, relative to the site root.
    pub fn path(&self) -> String {
        format!("{}/", self.id)
    }

    /// Date of the newest item, if any.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.date).max()
    }
}

/// A single piece of content, typically a post.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Path of the source file relative to its section directory, without extension
    pub id: String,

    /// Id of the owning section
    pub section: String,

    pub title: String,
    pub date: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub description: Option<String>,
    pub metadata: Metadata,

    /// Markdown body without the frontmatter block
    pub raw_body: String,

    /// File the item was loaded from
    pub source_path: PathBuf,

    rendered_html: Option<String>,
}

impl Item {
    /// Build an item from parsed frontmatter and body.
    pub fn new(
        id: impl Into<String>,
        section: impl Into<String>,
        frontmatter: Frontmatter,
        raw_body: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            section: section.into(),
            title: frontmatter.title,
            date: frontmatter.date,
            tags: frontmatter.tags,
            description: frontmatter.description,
            metadata: frontmatter.metadata,
            raw_body: raw_body.into(),
            source_path: source_path.into(),
            rendered_html: None,
        }
    }

    /// The rendered HTML document, once the renderer has run.
    pub fn rendered_html(&self) -> Option<&str> {
        self.rendered_html.as_deref()
    }

    /// Return this item with its rendered HTML set. Nothing else changes.
    pub fn with_rendered_html(mut self, html: String) -> Self {
        self.rendered_html = Some(html);
        self
    }

    /// URL path relative to the site root, e.g. `posts/hello-world/`.
    pub fn path(&self) -> String {
        format!("{}/{}/", self.section, self.id)
    }

    /// Output file path relative to the output root.
    pub fn output_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.section);
        for segment in self.id.split('/') {
            path.push(segment);
        }
        path.join("index.html")
    }

    /// Description, or the text of the first paragraph of the body.
    pub fn summary(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => summarize(&self.raw_body),
        }
    }
}

/// Plain text of the first paragraph of a markdown document.
pub fn summarize(markdown: &str) -> String {
    let mut text = String::new();
    let mut in_paragraph = false;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Paragraph) => in_paragraph = true,
            Event::End(TagEnd::Paragraph) => break,
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }

    text.trim().to_string()
}

/// Convert text to a URL-safe slug.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_date;

    fn item(id: &str, description: Option<&str>, body: &str) -> Item {
        let frontmatter = Frontmatter {
            title: "Title".to_string(),
            date: parse_date("2021-01-01").unwrap(),
            tags: BTreeSet::new(),
            description: description.map(str::to_string),
            metadata: Metadata::new(),
        };
        Item::new(id, "posts", frontmatter, body, "content/posts/x.md")
    }

    #[test]
    fn derives_paths_from_section_and_id() {
        let item = item("2021/hello", None, "");

        assert_eq!(item.path(), "posts/2021/hello/");
        assert_eq!(
            item.output_path(),
            PathBuf::from("posts").join("2021").join("hello").join("index.html")
        );
    }

    #[test]
    fn rendering_only_sets_html() {
        let original = item("hello", None, "body");
        let rendered = original.clone().with_rendered_html("<p>body</p>".to_string());

        assert_eq!(original.rendered_html(), None);
        assert_eq!(rendered.rendered_html(), Some("<p>body</p>"));
        assert_eq!(rendered.raw_body, original.raw_body);
        assert_eq!(rendered.title, original.title);
    }

    #[test]
    fn summary_prefers_description() {
        let item = item("a", Some("Short"), "First paragraph.");
        assert_eq!(item.summary(), "Short");
    }

    #[test]
    fn summary_falls_back_to_first_paragraph() {
        let item = item("a", None, "# Heading\n\nFirst *para*\ngraph with `code`.\n\nSecond.");
        assert_eq!(item.summary(), "First para graph with code.");
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Swift Publish"), "swift-publish");
        assert_eq!(slugify("Button (Primary)"), "button-primary");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }

    #[test]
    fn section_title_defaults_to_id() {
        assert_eq!(SectionSpec::new("posts").display_title(), "Posts");
    }
}
