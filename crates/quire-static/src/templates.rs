//! Themes and the template contexts they render.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::{context, Environment, ErrorKind, UndefinedBehavior};
use quire_content::{slugify, Item, Metadata, Section};
use serde::Serialize;

use crate::assets::AssetPipeline;
use crate::site::SiteInfo;

/// A link to a section, used for site navigation.
#[derive(Debug, Clone, Serialize)]
pub struct SectionLink {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Site-wide values available to every template as `site`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteContext {
    pub name: String,
    pub url: String,
    pub description: String,
    pub language: String,
    /// Root-relative prefix for links, e.g. `/blog/`
    pub base_path: String,
    pub feed_url: String,
    pub sections: Vec<SectionLink>,
}

impl SiteContext {
    pub fn new(info: &SiteInfo, sections: &[Section], feed_path: &str) -> Self {
        Self {
            name: info.name.clone(),
            url: info.url.to_string(),
            description: info.description.clone(),
            language: info.language.clone(),
            base_path: info.base_path().to_string(),
            feed_url: info.path_for(feed_path),
            sections: sections
                .iter()
                .map(|s| SectionLink {
                    id: s.id.clone(),
                    title: s.title.clone(),
                    url: info.path_for(&s.path()),
                })
                .collect(),
        }
    }
}

/// A tag name and the URL of its page.
#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

/// An item as seen by templates.
#[derive(Debug, Clone, Serialize)]
pub struct ItemContext {
    pub id: String,
    pub section: String,
    pub title: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// e.g. `June 1, 2021`
    pub date_display: String,
    /// RFC 3339 timestamp
    pub datetime: String,
    pub tags: Vec<TagLink>,
    pub description: Option<String>,
    pub summary: String,
    pub url: String,
    /// Rendered HTML fragment of the body
    pub content: String,
    /// Frontmatter metadata merged over the theme defaults
    pub metadata: Metadata,
}

impl ItemContext {
    pub fn new(info: &SiteInfo, item: &Item, content: String, defaults: &Metadata) -> Self {
        Self {
            id: item.id.clone(),
            section: item.section.clone(),
            title: item.title.clone(),
            date: item.date.format("%Y-%m-%d").to_string(),
            date_display: item.date.format("%B %-d, %Y").to_string(),
            datetime: item.date.to_rfc3339(),
            tags: item
                .tags
                .iter()
                .filter_map(|tag| {
                    let path = tag_path(tag)?;
                    Some(TagLink {
                        name: tag.clone(),
                        url: info.path_for(&path),
                    })
                })
                .collect(),
            description: item.description.clone(),
            summary: item.summary(),
            url: info.path_for(&item.path()),
            content,
            metadata: item.metadata.with_defaults(defaults),
        }
    }
}

/// A section listing.
#[derive(Debug, Clone, Serialize)]
pub struct SectionContext {
    pub id: String,
    pub title: String,
    pub url: String,
    pub items: Vec<ItemContext>,
}

/// A tag listing.
#[derive(Debug, Clone, Serialize)]
pub struct TagContext {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub items: Vec<ItemContext>,
}

/// Slug of a tag page, or `None` when the tag has no sluggable characters.
pub fn tag_slug(tag: &str) -> Option<String> {
    Some(slugify(tag)).filter(|slug| !slug.is_empty())
}

/// URL path of a tag page relative to the site root.
pub fn tag_path(tag: &str) -> Option<String> {
    tag_slug(tag).map(|slug| format!("tags/{slug}/"))
}

/// A theme turns template contexts into complete HTML documents.
pub trait Theme: Send + Sync {
    /// Theme identifier
    fn name(&self) -> &str;

    /// Render an item page. Implementations may choose the template by `item.section`.
    fn render_item(&self, site: &SiteContext, item: &ItemContext) -> Result<String, ThemeError>;

    fn render_section(
        &self,
        site: &SiteContext,
        section: &SectionContext,
    ) -> Result<String, ThemeError>;

    /// Render the home page.
    fn render_index(
        &self,
        site: &SiteContext,
        sections: &[SectionContext],
    ) -> Result<String, ThemeError>;

    fn render_tag(&self, site: &SiteContext, tag: &TagContext) -> Result<String, ThemeError>;

    /// Stylesheet published as `styles.css`, if the theme has one.
    fn stylesheet(&self) -> Option<String> {
        None
    }
}

/// A template failed to load or render.
#[derive(Debug, thiserror::Error)]
#[error("{template}: {message}")]
pub struct ThemeError {
    pub template: String,
    pub message: String,
}

impl ThemeError {
    fn new(template: &str, err: impl std::fmt::Display) -> Self {
        Self {
            template: template.to_string(),
            message: err.to_string(),
        }
    }
}

/// Template-based theme using minijinja.
///
/// Ships with built-in templates. A theme directory can override any of them
/// by file name, and can add per-section templates such as `posts/item.html`.
/// Undefined values are errors, so a template that reads a missing field fails.
pub struct MinijinjaTheme {
    name: String,
    env: Environment<'static>,
    stylesheet: String,
}

impl MinijinjaTheme {
    /// Create the built-in default theme.
    pub fn new() -> Self {
        Self::build("default".to_string(), None, AssetPipeline::generate_css())
    }

    /// Load a theme from a directory, falling back to built-in templates.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self, ThemeError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ThemeError::new(
                &dir.display().to_string(),
                "theme directory not found",
            ));
        }

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("custom")
            .to_string();

        let stylesheet = match fs::read_to_string(dir.join("styles.css")) {
            Ok(css) => css,
            Err(e) if e.kind() == io::ErrorKind::NotFound => AssetPipeline::generate_css(),
            Err(e) => return Err(ThemeError::new("styles.css", e)),
        };

        tracing::info!("Using theme '{}' from {}", name, dir.display());

        Ok(Self::build(name, Some(dir), stylesheet))
    }

    fn build(name: String, dir: Option<PathBuf>, stylesheet: String) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_loader(move |template| load_template(dir.as_deref(), template));

        Self {
            name,
            env,
            stylesheet,
        }
    }

    /// Render `preferred` if the theme has it, otherwise `fallback`.
    fn render_with<S: Serialize>(
        &self,
        preferred: &str,
        fallback: &str,
        ctx: S,
    ) -> Result<String, ThemeError> {
        let (name, template) = match self.env.get_template(preferred) {
            Ok(template) => (preferred, template),
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => {
                let template = self
                    .env
                    .get_template(fallback)
                    .map_err(|e| ThemeError::new(fallback, e))?;
                (fallback, template)
            }
            Err(e) => return Err(ThemeError::new(preferred, e)),
        };

        template.render(ctx).map_err(|e| ThemeError::new(name, e))
    }
}

impl Default for MinijinjaTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Theme for MinijinjaTheme {
    fn name(&self) -> &str {
        &self.name
    }

    fn render_item(&self, site: &SiteContext, item: &ItemContext) -> Result<String, ThemeError> {
        self.render_with(
            &format!("{}/item.html", item.section),
            "item.html",
            context! { site => site, item => item },
        )
    }

    fn render_section(
        &self,
        site: &SiteContext,
        section: &SectionContext,
    ) -> Result<String, ThemeError> {
        self.render_with(
            &format!("{}/section.html", section.id),
            "section.html",
            context! { site => site, section => section },
        )
    }

    fn render_index(
        &self,
        site: &SiteContext,
        sections: &[SectionContext],
    ) -> Result<String, ThemeError> {
        self.render_with(
            "index.html",
            "index.html",
            context! { site => site, sections => sections },
        )
    }

    fn render_tag(&self, site: &SiteContext, tag: &TagContext) -> Result<String, ThemeError> {
        self.render_with("tag.html", "tag.html", context! { site => site, tag => tag })
    }

    fn stylesheet(&self) -> Option<String> {
        Some(self.stylesheet.clone())
    }
}

fn load_template(dir: Option<&Path>, name: &str) -> Result<Option<String>, minijinja::Error> {
    if let Some(dir) = dir {
        if name.split(['/', '\\']).any(|segment| segment == "..") {
            return Ok(None);
        }

        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(source) => return Ok(Some(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {}", path.display()),
                )
                .with_source(e))
            }
        }
    }

    Ok(builtin_template(name).map(str::to_string))
}

fn builtin_template(name: &str) -> Option<&'static str> {
    match name {
        "base.html" => Some(BASE_TEMPLATE),
        "item.html" => Some(ITEM_TEMPLATE),
        "item_list.html" => Some(ITEM_LIST_TEMPLATE),
        "section.html" => Some(SECTION_TEMPLATE),
        "index.html" => Some(INDEX_TEMPLATE),
        "tag.html" => Some(TAG_TEMPLATE),
        _ => None,
    }
}

const BASE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="{{ site.language }}">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}{{ site.name }}{% endblock %}</title>
  <meta name="description" content="{% block description %}{{ site.description }}{% endblock %}">
  <link rel="stylesheet" href="{{ site.base_path | safe }}styles.css">
  <link rel="alternate" type="application/rss+xml" title="{{ site.name }}" href="{{ site.feed_url | safe }}">
</head>
<body>
  <header class="site-header">
    <div class="wrapper">
      <a href="{{ site.base_path | safe }}" class="site-name">{{ site.name }}</a>
      <nav>
        <ul>
        {% for section in site.sections %}
          <li><a href="{{ section.url | safe }}">{{ section.title }}</a></li>
        {% endfor %}
        </ul>
      </nav>
    </div>
  </header>
  <main class="wrapper">
    {% block content %}{% endblock %}
  </main>
  <footer class="site-footer">
    <p><a href="{{ site.feed_url | safe }}">RSS feed</a></p>
  </footer>
</body>
</html>
"##;

const ITEM_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block title %}{{ item.title }} | {{ site.name }}{% endblock %}
{% block description %}{{ item.summary }}{% endblock %}

{% block content %}
<article class="item">
  <header>
    <h1>{{ item.title }}</h1>
    <time datetime="{{ item.datetime }}">{{ item.date_display }}</time>
    {% if item.tags %}
    <ul class="tags">
      {% for tag in item.tags %}<li><a href="{{ tag.url | safe }}">{{ tag.name }}</a></li>{% endfor %}
    </ul>
    {% endif %}
  </header>
  <div class="content">
    {{ item.content | safe }}
  </div>
</article>
{% endblock %}
"##;

const ITEM_LIST_TEMPLATE: &str = r##"<ul class="item-list">
{% for item in items %}
  <li>
    <article>
      <h2><a href="{{ item.url | safe }}">{{ item.title }}</a></h2>
      <time datetime="{{ item.datetime }}">{{ item.date_display }}</time>
      <p>{{ item.summary }}</p>
    </article>
  </li>
{% endfor %}
</ul>
"##;

const SECTION_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block title %}{{ section.title }} | {{ site.name }}{% endblock %}

{% block content %}
<h1>{{ section.title }}</h1>
{% with items = section.items %}{% include "item_list.html" %}{% endwith %}
{% endblock %}
"##;

const INDEX_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block content %}
<p class="description">{{ site.description }}</p>
{% for section in sections %}
<section>
  <h2><a href="{{ section.url | safe }}">{{ section.title }}</a></h2>
  {% with items = section.items[:5] %}{% include "item_list.html" %}{% endwith %}
</section>
{% endfor %}
{% endblock %}
"##;

const TAG_TEMPLATE: &str = r##"{% extends "base.html" %}

{% block title %}Tagged with {{ tag.name }} | {{ site.name }}{% endblock %}

{% block content %}
<h1>Tagged with <span class="tag">{{ tag.name }}</span></h1>
{% with items = tag.items %}{% include "item_list.html" %}{% endwith %}
{% endblock %}
"##;

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use quire_content::{parse_date, Frontmatter};
    use tempfile::tempdir;

    use super::*;

    fn info() -> SiteInfo {
        SiteInfo::new("My Blog", "https://example.com/blog/", "Notes", "en").unwrap()
    }

    fn item(section: &str, metadata: Metadata) -> Item {
        let frontmatter = Frontmatter {
            title: "Hello & Welcome".to_string(),
            date: parse_date("2021-06-01").unwrap(),
            tags: BTreeSet::from(["Swift Tips".to_string()]),
            description: None,
            metadata,
        };
        Item::new("hello", section, frontmatter, "First words.", "hello.md")
    }

    fn site_context() -> SiteContext {
        SiteContext::new(&info(), &[], "feed.rss")
    }

    #[test]
    fn renders_item_page() {
        let theme = MinijinjaTheme::new();
        let ctx = ItemContext::new(
            &info(),
            &item("posts", Metadata::new()),
            "<p>Hello world</p>".to_string(),
            &Metadata::new(),
        );

        let html = theme.render_item(&site_context(), &ctx).unwrap();

        assert!(html.contains("<title>Hello &amp; Welcome | My Blog</title>"));
        assert!(html.contains("<p>Hello world</p>"));
        assert!(html.contains(r#"<time datetime="2021-06-01T00:00:00+00:00">June 1, 2021</time>"#));
        assert!(html.contains(r#"href="/blog/tags/swift-tips/""#));
        assert!(html.contains(r#"href="/blog/feed.rss""#));
    }

    #[test]
    fn selects_item_template_by_section() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("apps")).unwrap();
        fs::write(
            temp.path().join("apps/item.html"),
            "APP {{ item.title }} by {{ item.metadata.author }}",
        )
        .unwrap();
        let theme = MinijinjaTheme::from_dir(temp.path()).unwrap();
        let meta: Metadata = [("author", "chuy")].into_iter().collect();

        let app = ItemContext::new(&info(), &item("apps", meta.clone()), String::new(), &Metadata::new());
        let post = ItemContext::new(&info(), &item("posts", meta), String::new(), &Metadata::new());

        assert_eq!(
            theme.render_item(&site_context(), &app).unwrap(),
            "APP Hello &amp; Welcome by chuy"
        );
        assert!(theme
            .render_item(&site_context(), &post)
            .unwrap()
            .starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn missing_metadata_field_fails() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("item.html"), "by {{ item.metadata.author }}").unwrap();
        let theme = MinijinjaTheme::from_dir(temp.path()).unwrap();
        let ctx = ItemContext::new(&info(), &item("posts", Metadata::new()), String::new(), &Metadata::new());

        let err = theme.render_item(&site_context(), &ctx).unwrap_err();

        assert_eq!(err.template, "item.html");
    }

    #[test]
    fn theme_defaults_fill_missing_metadata() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("item.html"), "by {{ item.metadata.author }}").unwrap();
        let theme = MinijinjaTheme::from_dir(temp.path()).unwrap();
        let defaults: Metadata = [("author", "Site Owner")].into_iter().collect();
        let ctx = ItemContext::new(&info(), &item("posts", Metadata::new()), String::new(), &defaults);

        assert_eq!(theme.render_item(&site_context(), &ctx).unwrap(), "by Site Owner");
    }

    #[test]
    fn renders_index_with_navigation() {
        let theme = MinijinjaTheme::new();
        let sections = vec![Section {
            id: "posts".to_string(),
            title: "Posts".to_string(),
            items: vec![],
        }];
        let site = SiteContext::new(&info(), &sections, "feed.rss");
        let listing = SectionContext {
            id: "posts".to_string(),
            title: "Posts".to_string(),
            url: "/blog/posts/".to_string(),
            items: vec![ItemContext::new(
                &info(),
                &item("posts", Metadata::new()),
                String::new(),
                &Metadata::new(),
            )],
        };

        let html = theme.render_index(&site, &[listing]).unwrap();

        assert!(html.contains(r#"<a href="/blog/posts/">Posts</a>"#));
        assert!(html.contains(r#"<a href="/blog/posts/hello/">Hello &amp; Welcome</a>"#));
        assert!(html.contains("<p>First words.</p>"));
    }

    #[test]
    fn missing_theme_directory_errors() {
        let temp = tempdir().unwrap();
        assert!(MinijinjaTheme::from_dir(temp.path().join("nope")).is_err());
    }
}
