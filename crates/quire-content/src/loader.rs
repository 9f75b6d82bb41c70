//! Loading posts from a content directory.
//!
//! Each declared section maps to a subdirectory of the content root. Every
//! `.md` or `.markdown` file below it becomes one item. Files are visited in
//! file-name order so the load order is the same on every run.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::frontmatter::{extract_frontmatter, FrontmatterError};
use crate::item::{Item, Section, SectionSpec};

const EXTENSIONS: &[&str] = &["md", "markdown"];

/// Errors that can occur while loading content.
#[derive(Debug, thiserror::Error)]
pub enum ContentParseError {
    #[error("Content directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },

    #[error("Duplicate item '{id}' in section '{section}': {}", path.display())]
    DuplicateItem {
        section: String,
        id: String,
        path: PathBuf,
    },

    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),
}

impl ContentParseError {
    /// The file responsible for the error, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::RootNotFound(path) => Some(path),
            Self::Read { path, .. }
            | Self::Frontmatter { path, .. }
            | Self::DuplicateItem { path, .. } => Some(path),
            Self::DuplicateSection(_) => None,
        }
    }
}

/// Load every declared section from `root`, in declaration order.
///
/// A section whose directory does not exist loads as empty.
pub fn load_sections(root: &Path, specs: &[SectionSpec]) -> Result<Vec<Section>, ContentParseError> {
    if !root.is_dir() {
        return Err(ContentParseError::RootNotFound(root.to_path_buf()));
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.id.as_str()) {
            return Err(ContentParseError::DuplicateSection(spec.id.clone()));
        }
    }

    specs.iter().map(|spec| load_section(root, spec)).collect()
}

fn load_section(root: &Path, spec: &SectionSpec) -> Result<Section, ContentParseError> {
    let dir = root.join(&spec.id);
    let title = spec.display_title();

    if !dir.is_dir() {
        tracing::warn!("Section directory not found: {}", dir.display());
        return Ok(Section {
            id: spec.id.clone(),
            title,
            items: Vec::new(),
        });
    }

    let paths = discover(&dir)?;

    // Parse in parallel, then report the first failure in load order.
    let results: Vec<Result<Item, ContentParseError>> = paths
        .par_iter()
        .map(|path| load_item(&dir, &spec.id, path))
        .collect();
    let items = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let mut ids = HashSet::new();
    for item in &items {
        if !ids.insert(item.id.as_str()) {
            return Err(ContentParseError::DuplicateItem {
                section: spec.id.clone(),
                id: item.id.clone(),
                path: item.source_path.clone(),
            });
        }
    }

    tracing::debug!("Loaded {} items from {}", items.len(), dir.display());

    Ok(Section {
        id: spec.id.clone(),
        title,
        items,
    })
}

fn discover(dir: &Path) -> Result<Vec<PathBuf>, ContentParseError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| ContentParseError::Read {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if EXTENSIONS.contains(&ext) {
            paths.push(path.to_path_buf());
        }
    }

    Ok(paths)
}

fn load_item(section_dir: &Path, section: &str, path: &Path) -> Result<Item, ContentParseError> {
    let source = fs::read_to_string(path).map_err(|e| ContentParseError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let (frontmatter, body) =
        extract_frontmatter(&source).map_err(|e| ContentParseError::Frontmatter {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(Item::new(
        item_id(section_dir, path),
        section,
        frontmatter,
        body,
        path,
    ))
}

/// Item id: path relative to the section directory, without extension, `/` separated.
fn item_id(section_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(section_dir).unwrap_or(path);

    relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn write_post(dir: &Path, name: &str, title: &str, date: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            path,
            format!("---\ntitle: {title}\ndate: {date}\n---\n\nBody of {title}.\n"),
        )
        .unwrap();
    }

    #[test]
    fn loads_sections_in_file_name_order() {
        let temp = tempdir().unwrap();
        let posts = temp.path().join("posts");
        write_post(&posts, "b-second.md", "Second", "2021-06-01");
        write_post(&posts, "a-first.md", "First", "2021-01-01");
        write_post(&posts, "2020/old.markdown", "Old", "2020-01-01");
        fs::write(posts.join("notes.txt"), "ignored").unwrap();

        let sections = load_sections(temp.path(), &[SectionSpec::new("posts")]).unwrap();

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Posts");
        let ids: Vec<_> = sections[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2020/old", "a-first", "b-second"]);
        assert_eq!(sections[0].items[1].raw_body, "Body of First.\n");
        assert_eq!(sections[0].items[1].section, "posts");
    }

    #[test]
    fn missing_section_directory_is_empty() {
        let temp = tempdir().unwrap();

        let sections = load_sections(temp.path(), &[SectionSpec::new("apps")]).unwrap();

        assert!(sections[0].items.is_empty());
    }

    #[test]
    fn missing_root_errors() {
        let temp = tempdir().unwrap();

        let result = load_sections(&temp.path().join("nope"), &[SectionSpec::new("posts")]);

        assert!(matches!(result, Err(ContentParseError::RootNotFound(_))));
    }

    #[test]
    fn reports_file_with_missing_field() {
        let temp = tempdir().unwrap();
        let posts = temp.path().join("posts");
        write_post(&posts, "a.md", "A", "2021-01-01");
        fs::write(posts.join("broken.md"), "---\ntitle: Broken\n---\nbody").unwrap();
        write_post(&posts, "c.md", "C", "2021-01-01");

        let err = load_sections(temp.path(), &[SectionSpec::new("posts")]).unwrap_err();

        assert!(matches!(
            &err,
            ContentParseError::Frontmatter {
                source: FrontmatterError::MissingField("date"),
                ..
            }
        ));
        assert_eq!(err.path(), Some(posts.join("broken.md").as_path()));
    }

    #[test]
    fn rejects_duplicate_item_ids() {
        let temp = tempdir().unwrap();
        let posts = temp.path().join("posts");
        write_post(&posts, "same.md", "One", "2021-01-01");
        write_post(&posts, "same.markdown", "Two", "2021-01-01");

        let result = load_sections(temp.path(), &[SectionSpec::new("posts")]);

        assert!(matches!(result, Err(ContentParseError::DuplicateItem { id, .. }) if id == "same"));
    }

    #[test]
    fn rejects_duplicate_sections() {
        let temp = tempdir().unwrap();

        let result = load_sections(
            temp.path(),
            &[SectionSpec::new("posts"), SectionSpec::new("posts")],
        );

        assert!(matches!(result, Err(ContentParseError::DuplicateSection(id)) if id == "posts"));
    }
}
