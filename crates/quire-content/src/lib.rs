//! Content loading for quire blogs.
//!
//! This crate reads markdown posts with YAML front-matter from a content
//! directory, groups them into declared sections and orders each section.

pub mod frontmatter;
pub mod item;
pub mod loader;
pub mod metadata;
pub mod organizer;

pub use frontmatter::{extract_frontmatter, parse_date, Frontmatter, FrontmatterError};
pub use item::{slugify, summarize, Item, Section, SectionSpec};
pub use loader::{load_sections, ContentParseError};
pub use metadata::Metadata;
pub use organizer::{organize, sort_items, SortKey, SortOrder, SortSpec};
