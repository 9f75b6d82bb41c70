//! Frontmatter extraction and parsing.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_yaml::Value;

use crate::metadata::Metadata;

/// Parsed frontmatter from a post.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    /// Post title (required)
    pub title: String,

    /// Publication date (required)
    pub date: DateTime<Utc>,

    /// Tags, either a YAML list or a comma-separated string
    pub tags: BTreeSet<String>,

    /// Short description used for listings and feeds
    pub description: Option<String>,

    /// Every other key, stringified
    pub metadata: Metadata,
}

/// Extract frontmatter from a markdown source.
///
/// Returns the parsed frontmatter and the remaining content after the frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Frontmatter, &str), FrontmatterError> {
    let trimmed = source.trim_start_matches('\u{feff}').trim_start();

    let (open, after_open) = split_line(trimmed);
    if open.trim_end() != DELIMITER {
        return Err(FrontmatterError::Missing);
    }

    // The closing delimiter must be a whole line
    let mut offset = 0;
    let mut close = None;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }
    let (yaml_end, body_start) = close.ok_or(FrontmatterError::Unclosed)?;

    let yaml_content = after_open[..yaml_end].trim();
    let remaining = &after_open[body_start..];
    let raw = raw_scalars(yaml_content);

    let value: Value = serde_yaml::from_str(yaml_content)
        .map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => Default::default(),
        _ => return Err(FrontmatterError::NotAMapping),
    };

    let mut title = None;
    let mut date = None;
    let mut tags = BTreeSet::new();
    let mut description = None;
    let mut metadata = Metadata::new();

    for (key, value) in &mapping {
        let key = scalar(key).ok_or(FrontmatterError::NotAMapping)?;

        match key.as_str() {
            "title" => title = Some(flatten(&key, value)?),
            "date" => {
                let raw = flatten(&key, value)?;
                let parsed = parse_date(&raw).ok_or(FrontmatterError::InvalidDate(raw))?;
                date = Some(parsed);
            }
            "tags" => tags = parse_tags(&key, value)?,
            "description" => {
                let text = flatten(&key, value)?;
                description = Some(text).filter(|d| !d.trim().is_empty());
            }
            _ => {
                // Numbers keep their source spelling, e.g. `1.10` or `0x1F`
                let text = match (value, raw.get(key.as_str())) {
                    (Value::Number(_), Some(raw)) => raw.to_string(),
                    _ => flatten(&key, value)?,
                };
                metadata.insert(key, text);
            }
        }
    }

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(FrontmatterError::MissingField("title"))?;
    let date = date.ok_or(FrontmatterError::MissingField("date"))?;

    let frontmatter = Frontmatter {
        title,
        date,
        tags,
        description,
        metadata,
    };

    Ok((frontmatter, remaining.trim_start()))
}

/// Parse a frontmatter date.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS` (all UTC) and RFC 3339.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&naive));
    }

    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

const DELIMITER: &str = "---";

fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => (text, ""),
    }
}

/// Source text of every top-level `key: value` line.
fn raw_scalars(yaml: &str) -> HashMap<&str, &str> {
    yaml.lines()
        .filter(|line| !line.starts_with([' ', '\t', '#', '-']))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| {
            let value = value.split_once(" #").map_or(value, |(v, _)| v);
            (key.trim(), value.trim())
        })
        .collect()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn flatten(key: &str, value: &Value) -> Result<String, FrontmatterError> {
    if let Some(text) = scalar(value) {
        return Ok(text);
    }

    match value {
        Value::Sequence(seq) => seq
            .iter()
            .map(scalar)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(", "))
            .ok_or_else(|| FrontmatterError::UnsupportedValue(key.to_string())),
        _ => Err(FrontmatterError::UnsupportedValue(key.to_string())),
    }
}

fn parse_tags(key: &str, value: &Value) -> Result<BTreeSet<String>, FrontmatterError> {
    let raw: Vec<String> = match value {
        Value::Sequence(seq) => seq
            .iter()
            .map(scalar)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FrontmatterError::UnsupportedValue(key.to_string()))?,
        other => flatten(key, other)?
            .split(',')
            .map(str::to_string)
            .collect(),
    };

    Ok(raw
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect())
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Missing frontmatter block - content must start with ---")]
    Missing,

    #[error("Unclosed frontmatter block - missing closing ---")]
    Unclosed,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),

    #[error("Frontmatter must be a mapping with string keys")]
    NotAMapping,

    #[error("Missing required frontmatter field: {0}")]
    MissingField(&'static str),

    #[error("Invalid date in frontmatter: {0:?}")]
    InvalidDate(String),

    #[error("Unsupported value for frontmatter key '{0}'")]
    UnsupportedValue(String),
}
