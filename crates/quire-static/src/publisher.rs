//! Writing the generated site to disk.
//!
//! Publishing happens in two phases. [`PublishPlan::from_site`] gathers every
//! output file in memory, then [`Publisher::publish`] writes them in path
//! order. Writes stop at the first failure and the error lists what was
//! already written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::pipeline::CancelFlag;
use crate::site::Site;

/// Errors that can occur while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Item {0} has not been rendered")]
    Unrendered(String),

    #[error("Two generated files share the output path {}", .0.display())]
    Conflict(PathBuf),

    #[error("Failed to read resource {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to clean output directory {}: {source}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {} after {} files: {source}", path.display(), written.len())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
        written: Vec<PathBuf>,
    },

    #[error("Publishing cancelled after {} files", written.len())]
    Cancelled { written: Vec<PathBuf> },
}

impl PublishError {
    /// Output-relative paths written before the failure.
    pub fn written(&self) -> &[PathBuf] {
        match self {
            Self::Write { written, .. } | Self::Cancelled { written } => written,
            _ => &[],
        }
    }
}

/// Every file a publish will write, keyed by output-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPlan {
    files: BTreeMap<PathBuf, Vec<u8>>,
    /// Paths still holding a copied resource
    resources: BTreeSet<PathBuf>,
}

impl PublishPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect resources, rendered items and generated documents.
    ///
    /// Generated files win over resources at the same path. Two generated
    /// files at one path are a [`PublishError::Conflict`].
    pub fn from_site(site: &Site, resources_dir: Option<&Path>) -> Result<Self, PublishError> {
        let mut plan = Self::new();

        if let Some(dir) = resources_dir {
            plan.add_resources(dir)?;
        }
        let resources = plan.len();

        for item in site.items() {
            let html = item
                .rendered_html()
                .ok_or_else(|| PublishError::Unrendered(format!("{}/{}", item.section, item.id)))?;
            plan.insert_generated(item.output_path(), html.as_bytes().to_vec())?;
        }

        for document in &site.documents {
            let path: PathBuf = document.path.split('/').collect();
            plan.insert_generated(path, document.contents.as_bytes().to_vec())?;
        }

        tracing::debug!(
            "Publish plan: {} files ({} resources)",
            plan.len(),
            resources
        );

        Ok(plan)
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        let path = path.into();
        self.resources.remove(&path);
        self.files.insert(path, contents.into())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Output paths in write order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    fn insert_generated(&mut self, path: PathBuf, contents: Vec<u8>) -> Result<(), PublishError> {
        if self.resources.remove(&path) {
            tracing::warn!("Generated file replaces resource {}", path.display());
        } else if self.files.contains_key(&path) {
            return Err(PublishError::Conflict(path));
        }
        self.files.insert(path, contents);
        Ok(())
    }

    fn add_resources(&mut self, dir: &Path) -> Result<(), PublishError> {
        if !dir.is_dir() {
            tracing::debug!("No resources directory at {}", dir.display());
            return Ok(());
        }

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| PublishError::Read {
                path: e.path().unwrap_or(dir).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let contents = fs::read(path).map_err(|source| PublishError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
            self.resources.insert(relative.clone());
            self.files.insert(relative, contents);
        }

        Ok(())
    }
}

/// Summary of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub output_dir: PathBuf,
    /// Output-relative paths, in write order
    pub written: Vec<PathBuf>,
}

/// Writes a [`PublishPlan`] into an output directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    output_dir: PathBuf,
    clean: bool,
}

impl Publisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            clean: false,
        }
    }

    /// Remove previous output (except `.git`) before writing.
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every file in the plan.
    pub fn publish(&self, plan: PublishPlan, cancel: &CancelFlag) -> Result<PublishReport, PublishError> {
        if self.clean {
            self.clean_output()?;
        }

        let mut written = Vec::with_capacity(plan.len());

        for (relative, contents) in plan.files {
            if cancel.is_cancelled() {
                return Err(PublishError::Cancelled { written });
            }

            let path = self.output_dir.join(&relative);
            if let Err(source) = write_atomic(&path, &contents) {
                return Err(PublishError::Write {
                    path,
                    source,
                    written,
                });
            }

            tracing::debug!("Wrote {}", relative.display());
            written.push(relative);
        }

        tracing::info!(
            "Published {} files to {}",
            written.len(),
            self.output_dir.display()
        );

        Ok(PublishReport {
            output_dir: self.output_dir.clone(),
            written,
        })
    }

    fn clean_output(&self) -> Result<(), PublishError> {
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(PublishError::Clean {
                    path: self.output_dir.clone(),
                    source,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| PublishError::Clean {
                path: self.output_dir.clone(),
                source,
            })?;
            if entry.file_name() == ".git" {
                continue;
            }

            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|source| PublishError::Clean { path, source })?;
        }

        Ok(())
    }
}

/// Write through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
