//! Read-only prompt template sources.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::models::{PromptTemplate, PromptUsage};

#[derive(Error, Debug)]
pub enum PromptStoreError {
    #[error("Cannot read prompt directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid prompt template {path}: {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },
}

/// Source of prompt templates.
pub trait PromptStore: Send + Sync {
    /// Templates applicable to `usage`, unique by name, in discovery order.
    fn load_by_usage(&self, usage: PromptUsage) -> Result<Vec<PromptTemplate>, PromptStoreError>;
}

/// Fixed list of templates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromptStore {
    templates: Vec<PromptTemplate>,
}

impl InMemoryPromptStore {
    pub fn new(templates: Vec<PromptTemplate>) -> Self {
        Self { templates }
    }
}

impl PromptStore for InMemoryPromptStore {
    fn load_by_usage(&self, usage: PromptUsage) -> Result<Vec<PromptTemplate>, PromptStoreError> {
        Ok(unique_by_name(
            self.templates
                .iter()
                .filter(|t| t.applies_to(usage))
                .cloned(),
        ))
    }
}

/// Directory of `*.json` template files, one template per file.
///
/// Files are read in file-name order. A file without `prompt_name` takes
/// its file stem. Unreadable or malformed files are skipped with a warning.
/// A missing directory holds no templates.
#[derive(Debug, Clone)]
pub struct JsonPromptStore {
    dir: PathBuf,
}

impl JsonPromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn template_files(&self) -> Result<Vec<PathBuf>, PromptStoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "Prompt directory does not exist");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PromptStoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_template(path: &Path) -> Result<PromptTemplate, PromptStoreError> {
        let invalid = |reason: String| PromptStoreError::InvalidTemplate {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut template: PromptTemplate =
            serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
        if template.name.trim().is_empty() {
            template.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
        }
        Ok(template)
    }
}

impl PromptStore for JsonPromptStore {
    fn load_by_usage(&self, usage: PromptUsage) -> Result<Vec<PromptTemplate>, PromptStoreError> {
        let mut templates = Vec::new();
        for path in self.template_files()? {
            match Self::read_template(&path) {
                Ok(template) if template.applies_to(usage) => templates.push(template),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping prompt template"),
            }
        }
        let templates = unique_by_name(templates);
        tracing::debug!(
            dir = %self.dir.display(),
            usage = %usage,
            count = templates.len(),
            "Loaded prompt templates"
        );
        Ok(templates)
    }
}

/// Caches another store's results per usage until `invalidate` is called.
pub struct CachedPromptStore<S> {
    inner: S,
    cache: Mutex<HashMap<PromptUsage, Vec<PromptTemplate>>>,
}

impl<S: PromptStore> CachedPromptStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached result; the next load reads the inner store.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: PromptStore> PromptStore for CachedPromptStore<S> {
    fn load_by_usage(&self, usage: PromptUsage) -> Result<Vec<PromptTemplate>, PromptStoreError> {
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&usage).cloned()) {
            return Ok(hit);
        }
        let templates = self.inner.load_by_usage(usage)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(usage, templates.clone());
        }
        Ok(templates)
    }
}

/// Keep the first template of each name.
fn unique_by_name(templates: impl IntoIterator<Item = PromptTemplate>) -> Vec<PromptTemplate> {
    let mut seen = HashSet::new();
    templates
        .into_iter()
        .filter(|t| {
            let fresh = seen.insert(t.name.clone());
            if !fresh {
                tracing::warn!(name = %t.name, "Duplicate prompt template name ignored");
            }
            fresh
        })
        .collect()
}
