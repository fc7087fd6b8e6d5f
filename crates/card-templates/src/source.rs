//! Template sources
//!
//! Templates are looked up by bare file name only; a caller can never steer a
//! lookup outside the configured directory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use card_types::Document;

use crate::error::TemplateError;

/// Anything that can hand out parsed templates by name
pub trait TemplateSource {
    /// `Ok(None)` when no template has that name
    fn load_template(&self, name: &str) -> Result<Option<Document>, TemplateError>;

    /// Like `load_template`, but a missing template is an error
    fn require(&self, name: &str) -> Result<Document, TemplateError> {
        self.load_template(name)?.ok_or_else(|| TemplateError::NotFound {
            name: name.to_string(),
        })
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for Arc<T> {
    fn load_template(&self, name: &str) -> Result<Option<Document>, TemplateError> {
        (**self).load_template(name)
    }
}

impl<T: TemplateSource + ?Sized> TemplateSource for &T {
    fn load_template(&self, name: &str) -> Result<Option<Document>, TemplateError> {
        (**self).load_template(name)
    }
}

fn is_bare_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c| c == '/' || c == '\\') && name != "." && name != ".."
}

// ============================================================================
// DIRECTORY REGISTRY
// ============================================================================

/// JSON templates found under a directory, indexed by file name.
///
/// Files are read and parsed on every lookup so edits are picked up without
/// a restart.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    paths: BTreeMap<String, PathBuf>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `*.json` files under `dir` (recursive).
    ///
    /// A missing directory yields an empty registry. When two files share a
    /// name the first in path order wins.
    pub fn load_from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut registry = Self::new();

        if !dir.exists() {
            warn!("Card template directory does not exist: {:?}", dir);
            return Ok(registry);
        }

        registry.index_dir_recursive(dir)?;

        info!("Indexed {} card templates from {:?}", registry.paths.len(), dir);

        Ok(registry)
    }

    fn index_dir_recursive(&mut self, dir: &Path) -> Result<(), TemplateError> {
        let io_error = |source| TemplateError::Io {
            name: dir.display().to_string(),
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = std::fs::read_dir(dir)
            .map_err(io_error)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.index_dir_recursive(&path)?;
                continue;
            }
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Some(existing) = self.paths.get(name) {
                    warn!("Duplicate template {} at {:?}, keeping {:?}", name, path, existing);
                    continue;
                }
                debug!("Indexed template {} at {:?}", name, path);
                self.paths.insert(name.to_string(), path);
            }
        }

        Ok(())
    }

    /// Register a single file under an explicit name
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.paths.insert(name.into(), path.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl TemplateSource for TemplateRegistry {
    fn load_template(&self, name: &str) -> Result<Option<Document>, TemplateError> {
        if !is_bare_name(name) {
            warn!("Rejected template name with path components: {:?}", name);
            return Ok(None);
        }
        let Some(path) = self.paths.get(name) else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let document = serde_json::from_str(&content).map_err(|source| TemplateError::Parse {
            name: name.to_string(),
            source,
        })?;

        Ok(Some(document))
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Templates held in memory (tests, embedded cards)
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: HashMap<String, Document>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, document: Document) -> Self {
        self.templates.insert(name.into(), document);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, document: Document) {
        self.templates.insert(name.into(), document);
    }
}

impl TemplateSource for InMemoryTemplates {
    fn load_template(&self, name: &str) -> Result<Option<Document>, TemplateError> {
        Ok(self.templates.get(name).cloned())
    }
}
