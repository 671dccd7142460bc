use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, TsumugiError};
use crate::{Environment, Template};

/// Loads templates from a directory tree and caches the parsed trees.
///
/// All file I/O happens here, before the lexer ever sees the source. When
/// the environment's `auto_reload` flag is set, a cached entry is discarded
/// as soon as the backing file's modification time changes; otherwise the
/// first parse wins for the lifetime of the loader.
pub struct FileLoader {
    env: Environment,
    root: PathBuf,
    cache: HashMap<String, CachedTemplate>,
}

struct CachedTemplate {
    template: Template,
    modified: Option<SystemTime>,
}

impl FileLoader {
    /// Create a loader rooted at `root`; the directory must exist.
    pub fn new(env: Environment, root: impl AsRef<Path>) -> Result<Self> {
        let root = root
            .as_ref()
            .canonicalize()
            .map_err(|e| TsumugiError::Loader {
                message: format!("invalid template root: {}", e),
            })?;
        Ok(Self {
            env,
            root,
            cache: HashMap::new(),
        })
    }

    /// Fetch the template named `name`, relative to the root, parsing it on
    /// first use.
    pub fn get(&mut self, name: &str) -> Result<Template> {
        validate_name(name)?;
        let path = self.root.join(name);
        self.check_containment(&path)?;

        if let Some(cached) = self.cache.get(name) {
            if !self.env.auto_reload || cached.modified == modified_time(&path) {
                return Ok(cached.template.clone());
            }
        }

        let source = fs::read_to_string(&path).map_err(|e| TsumugiError::Loader {
            message: format!("cannot read template '{}': {}", name, e),
        })?;
        let filename = path.display().to_string();
        let template = self.env.parse(&source, name, &filename)?;
        self.cache.insert(
            name.to_string(),
            CachedTemplate {
                template: template.clone(),
                modified: modified_time(&path),
            },
        );
        Ok(template)
    }

    /// Names are resolved inside the root even in the presence of symlinks.
    fn check_containment(&self, path: &Path) -> Result<()> {
        let expanded = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !expanded.starts_with(&self.root) {
            return Err(TsumugiError::Loader {
                message: format!("template path escapes the root: {}", path.display()),
            });
        }
        Ok(())
    }
}

/// Template names are slash-separated relative paths with no empty, `.`,
/// or `..` segments, and no platform path syntax.
fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.contains(':')
        || name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(TsumugiError::Loader {
            message: format!("invalid template name '{}'", name),
        });
    }
    Ok(())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
