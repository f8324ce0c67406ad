//! Import specifier resolution.
//!
//! Resolves import specifiers to canonical file paths.
//!
//! ## Specifier Types
//!
//! - Aliased: `@pages/home` when `@pages` is an alias key
//! - Relative: `./utils`, `../lib/foo`
//! - Absolute: `/abs/path/to/module`
//! - Bare: `lodash`, `@scope/pkg`, `react/jsx-runtime`
//!
//! Every candidate base path is tried as-is, then with each configured extension
//! in priority order, then (if it is a directory) as `<dir>/index` plus each
//! extension. Results, failures included, are memoized per
//! `(specifier, importer)` for the lifetime of the resolver.

#![allow(clippy::unused_self)]

use rustc_hash::FxHashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::{Alias, BuildConfig};
use crate::error::ResolutionError;

type CacheKey = (String, PathBuf);

/// Import resolver for one build.
#[derive(Debug)]
pub struct Resolver {
    root: PathBuf,
    aliases: Vec<Alias>,
    extensions: Vec<String>,
    cache: RwLock<FxHashMap<CacheKey, Result<PathBuf, ResolutionError>>>,
}

impl Resolver {
    /// Create a resolver for `config`.
    #[must_use]
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            root: config.root.clone(),
            aliases: config.aliases.clone(),
            extensions: config.extensions.clone(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Resolve `specifier` as imported by the file `from`.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf, ResolutionError> {
        let key = (specifier.to_string(), from.to_path_buf());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let base_dir = from.parent().unwrap_or(&self.root);
        let result = self
            .resolve_uncached(specifier, base_dir)
            .ok_or_else(|| ResolutionError {
                specifier: specifier.to_string(),
                from: from.display().to_string(),
            });

        match &result {
            Ok(path) => tracing::debug!(specifier, resolved = %path.display(), "resolved"),
            Err(_) => tracing::debug!(specifier, from = %from.display(), "unresolved"),
        }

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, result.clone());
        }
        result
    }

    /// Resolve an entry specifier relative to the project root.
    pub fn resolve_entry(&self, specifier: &str) -> Result<PathBuf, ResolutionError> {
        self.resolve_uncached(specifier, &self.root)
            .ok_or_else(|| ResolutionError {
                specifier: specifier.to_string(),
                from: self.root.display().to_string(),
            })
    }

    fn resolve_uncached(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        if let Some(target) = self.match_alias(specifier) {
            return self.resolve_candidate(&target);
        }

        if is_path_like(specifier) {
            return self.resolve_candidate(&base_dir.join(specifier));
        }

        self.resolve_bare(specifier, base_dir)
    }

    /// First alias (declaration order) whose key equals the specifier or is a
    /// `/`-delimited prefix of it.
    fn match_alias(&self, specifier: &str) -> Option<PathBuf> {
        self.aliases.iter().find_map(|alias| {
            let rest = specifier.strip_prefix(alias.prefix.as_str())?;
            if rest.is_empty() {
                Some(alias.target.clone())
            } else {
                rest.strip_prefix('/').map(|sub| alias.target.join(sub))
            }
        })
    }

    /// Walk up from `base_dir` through `node_modules` directories.
    fn resolve_bare(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        let (pkg_name, subpath) = parse_bare_specifier(specifier);

        for dir in base_dir.ancestors() {
            let pkg_dir = dir.join("node_modules").join(pkg_name);
            if pkg_dir.is_dir() {
                let found = match subpath {
                    Some(sub) => self.resolve_candidate(&pkg_dir.join(sub)),
                    None => self.resolve_package_entry(&pkg_dir),
                };
                if found.is_some() {
                    return found;
                }
            }
        }

        None
    }

    /// Package entry: `module`, then `main`, then `index`.
    fn resolve_package_entry(&self, pkg_dir: &Path) -> Option<PathBuf> {
        let manifest = std::fs::read_to_string(pkg_dir.join("package.json"))
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok());

        if let Some(manifest) = manifest {
            for field in ["module", "main"] {
                if let Some(entry) = manifest.get(field).and_then(|v| v.as_str()) {
                    if let Some(found) = self.resolve_candidate(&pkg_dir.join(entry)) {
                        return Some(found);
                    }
                }
            }
        }

        self.resolve_index(pkg_dir)
    }

    fn resolve_candidate(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(canonical(base));
        }

        if let Some(found) = self.with_extensions(base) {
            return Some(found);
        }

        if base.is_dir() {
            return self.resolve_index(base);
        }

        None
    }

    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        self.with_extensions(&dir.join("index"))
    }

    fn with_extensions(&self, base: &Path) -> Option<PathBuf> {
        self.extensions.iter().find_map(|ext| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then(|| canonical(&candidate))
        })
    }
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Split a bare specifier into package name and optional subpath.
fn parse_bare_specifier(specifier: &str) -> (&str, Option<&str>) {
    let split_at = if specifier.starts_with('@') {
        // @scope/pkg/sub → package is the first two segments
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
    } else {
        specifier.find('/')
    };

    match split_at {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}
