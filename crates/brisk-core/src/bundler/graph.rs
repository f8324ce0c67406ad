//! Module dependency graph.
//!
//! Built breadth-first from the entry points. A module gets its id the moment
//! it is first discovered, before it is read, so an import that points back at
//! a module still in progress reuses the id instead of revisiting it. Cycles
//! are therefore representable and construction always terminates.

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use super::imports::{scan_imports, ImportKind, ImportStatement};
use super::resolve::Resolver;
use crate::config::BuildConfig;
use crate::css::url_references;
use crate::error::BuildError;

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

/// Detected content category of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Script,
    Style,
    Asset,
    Font,
}

impl ModuleKind {
    /// Detect the kind from the file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "mts" | "cts" | "json" => Self::Script,
            "css" | "scss" | "sass" => Self::Style,
            "eot" | "ttf" | "otf" | "woff" | "woff2" => Self::Font,
            _ => Self::Asset,
        }
    }
}

/// A resolved import edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub specifier: String,
    pub target: ModuleId,
}

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Canonical path.
    pub path: PathBuf,
    /// Raw bytes as read from disk.
    pub content: Vec<u8>,
    pub kind: ModuleKind,
    /// References found in the source: imports of scripts, `url(...)` of
    /// stylesheets.
    pub imports: Vec<ImportStatement>,
    /// Resolved edges, in import order.
    pub dependencies: Vec<Dependency>,
}

impl Module {
    /// Content as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// The module dependency graph for one build.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    path_to_id: HashMap<PathBuf, ModuleId>,
    entries: Vec<ModuleId>,
}

impl ModuleGraph {
    /// Resolve and read every module reachable from the configured entries.
    pub fn build(config: &BuildConfig, resolver: &Resolver) -> Result<Self, BuildError> {
        let mut graph = Self::default();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        for entry in &config.entries {
            let path = resolver.resolve_entry(entry)?;
            let id = graph.discover(&path, &mut queue);
            if !graph.entries.contains(&id) {
                graph.entries.push(id);
            }
        }

        // Ids are handed out in discovery order and the queue is FIFO, so the
        // module popped next always has id == modules.len().
        while let Some(path) = queue.pop_front() {
            let id = graph.modules.len();
            let content = std::fs::read(&path).map_err(|e| BuildError::io(&path, e))?;
            let kind = ModuleKind::from_path(&path);

            let text = String::from_utf8_lossy(&content);
            let imports = match kind {
                ModuleKind::Script => scan_imports(&text),
                ModuleKind::Style => url_references(&text)
                    .into_iter()
                    .map(|(specifier, span)| {
                        ImportStatement::bare(specifier, ImportKind::StyleUrl, span)
                    })
                    .collect(),
                ModuleKind::Asset | ModuleKind::Font => Vec::new(),
            };

            let mut dependencies = Vec::with_capacity(imports.len());
            for import in &imports {
                let target_path = resolver.resolve(&import.specifier, &path)?;
                let target = graph.discover(&target_path, &mut queue);
                dependencies.push(Dependency {
                    specifier: import.specifier.clone(),
                    target,
                });
            }

            tracing::trace!(id, path = %path.display(), deps = dependencies.len(), "module");
            graph.modules.push(Module {
                id,
                path,
                content,
                kind,
                imports,
                dependencies,
            });
        }

        tracing::debug!(modules = graph.modules.len(), "module graph built");
        Ok(graph)
    }

    /// Id for `path`, assigning a new one and queueing the path if unseen.
    fn discover(&mut self, path: &Path, queue: &mut VecDeque<PathBuf>) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(path) {
            return id;
        }
        let id = self.path_to_id.len();
        self.path_to_id.insert(path.to_path_buf(), id);
        queue.push_back(path.to_path_buf());
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Get module ID by canonical path.
    #[must_use]
    pub fn id_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Entry module ids, in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Target of `specifier` as imported by module `from`.
    #[must_use]
    pub fn resolve_specifier(&self, from: ModuleId, specifier: &str) -> Option<ModuleId> {
        self.modules
            .get(from)?
            .dependencies
            .iter()
            .find(|d| d.specifier == specifier)
            .map(|d| d.target)
    }

    /// Dependency-first order (post-order DFS from the entries).
    ///
    /// An edge back into a module still on the stack is skipped, which breaks
    /// cycles at the same place on every run.
    #[must_use]
    pub fn toposort(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.modules.len());
        let mut visited = vec![false; self.modules.len()];

        for &entry in &self.entries {
            if visited[entry] {
                continue;
            }
            // (module, next dependency index)
            let mut stack: Vec<(ModuleId, usize)> = vec![(entry, 0)];
            visited[entry] = true;

            while let Some(top) = stack.last_mut() {
                let (id, next) = *top;
                if let Some(dep) = self.modules[id].dependencies.get(next) {
                    top.1 += 1;
                    let target = dep.target;
                    if !visited[target] {
                        visited[target] = true;
                        stack.push((target, 0));
                    }
                } else {
                    order.push(id);
                    stack.pop();
                }
            }
        }

        order
    }

    /// Modules that import `id` directly.
    #[must_use]
    pub fn dependents(&self, id: ModuleId) -> Vec<ModuleId> {
        self.modules
            .iter()
            .filter(|m| m.dependencies.iter().any(|d| d.target == id))
            .map(|m| m.id)
            .collect()
    }

    /// The changed modules plus everything that transitively imports them,
    /// breadth-first from the changed set. Paths outside the graph are ignored.
    #[must_use]
    pub fn affected_by(&self, changed: &[PathBuf]) -> Vec<ModuleId> {
        let mut seen = HashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        for path in changed {
            let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
            if let Some(id) = self.id_by_path(&canonical) {
                if seen.insert(id) {
                    queue.push_back(id);
                }
            }
        }

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for dependent in self.dependents(id) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        order
    }
}
