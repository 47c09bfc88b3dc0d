//! Bundle file discovery and loading.

use std::path::{
    Path,
    PathBuf,
};

use globset::{
    GlobBuilder,
    GlobSet,
    GlobSetBuilder,
};
use ignore::WalkBuilder;

use super::parser::{
    ParseFailure,
    parse_bundle_text,
};
use super::types::{
    BundleError,
    FlatBundle,
};
use crate::keys::{
    CollisionReport,
    find_leaf_branch_collisions,
};
use crate::types::FlatTree;

/// Loads `<dir>/<locale>.json` and `<dir>/<locale>/<namespace>.json` files.
#[derive(Debug, Clone)]
pub struct BundleLoader {
    /// Bundle directory
    dir: PathBuf,
    /// Key path separator
    separator: String,
}

/// A bundle file matched for a locale.
#[derive(Debug, Clone)]
struct BundleFile {
    /// Absolute path
    path: PathBuf,
    /// File stem for namespace-per-file layouts
    namespace: Option<String>,
}

impl BundleLoader {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, separator: impl Into<String>) -> Self {
        Self { dir: dir.into(), separator: separator.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Loads and flattens every bundle file of `locale`.
    ///
    /// # Errors
    /// - `Missing` when no file exists for the locale
    /// - `Malformed` listing every colliding path across all files
    /// - I/O and syntax errors of individual files
    pub fn load(&self, locale: &str) -> Result<FlatBundle, BundleError> {
        let files = self.discover(locale)?;
        if files.is_empty() {
            return Err(BundleError::Missing { locale: locale.to_string(), dir: self.dir.clone() });
        }

        let mut entries = FlatTree::new();
        let mut collisions = CollisionReport::new();

        for file in &files {
            tracing::debug!(locale = %locale, path = ?file.path, "Loading bundle file");

            let text = std::fs::read_to_string(&file.path).map_err(|e| BundleError::Io {
                path: file.path.clone(),
                message: e.to_string(),
            })?;

            let parsed = parse_bundle_text(&text, &self.separator, file.namespace.as_deref())
                .map_err(|failure| match failure {
                    ParseFailure::Syntax(message) => {
                        BundleError::Syntax { path: file.path.clone(), message }
                    }
                    ParseFailure::NotAnObject => {
                        BundleError::NotAnObject { path: file.path.clone() }
                    }
                })?;

            collisions.extend(parsed.collisions);
            for (key, value) in parsed.entries {
                if entries.contains_key(&key) {
                    collisions.insert(key);
                } else {
                    entries.insert(key, value);
                }
            }
        }

        // ファイルをまたいだ leaf/branch の衝突
        collisions.extend(find_leaf_branch_collisions(entries.keys(), &self.separator));

        if !collisions.is_empty() {
            let paths = collisions.into_paths();
            tracing::error!(locale = %locale, ?paths, "Bundle contains colliding keys");
            return Err(BundleError::Malformed { locale: locale.to_string(), paths });
        }

        let bundle = FlatBundle::new(locale, entries, files.into_iter().map(|f| f.path).collect());
        tracing::debug!(
            locale = %locale,
            keys = bundle.len(),
            version = %bundle.version,
            "Bundle loaded"
        );
        Ok(bundle)
    }

    /// Files belonging to `locale`, sorted by path.
    fn discover(&self, locale: &str) -> Result<Vec<BundleFile>, BundleError> {
        if !self.dir.is_dir() {
            tracing::debug!(dir = ?self.dir, "Bundle directory not found");
            return Ok(Vec::new());
        }

        let patterns = self.patterns(locale)?;
        let mut files = Vec::new();

        for result in WalkBuilder::new(&self.dir)
            .max_depth(Some(2))
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .follow_links(false)
            .build()
        {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(?err, "Failed to read directory entry");
                    continue;
                }
            };

            // ファイルのみを対象
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let Ok(relative_path) = path.strip_prefix(&self.dir) else {
                continue;
            };
            if !patterns.is_match(relative_path) {
                continue;
            }

            // `<locale>/<namespace>.json` の場合はファイル名が名前空間
            let namespace = if relative_path.components().count() > 1 {
                path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string)
            } else {
                None
            };

            files.push(BundleFile { path: path.to_path_buf(), namespace });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Glob set matching the bundle files of `locale`, relative to the directory.
    fn patterns(&self, locale: &str) -> Result<GlobSet, BundleError> {
        let discovery_error =
            |e: globset::Error| BundleError::Discovery { dir: self.dir.clone(), message: e.to_string() };

        let mut builder = GlobSetBuilder::new();
        for pattern in [format!("{locale}.json"), format!("{locale}/*.json")] {
            let glob =
                GlobBuilder::new(&pattern).literal_separator(true).build().map_err(discovery_error)?;
            builder.add(glob);
        }
        builder.build().map_err(discovery_error)
    }
}
