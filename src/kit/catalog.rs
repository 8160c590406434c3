// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Errors raised while building a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// A read-only mapping from category name (e.g. "KICKS") to an ordered list of
/// sample file names under `<root>/<category>/`.
#[derive(Clone, Debug, Default)]
pub struct SampleCatalog {
    root: PathBuf,
    categories: BTreeMap<String, Vec<String>>,
}

impl SampleCatalog {
    /// Creates a catalog from an explicit category table.
    pub fn new(root: &Path, categories: BTreeMap<String, Vec<String>>) -> SampleCatalog {
        SampleCatalog {
            root: root.to_path_buf(),
            categories,
        }
    }

    /// Creates an empty catalog. Every lookup misses.
    pub fn empty(root: &Path) -> SampleCatalog {
        SampleCatalog::new(root, BTreeMap::new())
    }

    /// Reads a JSON manifest of the form `{"KICKS": ["kick1.wav", ...], ...}`.
    pub fn from_manifest(manifest: &Path, root: &Path) -> Result<SampleCatalog, CatalogError> {
        let raw = fs::read_to_string(manifest)?;
        let categories: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)?;
        info!(
            manifest = ?manifest,
            categories = categories.len(),
            "Loaded sample manifest"
        );
        Ok(SampleCatalog::new(root, categories))
    }

    /// Scans `root`: each subdirectory is a category holding its `.wav` files, sorted
    /// by name.
    pub fn scan(root: &Path) -> Result<SampleCatalog, CatalogError> {
        let mut categories = BTreeMap::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let mut files: Vec<String> = fs::read_dir(&path)?
                .filter_map(|f| f.ok())
                .map(|f| f.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
                })
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect();
            files.sort();

            let category = entry.file_name().to_string_lossy().to_string();
            debug!(category, files = files.len(), "Scanned sample category");
            categories.insert(category, files);
        }

        info!(root = ?root, categories = categories.len(), "Scanned sample library");
        Ok(SampleCatalog::new(root, categories))
    }

    /// Returns the files in the given category, in catalog order.
    pub fn files(&self, category: &str) -> &[String] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the category names.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Returns the source path for a file in a category.
    pub fn path_for(&self, category: &str, file: &str) -> String {
        self.root
            .join(category)
            .join(file)
            .to_string_lossy()
            .to_string()
    }
}
