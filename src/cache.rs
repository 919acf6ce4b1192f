//! Write-through file cache of by-ID documents under `data/raw`.
//!
//! One XML file per document, named `{sanitized label}_{identifier}.xml`.
//! Statutes sit at the cache root, every other kind in a sub-directory named
//! after its target code. Lookups are a linear scan in filename order; the
//! first matching file wins. Nothing is ever evicted.

use std::path::PathBuf;

use anyhow::Context as _;

use crate::api::FetchedDocument;
use crate::formats::{CacheEntry, DocumentKind};
use crate::store;

const EXTENSION: &str = "xml";

#[derive(Debug, Clone)]
pub struct LawCache {
    root: PathBuf,
}

impl LawCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir_for(&self, kind: DocumentKind) -> PathBuf {
        match kind.cache_subdir() {
            Some(subdir) => self.root.join(subdir),
            None => self.root.clone(),
        }
    }

    /// First cached file whose name contains `identifier` or the sanitized `name`.
    pub fn find(
        &self,
        kind: DocumentKind,
        identifier: Option<&str>,
        name: Option<&str>,
    ) -> anyhow::Result<Option<PathBuf>> {
        let identifier = identifier.map(str::trim).filter(|id| !id.is_empty());
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(sanitize_filename);
        if identifier.is_none() && name.is_none() {
            return Ok(None);
        }

        for path in self.cached_files(kind)? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let by_id = identifier.is_some_and(|id| file_name.contains(id));
            let by_name = name.as_deref().is_some_and(|n| file_name.contains(n));
            if by_id || by_name {
                tracing::debug!(path = %path.display(), "cache hit");
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    pub fn save(&self, document: &FetchedDocument) -> anyhow::Result<CacheEntry> {
        let kind = document.kind;
        let identifier = document.record.id();
        if identifier.is_empty() {
            anyhow::bail!("cannot cache {kind} without an identifier");
        }

        let label = match document.record.get(kind.filename_field()) {
            "" => document.record.name(),
            label => label,
        };
        let file_name = format!("{}_{identifier}.{EXTENSION}", sanitize_filename(label));
        let path = self.dir_for(kind).join(file_name);

        store::write_atomic(&path, document.raw.as_bytes())
            .with_context(|| format!("save {kind} {identifier}"))?;
        tracing::info!(path = %path.display(), "saved to cache");

        Ok(CacheEntry {
            kind,
            identifier: identifier.to_owned(),
            name: document.record.name().to_owned(),
            path,
        })
    }

    fn cached_files(&self, kind: DocumentKind) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.dir_for(kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read cache dir: {}", dir.display()));
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read cache dir: {}", dir.display()))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Keeps alphanumerics, spaces, `_` and `-`; never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let kept = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>();
    let kept = kept.trim();
    if kept.is_empty() {
        "unnamed".to_owned()
    } else {
        kept.to_owned()
    }
}
