//! Reverse index: law name → curated files (and item ids) citing it.
//!
//! Always rebuilt wholesale from the curated YAML under `assets/`; the JSON
//! snapshot in `data/law_to_files.json` is derived state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::config::Layout;
use crate::formats::CitingFile;
use crate::registry::{LawRegistry, normalize_alias};
use crate::store;

/// Item sections of the compliance calendar.
const CALENDAR_SECTIONS: &[&str] = &["annual", "quarterly", "monthly", "event_driven"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReverseIndex {
    laws: BTreeMap<String, Vec<CitingFile>>,
}

impl ReverseIndex {
    pub fn build(layout: &Layout, registry: &LawRegistry) -> anyhow::Result<Self> {
        let assets = layout.assets_dir();
        let mut index = Self::default();

        for path in curated_files(layout)? {
            if !path.is_file() {
                continue;
            }
            let relative = path
                .strip_prefix(&assets)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    continue;
                }
            };
            let doc = match serde_yaml::from_str::<Value>(&text) {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping invalid yaml");
                    continue;
                }
            };

            for (law, items) in scan_document(&doc, registry) {
                index.laws.entry(law).or_default().push(CitingFile {
                    path: relative.clone(),
                    items,
                });
            }
        }

        tracing::info!(laws = index.laws.len(), "reverse index built");
        Ok(index)
    }

    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        store::read_json(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        store::write_json_atomic(path, self)
            .with_context(|| format!("save reverse index: {}", path.display()))
    }

    /// The snapshot when present, else a fresh build that is saved.
    pub fn load_or_build(layout: &Layout, registry: &LawRegistry) -> anyhow::Result<Self> {
        let path = layout.reverse_index_path();
        if let Some(index) = Self::load(&path)? {
            return Ok(index);
        }
        tracing::info!(path = %path.display(), "no reverse index snapshot; building");
        let index = Self::build(layout, registry)?;
        index.save(&path)?;
        Ok(index)
    }

    pub fn lookup(&self, law: &str) -> &[CitingFile] {
        self.laws.get(law).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.laws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CitingFile])> {
        self.laws
            .iter()
            .map(|(law, files)| (law.as_str(), files.as_slice()))
    }
}

/// Calendar, clause references, then checklists in filename order.
fn curated_files(layout: &Layout) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = vec![
        layout.compliance_calendar_path(),
        layout.clause_references_path(),
    ];

    let dir = layout.checklists_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(err).with_context(|| format!("read dir: {}", dir.display())),
    };
    let mut checklists = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read dir: {}", dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == "yaml") {
            checklists.push(path);
        }
    }
    checklists.sort();
    files.extend(checklists);
    Ok(files)
}

/// Collects cited laws of one curated document, keeping first-seen order of items.
#[derive(Debug)]
struct Collector<'a> {
    registry: &'a LawRegistry,
    laws: Vec<(String, Vec<String>)>,
}

impl<'a> Collector<'a> {
    /// Attributes a law reference to the first registered name overlapping it.
    fn add_law(&mut self, name: &str, item_id: &str) {
        let normalized = normalize_alias(name);
        let Some(known) = self.registry.match_known(normalized) else {
            return;
        };
        let position = match self.laws.iter().position(|(law, _)| law == known) {
            Some(position) => position,
            None => {
                self.laws.push((known.to_owned(), Vec::new()));
                self.laws.len() - 1
            }
        };
        let items = &mut self.laws[position].1;
        if !item_id.is_empty() && !items.iter().any(|id| id == item_id) {
            items.push(item_id.to_owned());
        }
    }

    fn add_mentions(&mut self, text: &str, item_id: &str) {
        let registry = self.registry;
        for known in registry.mentioned_in(text) {
            self.add_law(known, item_id);
        }
    }

    fn process_items(&mut self, items: &[Value]) {
        for item in items {
            let Value::Mapping(_) = item else {
                continue;
            };
            let item_id = item.get("id").map(scalar_text).unwrap_or_default();

            if let Some(law) = item.get("law") {
                self.add_mentions(&scalar_text(law), &item_id);
            }
            if let Some(Value::Sequence(laws)) = item.get("laws") {
                for reference in laws {
                    match reference {
                        Value::Mapping(_) => {
                            if let Some(Value::String(name)) = reference.get("name") {
                                self.add_law(name, &item_id);
                            }
                        }
                        Value::String(text) => self.add_mentions(text, &item_id),
                        _ => {}
                    }
                }
            }
            if let Some(Value::String(notes)) = item.get("notes") {
                self.add_mentions(notes, &item_id);
            }
        }
    }

    fn process_clauses(&mut self, categories: &[Value]) {
        for category in categories {
            let Some(Value::Sequence(clauses)) = category.get("clauses") else {
                continue;
            };
            for clause in clauses {
                let Value::Mapping(_) = clause else {
                    continue;
                };
                let clause_id = clause.get("id").map(scalar_text).unwrap_or_default();
                if let Some(basis) = clause.get("legal_basis") {
                    self.add_mentions(&scalar_text(basis), &clause_id);
                }
                if let Some(Value::Sequence(laws)) = clause.get("laws") {
                    for law in laws {
                        if let Value::String(text) = law {
                            self.add_mentions(text, &clause_id);
                        }
                    }
                }
            }
        }
    }
}

fn scan_document(doc: &Value, registry: &LawRegistry) -> Vec<(String, Vec<String>)> {
    let mut collector = Collector {
        registry,
        laws: Vec::new(),
    };

    for section in CALENDAR_SECTIONS {
        if let Some(Value::Sequence(items)) = doc.get(*section) {
            collector.process_items(items);
        }
    }
    if let Some(Value::Sequence(items)) = doc.get("items") {
        collector.process_items(items);
    }
    if let Some(Value::Sequence(categories)) = doc.get("categories") {
        collector.process_clauses(categories);
    }

    collector.laws
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}
