use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The document families served by the origin API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum DocumentKind {
    #[serde(rename = "law")]
    #[value(name = "law")]
    Statute,
    #[serde(rename = "prec")]
    #[value(name = "prec")]
    Precedent,
    #[serde(rename = "admrul")]
    #[value(name = "admrul")]
    AdministrativeRule,
    #[serde(rename = "ordin")]
    #[value(name = "ordin")]
    LocalOrdinance,
    #[serde(rename = "expc")]
    #[value(name = "expc")]
    Interpretation,
    #[serde(rename = "detc")]
    #[value(name = "detc")]
    ConstitutionalDecision,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Statute,
        DocumentKind::Precedent,
        DocumentKind::AdministrativeRule,
        DocumentKind::LocalOrdinance,
        DocumentKind::Interpretation,
        DocumentKind::ConstitutionalDecision,
    ];

    /// Value of the `target` query parameter.
    pub fn target(self) -> &'static str {
        match self {
            Self::Statute => "law",
            Self::Precedent => "prec",
            Self::AdministrativeRule => "admrul",
            Self::LocalOrdinance => "ordin",
            Self::Interpretation => "expc",
            Self::ConstitutionalDecision => "detc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Statute => "법령",
            Self::Precedent => "판례",
            Self::AdministrativeRule => "행정규칙",
            Self::LocalOrdinance => "자치법규",
            Self::Interpretation => "법령해석례",
            Self::ConstitutionalDecision => "헌재결정례",
        }
    }

    /// Repeating element of a search response. Ordinance searches reuse `law`.
    pub fn search_element(self) -> &'static str {
        match self {
            Self::Statute | Self::LocalOrdinance => "law",
            Self::Precedent => "prec",
            Self::AdministrativeRule => "admrul",
            Self::Interpretation => "expc",
            Self::ConstitutionalDecision => "Detc",
        }
    }

    /// Query parameter carrying the identifier on `lawService.do`.
    pub fn id_param(self) -> &'static str {
        match self {
            Self::LocalOrdinance => "MST",
            _ => "ID",
        }
    }

    /// Cache sub-directory; statutes live at the cache root.
    pub fn cache_subdir(self) -> Option<&'static str> {
        match self {
            Self::Statute => None,
            other => Some(other.target()),
        }
    }

    /// Logical field used as the readable part of cached filenames.
    pub fn filename_field(self) -> &'static str {
        match self {
            Self::Statute | Self::AdministrativeRule | Self::LocalOrdinance => "name",
            Self::Precedent | Self::Interpretation | Self::ConstitutionalDecision => "case_number",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logical field name → value. Absent fields read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: BTreeMap<String, String>,
}

impl NormalizedRecord {
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn id(&self) -> &str {
        self.get("id")
    }

    pub fn name(&self) -> &str {
        self.get("name")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub total: u64,
    pub records: Vec<NormalizedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub kind: DocumentKind,
    pub identifier: String,
    pub name: String,
    pub path: PathBuf,
}

/// One curated file citing a law, with the ids of the citing items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitingFile {
    pub path: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_check: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AffectedLaw {
    pub law_name: String,
    pub matched_name: String,
    pub promulgation_date: String,
    pub enforcement_date: String,
    pub revision_type: String,
    pub affected_files: Vec<CitingFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub law_name: String,
    pub article: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
    pub full_text: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitationCheck {
    #[serde(flatten)]
    pub citation: Citation,
    /// `None` when the citation could not be checked.
    pub valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatuteFrontMatter {
    pub title: String,
    pub law_id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub law_type: String,
    pub ministry: String,
    pub promulgation_date: String,
    pub enforcement_date: String,
    pub revision_type: String,
    pub source_url: String,
    pub source_name: String,
    pub retrieved_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_filter: Option<String>,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_read_as_empty() {
        let mut record = NormalizedRecord::default();
        record.set("name", "의료법");
        assert_eq!(record.name(), "의료법");
        assert_eq!(record.id(), "");
        assert_eq!(record.get("ministry"), "");
    }

    #[test]
    fn kind_serializes_as_target_code() {
        let json = serde_json::to_string(&DocumentKind::ConstitutionalDecision).unwrap();
        assert_eq!(json, "\"detc\"");
        for kind in DocumentKind::ALL {
            let parsed: DocumentKind =
                serde_json::from_str(&format!("\"{}\"", kind.target())).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn only_statutes_live_at_cache_root() {
        assert_eq!(DocumentKind::Statute.cache_subdir(), None);
        assert_eq!(DocumentKind::Precedent.cache_subdir(), Some("prec"));
        assert_eq!(DocumentKind::LocalOrdinance.id_param(), "MST");
        assert_eq!(DocumentKind::Interpretation.id_param(), "ID");
    }
}
