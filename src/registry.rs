//! The curated major-law registry (`assets/law_index.yaml`).

use std::path::Path;

use anyhow::Context as _;
use serde_yaml::Value;

const ALIASES: &[(&str, &str)] = &[
    ("개보법", "개인정보보호법"),
    ("정통망법", "정보통신망법"),
    ("근기법", "근로기준법"),
    ("산안법", "산업안전보건법"),
    ("공정거래법", "독점규제및공정거래에관한법률"),
    ("자본시장법", "자본시장과금융투자업에관한법률"),
];

/// Law name → origin ID, in file order. Order matters: it breaks ties when
/// several registered names overlap a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LawRegistry {
    entries: Vec<(String, String)>,
}

impl LawRegistry {
    /// An absent file is an empty registry.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "law index not found; registry is empty");
                return Ok(Self::default());
            }
            Err(err) => return Err(err).with_context(|| format!("read: {}", path.display())),
        };
        Self::from_yaml(&text).with_context(|| format!("parse law index: {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc: Value = serde_yaml::from_str(text).context("parse yaml")?;
        let Some(major_laws) = doc.get("major_laws") else {
            return Ok(Self::default());
        };
        let Value::Mapping(map) = major_laws else {
            anyhow::bail!("`major_laws` must be a mapping of law name to ID");
        };

        let entries = map
            .iter()
            .filter_map(|(name, id)| Some((scalar(name)?, scalar(id)?)))
            .collect();
        Ok(Self { entries })
    }

    pub fn from_entries<N: Into<String>, I: Into<String>>(
        entries: impl IntoIterator<Item = (N, I)>,
    ) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, id)| (name.into(), id.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Exact name first, then ignoring spaces (`개인정보 보호법` = `개인정보보호법`).
    pub fn law_id(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if let Some((_, id)) = self.entries.iter().find(|(known, _)| known == name) {
            return Some(id);
        }
        let compact = strip_spaces(name);
        self.entries
            .iter()
            .find(|(known, _)| strip_spaces(known) == compact)
            .map(|(_, id)| id.as_str())
    }

    /// First registered name contained in `name` or containing it.
    pub fn match_known(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.names()
            .find(|known| name.contains(known) || known.contains(name))
    }

    /// Registered names occurring verbatim in `text`, in registry order.
    pub fn mentioned_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.names().filter(move |known| text.contains(known))
    }
}

/// Expands the common short forms to the full statute name.
pub fn normalize_alias(name: &str) -> &str {
    let name = name.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, full)| *full)
        .unwrap_or(name)
}

pub fn strip_spaces(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAW_INDEX: &str = r#"
version: 1
major_laws:
  개인정보 보호법: "011357"
  근로기준법: "001872"
  근로기준법 시행령: "003785"
  의료법: "001815"
"#;

    #[test]
    fn loads_in_file_order() {
        let registry = LawRegistry::from_yaml(LAW_INDEX).unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            ["개인정보 보호법", "근로기준법", "근로기준법 시행령", "의료법"]
        );
    }

    #[test]
    fn law_id_falls_back_to_space_insensitive_match() {
        let registry = LawRegistry::from_yaml(LAW_INDEX).unwrap();
        assert_eq!(registry.law_id("의료법"), Some("001815"));
        assert_eq!(registry.law_id("개인정보보호법"), Some("011357"));
        assert_eq!(registry.law_id("없는법"), None);
    }

    #[test]
    fn overlap_resolves_to_first_registered_name() {
        let registry = LawRegistry::from_yaml(LAW_INDEX).unwrap();
        assert_eq!(registry.match_known("근로기준법 시행령"), Some("근로기준법"));
        assert_eq!(registry.match_known("의료"), Some("의료법"));
        assert_eq!(registry.match_known(""), None);
    }

    #[test]
    fn aliases_expand_to_full_names() {
        assert_eq!(normalize_alias("개보법"), "개인정보보호법");
        assert_eq!(normalize_alias(" 근기법 "), "근로기준법");
        assert_eq!(normalize_alias("의료법"), "의료법");
    }

    #[test]
    fn missing_section_or_file_is_empty() {
        assert!(LawRegistry::from_yaml("other: 1").unwrap().is_empty());
        assert!(LawRegistry::from_yaml("").unwrap().is_empty());
        assert!(LawRegistry::from_yaml("major_laws: [a, b]").is_err());

        let dir = tempfile::tempdir().unwrap();
        let registry = LawRegistry::load(&dir.path().join("law_index.yaml")).unwrap();
        assert!(registry.is_empty());
    }
}
