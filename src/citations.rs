//! Finds `<law> 제N조(의M)( 제K항)` citations in curated YAML and checks
//! that the cited article exists in the current statute text.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use regex::Regex;

use crate::api::LawApi;
use crate::config::Layout;
use crate::formats::{Citation, CitationCheck};
use crate::registry::LawRegistry;
use crate::xml::Element;

/// Pause between origin calls, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 500;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([가-힣]+(?:법|령|규칙|규정))\s*제(\d+)조(?:의(\d+))?(?:\s*제(\d+)항)?")
        .expect("valid citation regex")
});

/// Every citation in `text`, attributed to `file`.
pub fn extract_citations(text: &str, file: &str) -> Vec<Citation> {
    CITATION
        .captures_iter(text)
        .map(|caps| {
            let article = match caps.get(3) {
                Some(sub) => format!("제{}조의{}", &caps[2], sub.as_str()),
                None => format!("제{}조", &caps[2]),
            };
            Citation {
                law_name: caps[1].to_owned(),
                article,
                paragraph: caps.get(4).map(|p| format!("제{}항", p.as_str())),
                full_text: caps[0].to_owned(),
                file: file.to_owned(),
            }
        })
        .collect()
}

/// Citations across the calendar, clause references and checklists.
pub fn collect(layout: &Layout) -> anyhow::Result<Vec<Citation>> {
    let assets = layout.assets_dir();
    let mut files = vec![
        layout.compliance_calendar_path(),
        layout.clause_references_path(),
    ];
    files.extend(checklist_files(&layout.checklists_dir())?);

    let mut citations = Vec::new();
    for path in files.iter().filter(|path| path.is_file()) {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read: {}", path.display()))?;
        let relative = path
            .strip_prefix(&assets)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        citations.extend(extract_citations(&text, &relative));
    }
    Ok(citations)
}

fn checklist_files(dir: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("read dir: {}", dir.display())),
    };
    let mut files = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// Keeps the first citation of each (law, article) pair.
pub fn deduplicate(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert((c.law_name.clone(), c.article.clone())))
        .collect()
}

/// `(number, branch)` of `제N조` / `제N조의M`.
fn article_key(article: &str) -> Option<(&str, Option<&str>)> {
    let rest = article.strip_prefix('제')?;
    let (number, branch) = rest.split_once('조')?;
    let branch = branch.strip_prefix('의').filter(|b| !b.is_empty());
    Some((number, branch))
}

/// `Some(true)` when the article exists, `Some(false)` when the statute has
/// articles but not this one, `None` when the document carries no articles.
pub fn article_exists(statute: &Element, article: &str) -> Option<bool> {
    let (number, branch) = article_key(article)?;
    let articles = statute
        .find_all("조문단위")
        .into_iter()
        .filter(|unit| unit.child_text("조문여부").trim() != "전문")
        .collect::<Vec<_>>();
    if articles.is_empty() {
        return None;
    }

    let found = articles.iter().any(|unit| {
        let unit_branch = unit.child_text("조문가지번호").trim();
        let unit_branch = (!unit_branch.is_empty() && unit_branch != "0").then_some(unit_branch);
        unit.child_text("조문번호").trim() == number && unit_branch == branch
    });
    Some(found)
}

pub struct CitationValidator<'a> {
    api: &'a LawApi<'a>,
    registry: &'a LawRegistry,
    delay: Duration,
}

impl<'a> CitationValidator<'a> {
    pub fn new(api: &'a LawApi<'a>, registry: &'a LawRegistry, delay: Duration) -> Self {
        Self {
            api,
            registry,
            delay,
        }
    }

    /// Checks each citation in turn. Per-item failures are recorded as
    /// unknown and the batch continues.
    pub fn validate(&self, citations: Vec<Citation>) -> Vec<CitationCheck> {
        let total = citations.len();
        let mut results = Vec::with_capacity(total);
        let mut called_origin = false;

        for (position, citation) in citations.into_iter().enumerate() {
            let Some(law_id) = self.registry.law_id(&citation.law_name) else {
                results.push(CitationCheck {
                    citation,
                    valid: None,
                    detail: Some("law is not in the registry".to_owned()),
                });
                continue;
            };

            if called_origin {
                self.api.gateway().sleeper().sleep(self.delay);
            }
            called_origin = true;

            let (valid, detail) = match self.api.fetch_statute(law_id) {
                Ok(statute) => match article_exists(&statute, &citation.article) {
                    Some(true) => (Some(true), None),
                    Some(false) => (Some(false), Some("article not found".to_owned())),
                    None => (
                        None,
                        Some("statute exists but has no article units".to_owned()),
                    ),
                },
                Err(err) => {
                    tracing::warn!(
                        citation = %citation.full_text,
                        error = %err,
                        "citation check failed"
                    );
                    (None, Some(err.to_string()))
                }
            };
            tracing::debug!(position = position + 1, total, ?valid, "checked citation");
            results.push(CitationCheck {
                citation,
                valid,
                detail,
            });
        }

        let invalid = results.iter().filter(|r| r.valid == Some(false)).count();
        let unknown = results.iter().filter(|r| r.valid.is_none()).count();
        tracing::info!(total, invalid, unknown, "citation validation done");
        results
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub valid: usize,
    pub unknown: usize,
    pub invalid: usize,
}

pub fn tally(results: &[CitationCheck]) -> Tally {
    results.iter().fold(Tally::default(), |mut tally, r| {
        match r.valid {
            Some(true) => tally.valid += 1,
            Some(false) => tally.invalid += 1,
            None => tally.unknown += 1,
        }
        tally
    })
}

pub fn format_text(results: &[CitationCheck]) -> String {
    TextReport(results).to_string()
}

pub fn format_markdown(results: &[CitationCheck], generated_at: &str) -> String {
    MarkdownReport {
        results,
        generated_at,
    }
    .to_string()
}

struct TextReport<'a>(&'a [CitationCheck]);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let results = self.0;
        let counts = tally(results);
        writeln!(f, "=== 조문 검증 결과 ===\n")?;
        writeln!(f, "유효: {}개", counts.valid)?;
        writeln!(f, "확인 필요: {}개", counts.unknown)?;
        writeln!(f, "무효: {}개\n", counts.invalid)?;

        if counts.invalid > 0 {
            writeln!(f, "무효 조문:")?;
            for r in results.iter().filter(|r| r.valid == Some(false)) {
                writeln!(f, "   {} ({})", r.citation.full_text, r.citation.file)?;
            }
            writeln!(f)?;
        }

        if counts.unknown > 0 {
            writeln!(f, "확인 필요:")?;
            for r in results.iter().filter(|r| r.valid.is_none()).take(10) {
                writeln!(
                    f,
                    "   {} - {}",
                    r.citation.full_text,
                    r.detail.as_deref().unwrap_or("")
                )?;
            }
            if counts.unknown > 10 {
                writeln!(f, "   ... 외 {}개", counts.unknown - 10)?;
            }
        }
        Ok(())
    }
}

struct MarkdownReport<'a> {
    results: &'a [CitationCheck],
    generated_at: &'a str,
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = tally(self.results);
        writeln!(f, "## 조문 검증 리포트\n")?;
        writeln!(f, "- 유효: {}개", counts.valid)?;
        writeln!(f, "- 확인 필요: {}개", counts.unknown)?;
        writeln!(f, "- 무효: {}개\n", counts.invalid)?;

        for (heading, label, wanted) in [
            ("### 무효 조문 (삭제/이동됨)", "오류", Some(false)),
            ("### 확인 필요", "사유", None),
        ] {
            let mut section = self.results.iter().filter(|r| r.valid == wanted).peekable();
            if section.peek().is_none() {
                continue;
            }
            writeln!(f, "{heading}\n")?;
            for r in section {
                writeln!(f, "- `{}`: {}", r.citation.file, r.citation.full_text)?;
                writeln!(f, "  - {label}: {}", r.detail.as_deref().unwrap_or("N/A"))?;
            }
            writeln!(f)?;
        }
        writeln!(f, "---\n*검증일: {}*", self.generated_at)
    }
}
