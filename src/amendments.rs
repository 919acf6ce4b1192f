//! Detects amended major laws and the curated files needing review.
//!
//! The checkpoint only moves after a successful check. A failed origin call
//! must never make the window look reviewed.

use std::fmt;
use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::api::{DateType, LawApi};
use crate::formats::{AffectedLaw, Checkpoint, NormalizedRecord};
use crate::index::ReverseIndex;
use crate::registry::LawRegistry;
use crate::store;

/// Page size of the amendment query.
pub const AMENDMENT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug)]
pub enum AmendmentCheck {
    /// The origin answered; the list may be empty.
    Reported(Vec<AffectedLaw>),
    /// The origin call failed; nothing can be concluded.
    Failed(String),
}

impl AmendmentCheck {
    /// `(affected, success)`. Branch on `success` before trusting an empty list.
    pub fn into_parts(self) -> (Vec<AffectedLaw>, bool) {
        match self {
            Self::Reported(affected) => (affected, true),
            Self::Failed(_) => (Vec::new(), false),
        }
    }
}

pub struct AmendmentChecker<'a> {
    api: &'a LawApi<'a>,
    registry: &'a LawRegistry,
    index: &'a ReverseIndex,
}

impl<'a> AmendmentChecker<'a> {
    pub fn new(api: &'a LawApi<'a>, registry: &'a LawRegistry, index: &'a ReverseIndex) -> Self {
        Self {
            api,
            registry,
            index,
        }
    }

    /// Laws amended (by enforcement date) in `[since, today]`.
    pub fn check(&self, since: &str, today: &str) -> AmendmentCheck {
        match self
            .api
            .recent_amendments(since, today, DateType::Enforcement, AMENDMENT_PAGE_SIZE)
        {
            Ok(page) => {
                let affected = match_amendments(&page.records, self.registry, self.index);
                tracing::info!(
                    amended = page.records.len(),
                    affected = affected.len(),
                    "amendment check done"
                );
                AmendmentCheck::Reported(affected)
            }
            Err(err) => {
                tracing::warn!(error = %err, "amendment query failed");
                AmendmentCheck::Failed(err.to_string())
            }
        }
    }
}

/// Intersects amended laws with the registry (substring either way) and
/// attaches the citing files.
pub fn match_amendments(
    amended: &[NormalizedRecord],
    registry: &LawRegistry,
    index: &ReverseIndex,
) -> Vec<AffectedLaw> {
    amended
        .iter()
        .filter_map(|law| {
            let matched = registry.match_known(law.name())?;
            Some(AffectedLaw {
                law_name: law.name().to_owned(),
                matched_name: matched.to_owned(),
                promulgation_date: law.get("promulgation_date").to_owned(),
                enforcement_date: law.get("enforcement_date").to_owned(),
                revision_type: law.get("revision_type").to_owned(),
                affected_files: index.lookup(matched).to_vec(),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> anyhow::Result<Option<Checkpoint>> {
        store::read_json(&self.path).context("load checkpoint")
    }

    pub fn advance(&self, checked_on: &str) -> anyhow::Result<()> {
        let checkpoint = Checkpoint {
            last_check: checked_on.to_owned(),
        };
        store::write_json_atomic(&self.path, &checkpoint)
            .with_context(|| format!("save checkpoint: {}", self.path.display()))
    }
}

/// `--since`, then `--days`, then the checkpoint, then 30 days back.
pub fn resolve_since(
    since: Option<&str>,
    days: Option<u32>,
    checkpoint: Option<&Checkpoint>,
    today: NaiveDate,
) -> anyhow::Result<String> {
    if let Some(since) = since {
        return parse_date(since).map(compact);
    }
    if let Some(days) = days {
        return Ok(compact(today - Duration::days(i64::from(days))));
    }
    if let Some(checkpoint) = checkpoint {
        return Ok(checkpoint.last_check.clone());
    }
    Ok(compact(today - Duration::days(DEFAULT_LOOKBACK_DAYS)))
}

/// Accepts `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(input: &str) -> anyhow::Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y%m%d"))
        .with_context(|| format!("invalid date {input:?} (expected YYYY-MM-DD or YYYYMMDD)"))
}

pub fn compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[derive(Debug, Serialize)]
pub struct AmendmentReport<'a> {
    pub since_date: &'a str,
    pub check_date: &'a str,
    pub affected_count: usize,
    pub affected: &'a [AffectedLaw],
}

fn revision_marker(revision_type: &str) -> &'static str {
    if revision_type == "제정" { "[new]" } else { "[amended]" }
}

fn preview(items: &[String], limit: usize) -> String {
    let mut out = items
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > limit {
        out.push_str("...");
    }
    out
}

pub fn format_text(affected: &[AffectedLaw], since: &str) -> String {
    TextReport { affected, since }.to_string()
}

/// Issue-ready Markdown with a review checklist per affected file.
pub fn format_markdown(affected: &[AffectedLaw], since: &str, generated_at: &str) -> String {
    MarkdownReport {
        affected,
        since,
        generated_at,
    }
    .to_string()
}

struct TextReport<'a> {
    affected: &'a [AffectedLaw],
    since: &'a str,
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let since = self.since;
        if self.affected.is_empty() {
            return writeln!(f, "법령 개정 없음 ({since} 이후)");
        }

        writeln!(f, "=== 법령 개정 감지 ({since} 이후) ===")?;
        writeln!(f, "총 {}개 법령 개정\n", self.affected.len())?;
        for law in self.affected {
            writeln!(
                f,
                "{} [{}] {}",
                revision_marker(&law.revision_type),
                law.revision_type,
                law.law_name
            )?;
            writeln!(
                f,
                "   공포일: {} | 시행일: {}",
                law.promulgation_date, law.enforcement_date
            )?;
            if !law.affected_files.is_empty() {
                writeln!(f, "   영향받는 파일:")?;
                for file in &law.affected_files {
                    if file.items.is_empty() {
                        writeln!(f, "     - {}", file.path)?;
                    } else {
                        writeln!(f, "     - {} [{}]", file.path, preview(&file.items, 3))?;
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

struct MarkdownReport<'a> {
    affected: &'a [AffectedLaw],
    since: &'a str,
    generated_at: &'a str,
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let since = self.since;
        if self.affected.is_empty() {
            writeln!(f, "## 법령 개정 없음 ({since} 이후)\n")?;
            return writeln!(f, "주요 법령 중 개정된 항목이 없습니다.");
        }

        writeln!(f, "## 법령 개정 감지 ({since} 이후)\n")?;
        writeln!(f, "총 **{}개** 법령이 개정되었습니다.\n", self.affected.len())?;
        writeln!(f, "### 개정된 법령\n")?;
        for law in self.affected {
            writeln!(f, "#### {}", law.law_name)?;
            writeln!(f, "- **개정 유형**: {}", law.revision_type)?;
            writeln!(f, "- **공포일**: {}", law.promulgation_date)?;
            writeln!(f, "- **시행일**: {}\n", law.enforcement_date)?;

            if law.affected_files.is_empty() {
                continue;
            }
            writeln!(f, "**영향받는 파일:**")?;
            for file in &law.affected_files {
                if file.items.is_empty() {
                    writeln!(f, "- [ ] `{}`", file.path)?;
                    continue;
                }
                let shown = file.items.iter().take(5).map(String::as_str).collect::<Vec<_>>();
                write!(f, "- [ ] `{}` ({}", file.path, shown.join(", "))?;
                if file.items.len() > 5 {
                    write!(f, " 외 {}개", file.items.len() - 5)?;
                }
                writeln!(f, ")")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "### 권장 조치\n")?;
        writeln!(f, "1. 개정 내용 확인 (https://www.law.go.kr)")?;
        writeln!(f, "2. 해당 YAML 파일 업데이트")?;
        writeln!(f, "3. `last_updated` 필드 갱신\n")?;
        writeln!(f, "---\n*자동 생성: {}*", self.generated_at)
    }
}
