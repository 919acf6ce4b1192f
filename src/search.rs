//! `search`, `exact`, `cases` and `recent`: origin searches printed for
//! humans or as JSON.

use std::collections::HashSet;
use std::fmt;

use anyhow::Context as _;
use chrono::{Duration, Local};
use serde_json::json;

use crate::amendments::compact;
use crate::api::{LawApi, SearchQuery};
use crate::cli::{CasesArgs, ExactArgs, OutputFormat, RecentArgs, SearchArgs};
use crate::context::AppContext;
use crate::extract::{self, Transform};
use crate::formats::{DocumentKind, NormalizedRecord};
use crate::registry::strip_spaces;

/// Rich-text preview length in search listings.
const PREVIEW_CHARS: usize = 200;
/// Answers and summaries get a longer preview.
const LONG_PREVIEW_CHARS: usize = 500;
/// Name searches are partial on the origin, so pull a wide page and filter.
const EXACT_SEARCH_SIZE: u32 = 100;
const ADMIN_RULE_SEARCH_SIZE: u32 = 10;
const DECREE_MARKERS: [&str; 2] = ["시행령", "시행규칙"];

pub fn search(args: SearchArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let query = SearchQuery {
        page: args.page,
        display: args.display,
        sort: args.sort.map(|sort| sort.as_param().to_owned()),
        ..SearchQuery::new(args.query.clone())
    };
    let page = api
        .search(args.kind, &query)
        .with_context(|| format!("search {} for {:?}", args.kind.target(), args.query))?;

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "query": args.query,
            "type": args.kind.target(),
            "total": page.total,
            "page": args.page,
            "display": args.display,
            "results": page.records,
        }))?,
        OutputFormat::Text => {
            print!(
                "{}",
                format_listing(args.kind, &args.query, page.total, &page.records)
            );
        }
    }
    Ok(())
}

pub fn exact(args: ExactArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let major_law_id = registry.law_id(&args.name).map(str::to_owned);

    let api = ctx.api()?;
    let query = SearchQuery {
        display: EXACT_SEARCH_SIZE,
        ..SearchQuery::new(args.name.clone())
    };
    let page = api
        .search(DocumentKind::Statute, &query)
        .with_context(|| format!("search statutes for {:?}", args.name))?;
    let matches = partition_exact(page.records, &args.name);

    let admin_rules = if args.with_admrul {
        related_admin_rules(&api, &args.name)
    } else {
        Vec::new()
    };

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "query": args.name,
            "major_law_id": major_law_id,
            "exact_matches": matches.exact,
            "related_laws": matches.related,
            "admin_rules": admin_rules,
        }))?,
        OutputFormat::Text => print!(
            "{}",
            ExactReport {
                name: &args.name,
                major_law_id: major_law_id.as_deref(),
                matches: &matches,
                admin_rules: args.with_admrul.then_some(admin_rules.as_slice()),
            }
        ),
    }
    Ok(())
}

/// Rows of a statute name search split by how they relate to `name`.
#[derive(Debug, Default)]
pub struct ExactMatches {
    /// Same name once spaces are removed.
    pub exact: Vec<NormalizedRecord>,
    /// Decrees and rules whose name starts with `name`.
    pub related: Vec<NormalizedRecord>,
}

pub fn partition_exact(records: Vec<NormalizedRecord>, name: &str) -> ExactMatches {
    let wanted = strip_spaces(name);
    let mut matches = ExactMatches::default();
    for record in records {
        let compact = strip_spaces(record.name());
        if compact == wanted {
            matches.exact.push(record);
        } else if compact.starts_with(&wanted)
            && DECREE_MARKERS.iter().any(|marker| record.name().contains(marker))
        {
            matches.related.push(record);
        }
    }
    matches
}

/// Administrative rules found under `name`, `name 시행` and `name 기준`,
/// de-duplicated by id. A failed term is logged and skipped.
pub fn related_admin_rules(api: &LawApi<'_>, name: &str) -> Vec<NormalizedRecord> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for term in [name.to_owned(), format!("{name} 시행"), format!("{name} 기준")] {
        let query = SearchQuery {
            display: ADMIN_RULE_SEARCH_SIZE,
            ..SearchQuery::new(term.clone())
        };
        match api.search(DocumentKind::AdministrativeRule, &query) {
            Ok(page) => rules.extend(
                page.records
                    .into_iter()
                    .filter(|record| seen.insert(record.id().to_owned())),
            ),
            Err(err) => tracing::warn!(%term, error = %err, "administrative rule search failed"),
        }
    }
    rules
}

struct ExactReport<'a> {
    name: &'a str,
    major_law_id: Option<&'a str>,
    matches: &'a ExactMatches,
    admin_rules: Option<&'a [NormalizedRecord]>,
}

impl fmt::Display for ExactReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name;
        writeln!(f, "=== 법령 정확 검색: '{name}' ===\n")?;
        if let Some(id) = self.major_law_id {
            writeln!(f, "'{name}'은 주요 법령입니다: beopsuny fetch --id {id}\n")?;
        }

        if self.matches.exact.is_empty() {
            writeln!(f, "'{name}'과 정확히 일치하는 법령이 없습니다.\n")?;
        } else {
            writeln!(f, "정확히 일치하는 법령:\n")?;
            write_numbered(f, DocumentKind::Statute, &self.matches.exact)?;
        }
        if !self.matches.related.is_empty() {
            writeln!(f, "관련 법령 (시행령/시행규칙):\n")?;
            write_numbered(f, DocumentKind::Statute, &self.matches.related)?;
        }
        if self.matches.exact.is_empty() && self.matches.related.is_empty() {
            writeln!(f, "힌트: 부분 일치 검색은 beopsuny search \"{name}\"")?;
        }

        if let Some(rules) = self.admin_rules {
            writeln!(f, "관련 행정규칙 (고시/훈령/예규): {}건\n", rules.len())?;
            write_numbered(f, DocumentKind::AdministrativeRule, rules)?;
        }
        Ok(())
    }
}

pub fn cases(args: CasesArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let query = SearchQuery {
        page: args.page,
        display: args.display,
        sort: args.from_date.as_ref().map(|_| "date".to_owned()),
        ..SearchQuery::new(args.query.clone())
    };
    let page = api
        .search(DocumentKind::Precedent, &query)
        .with_context(|| format!("search precedents for {:?}", args.query))?;

    let records = filter_cases(page.records, args.court.as_deref(), args.from_date.as_deref());

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "query": args.query,
            "court_filter": args.court,
            "from_date": args.from_date,
            "total": page.total,
            "page": args.page,
            "display": args.display,
            "results": records,
        }))?,
        OutputFormat::Text => {
            print!(
                "{}",
                format_listing(DocumentKind::Precedent, &args.query, page.total, &records)
            );
        }
    }
    Ok(())
}

/// Court is a substring match; the date bound is lexical on `YYYYMMDD`.
/// Rows without a judgment date are kept.
pub fn filter_cases(
    records: Vec<NormalizedRecord>,
    court: Option<&str>,
    from_date: Option<&str>,
) -> Vec<NormalizedRecord> {
    records
        .into_iter()
        .filter(|record| court.is_none_or(|court| record.get("court").contains(court)))
        .filter(|record| {
            let date = record.get("judgment_date");
            from_date.is_none_or(|from| date.is_empty() || date >= from)
        })
        .collect()
}

pub fn recent(args: RecentArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let (from, to) = match (args.from_date, args.to_date) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            let today = Local::now().date_naive();
            (
                compact(today - Duration::days(i64::from(args.days))),
                compact(today),
            )
        }
    };

    let api = ctx.api()?;
    let page = api
        .recent_amendments(&from, &to, args.date_type, args.display)
        .with_context(|| format!("list amendments {from}~{to}"))?;

    match args.format {
        OutputFormat::Json => print_json(&json!({
            "from": from,
            "to": to,
            "total": page.total,
            "results": page.records,
        }))?,
        OutputFormat::Text => {
            println!("=== 최근 개정 법령 ({from} ~ {to}) ===");
            println!("총 {}건\n", page.total);
            for (position, record) in page.records.iter().enumerate() {
                println!(
                    "{}. [{}] {}",
                    position + 1,
                    record.get("revision_type"),
                    record.name()
                );
                println!(
                    "   공포일: {} | 시행일: {} | ID: {}",
                    record.get("promulgation_date"),
                    record.get("enforcement_date"),
                    record.id()
                );
            }
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize results")?;
    println!("{text}");
    Ok(())
}

/// Numbered listing in the kind's field order; rich fields are previewed.
pub fn format_listing(
    kind: DocumentKind,
    query: &str,
    total: u64,
    records: &[NormalizedRecord],
) -> String {
    Listing {
        kind,
        query,
        total,
        records,
    }
    .to_string()
}

struct Listing<'a> {
    kind: DocumentKind,
    query: &'a str,
    total: u64,
    records: &'a [NormalizedRecord],
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} 검색: {} ===", self.kind.label(), self.query)?;
        writeln!(f, "총 {}건 중 {}건 표시\n", self.total, self.records.len())?;
        if self.records.is_empty() {
            return writeln!(f, "검색 결과가 없습니다.");
        }
        write_numbered(f, self.kind, self.records)
    }
}

fn write_numbered(
    out: &mut impl fmt::Write,
    kind: DocumentKind,
    records: &[NormalizedRecord],
) -> fmt::Result {
    for (position, record) in records.iter().enumerate() {
        writeln!(out, "{}. {}", position + 1, record.name())?;
        write_record(out, kind, record)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Every non-empty field except the name, indented under the heading line.
fn write_record(
    out: &mut impl fmt::Write,
    kind: DocumentKind,
    record: &NormalizedRecord,
) -> fmt::Result {
    for spec in extract::field_table(kind) {
        if spec.field == "name" {
            continue;
        }
        let value = record.get(spec.field);
        if value.is_empty() {
            continue;
        }
        let value = match spec.transform {
            Transform::Html { .. } => {
                let limit = match spec.field {
                    "summary" | "answer" => LONG_PREVIEW_CHARS,
                    _ => PREVIEW_CHARS,
                };
                extract::clean_html_text(value, false, Some(limit))
            }
            _ => value.to_owned(),
        };
        writeln!(out, "   {}: {value}", spec.field)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precedent(court: &str, date: &str) -> NormalizedRecord {
        let mut record = NormalizedRecord::default();
        record.set("id", format!("{court}-{date}"));
        record.set("name", "손해배상");
        record.set("court", court);
        record.set("judgment_date", date);
        record
    }

    #[test]
    fn case_filters_are_substring_and_lexical() {
        let records = vec![
            precedent("대법원", "20230115"),
            precedent("서울고등법원", "20220301"),
            precedent("대법원", "20210101"),
            precedent("대법원", ""),
        ];

        let kept = filter_cases(records.clone(), Some("대법"), Some("20220101"));
        let ids = kept.iter().map(NormalizedRecord::id).collect::<Vec<_>>();
        assert_eq!(ids, ["대법원-20230115", "대법원-"]);

        assert_eq!(filter_cases(records, None, None).len(), 4);
    }

    #[test]
    fn listing_previews_rich_fields_and_skips_empty_ones() {
        let mut record = NormalizedRecord::default();
        record.set("id", "228541");
        record.set("name", "손해배상(기)");
        record.set("case_number", "2022다12345");
        record.set("points", format!("<p>{}</p>", "가".repeat(300)));

        let listing = format_listing(DocumentKind::Precedent, "손해배상", 1, &[record]);

        assert!(listing.contains("=== 판례 검색: 손해배상 ==="));
        assert!(listing.contains("1. 손해배상(기)"));
        assert!(listing.contains("   case_number: 2022다12345"));
        assert!(listing.contains(&format!("   points: {}...", "가".repeat(PREVIEW_CHARS))));
        assert!(!listing.contains("court:"));
        assert!(!listing.contains("<p>"));
    }

    fn statute(id: &str, name: &str) -> NormalizedRecord {
        let mut record = NormalizedRecord::default();
        record.set("id", id);
        record.set("name", name);
        record
    }

    #[test]
    fn exact_lookup_separates_the_law_from_its_decrees() {
        let records = vec![
            statute("001815", "의료법"),
            statute("003837", "의료법 시행령"),
            statute("006440", "의료법 시행규칙"),
            statute("009999", "의료법인 설립 기준"),
            statute("001788", "응급의료에 관한 법률"),
        ];

        let matches = partition_exact(records, "의료법");

        let ids = |rows: &[NormalizedRecord]| {
            rows.iter().map(|r| r.id().to_owned()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&matches.exact), ["001815"]);
        assert_eq!(ids(&matches.related), ["003837", "006440"]);
    }

    #[test]
    fn exact_lookup_ignores_spacing() {
        let matches = partition_exact(
            vec![statute("011357", "개인정보 보호법"), statute("011468", "개인정보 보호법 시행령")],
            "개인정보보호법",
        );
        assert_eq!(matches.exact.len(), 1);
        assert_eq!(matches.related.len(), 1);
        assert!(partition_exact(Vec::new(), "민법").exact.is_empty());
    }

    #[test]
    fn exact_report_without_match_suggests_a_partial_search() {
        let matches = ExactMatches::default();
        let text = ExactReport {
            name: "없는법",
            major_law_id: None,
            matches: &matches,
            admin_rules: None,
        }
        .to_string();

        assert!(text.contains("'없는법'과 정확히 일치하는 법령이 없습니다."));
        assert!(text.contains("beopsuny search \"없는법\""));
        assert!(!text.contains("행정규칙"));
    }

    #[test]
    fn empty_listing_says_so() {
        let listing = format_listing(DocumentKind::Statute, "없는법", 0, &[]);
        assert!(listing.contains("총 0건 중 0건 표시"));
        assert!(listing.contains("검색 결과가 없습니다."));
    }
}
