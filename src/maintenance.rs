//! Maintenance commands over the curated assets: reverse index, amendment
//! checks, citation validation and relay status.

use std::fmt::{self, Write as _};
use std::time::Duration;

use anyhow::Context as _;
use chrono::Local;
use serde_json::json;

use crate::amendments::{self, AmendmentChecker, AmendmentReport, CheckpointStore};
use crate::citations::{self, CitationValidator};
use crate::cli::{
    CheckUpdatesArgs, IndexBuildArgs, IndexLookupArgs, OutputFormat, ReportFormat,
    ValidateCitationsArgs,
};
use crate::config::{ENV_GATEWAY_API_KEY, ENV_GATEWAY_URL};
use crate::context::AppContext;
use crate::formats::{Checkpoint, Citation, CitationCheck, CitingFile};
use crate::index::ReverseIndex;
use crate::registry::{self, LawRegistry};

/// What `check-updates` found; `main` turns it into the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoAmendments,
    AmendmentsFound,
    CheckFailed,
}

pub fn index_build(args: IndexBuildArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let index = ReverseIndex::build(&ctx.layout, &registry)?;

    if args.save {
        let path = ctx.layout.reverse_index_path();
        index.save(&path)?;
        println!("saved: {} ({} laws)", path.display(), index.len());
        return Ok(());
    }

    match args.format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(&index).context("serialize reverse index")?;
            println!("{text}");
        }
        OutputFormat::Text if index.is_empty() => {
            println!("no curated file cites a registered law");
        }
        OutputFormat::Text => {
            let mut out = String::new();
            write_index(&mut out, &index).context("render reverse index")?;
            print!("{out}");
        }
    }
    Ok(())
}

pub fn index_lookup(args: IndexLookupArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let index = ReverseIndex::build(&ctx.layout, &registry)?;

    let Some((law, files)) = lookup_law(&index, &registry, &args.law) else {
        anyhow::bail!("no curated file cites {:?}", args.law);
    };

    match args.format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(&json!({ "law": law, "files": files }))
                .context("serialize lookup")?;
            println!("{text}");
        }
        OutputFormat::Text => {
            let mut out = String::new();
            writeln!(out, "{law} ({}개 파일)", files.len())
                .and_then(|()| write_files(&mut out, files))
                .context("render lookup")?;
            print!("{out}");
        }
    }
    Ok(())
}

/// Exact key first, then the alias-normalised registry name.
pub fn lookup_law<'i>(
    index: &'i ReverseIndex,
    registry: &LawRegistry,
    law: &str,
) -> Option<(String, &'i [CitingFile])> {
    let files = index.lookup(law);
    if !files.is_empty() {
        return Some((law.to_owned(), files));
    }
    let canonical = registry::normalize_alias(law);
    let known = registry.match_known(canonical).unwrap_or(canonical);
    let files = index.lookup(known);
    (!files.is_empty()).then(|| (known.to_owned(), files))
}

fn write_index(out: &mut String, index: &ReverseIndex) -> fmt::Result {
    writeln!(out, "=== 법령 → 파일 인덱스 ({}개 법령) ===\n", index.len())?;
    for (law, files) in index.iter() {
        writeln!(out, "{law}")?;
        write_files(out, files)?;
    }
    Ok(())
}

fn write_files(out: &mut String, files: &[CitingFile]) -> fmt::Result {
    for file in files {
        if file.items.is_empty() {
            writeln!(out, "  - {}", file.path)?;
        } else {
            writeln!(out, "  - {} [{}]", file.path, file.items.join(", "))?;
        }
    }
    Ok(())
}

pub fn check_updates(args: CheckUpdatesArgs, ctx: &AppContext) -> anyhow::Result<UpdateOutcome> {
    let checkpoints = CheckpointStore::new(ctx.layout.checkpoint_path());
    let checkpoint = checkpoints.load()?;
    let now = Local::now();
    let today = now.date_naive();
    let since = amendments::resolve_since(
        args.since.as_deref(),
        args.days,
        checkpoint.as_ref(),
        today,
    )?;
    let check_date = amendments::compact(today);

    let registry = ctx.registry()?;
    if registry.is_empty() {
        anyhow::bail!(
            "no major laws registered in {}",
            ctx.layout.law_index_path().display()
        );
    }
    let api = ctx.api()?;
    let index = ReverseIndex::load_or_build(&ctx.layout, &registry)?;

    tracing::info!(%since, %check_date, "checking amendments");
    let affected = match AmendmentChecker::new(&api, &registry, &index).check(&since, &check_date)
    {
        amendments::AmendmentCheck::Reported(affected) => affected,
        amendments::AmendmentCheck::Failed(reason) => {
            eprintln!("amendment check failed: {reason}");
            eprintln!("state left unchanged; last check stays at {}", describe(checkpoint.as_ref()));
            return Ok(UpdateOutcome::CheckFailed);
        }
    };

    match args.format {
        ReportFormat::Text => print!("{}", amendments::format_text(&affected, &since)),
        ReportFormat::Markdown => {
            let generated_at = now.format("%Y-%m-%d %H:%M").to_string();
            print!(
                "{}",
                amendments::format_markdown(&affected, &since, &generated_at)
            );
        }
        ReportFormat::Json => {
            let report = AmendmentReport {
                since_date: &since,
                check_date: &check_date,
                affected_count: affected.len(),
                affected: &affected,
            };
            let text = serde_json::to_string_pretty(&report).context("serialize report")?;
            println!("{text}");
        }
    }

    if args.update_state {
        checkpoints.advance(&check_date)?;
        tracing::info!(last_check = %check_date, "checkpoint advanced");
    }

    Ok(if affected.is_empty() {
        UpdateOutcome::NoAmendments
    } else {
        UpdateOutcome::AmendmentsFound
    })
}

fn describe(checkpoint: Option<&Checkpoint>) -> &str {
    checkpoint
        .map(|c| c.last_check.as_str())
        .unwrap_or("(never)")
}

/// Returns the number of invalid citations.
pub fn validate_citations(args: ValidateCitationsArgs, ctx: &AppContext) -> anyhow::Result<usize> {
    let found = citations::collect(&ctx.layout)?;
    let selected = select_citations(found, args.law.as_deref(), args.limit);
    tracing::info!(citations = selected.len(), "citations collected");

    if args.dry_run {
        print_dry_run(&selected, args.format)?;
        return Ok(0);
    }

    let registry = ctx.registry()?;
    let api = ctx.api()?;
    let validator =
        CitationValidator::new(&api, &registry, Duration::from_millis(args.delay_ms));
    let results = validator.validate(selected);

    match args.format {
        ReportFormat::Text => print!("{}", citations::format_text(&results)),
        ReportFormat::Markdown => {
            let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
            print!("{}", citations::format_markdown(&results, &generated_at));
        }
        ReportFormat::Json => print_checks_json(&results)?,
    }
    Ok(citations::tally(&results).invalid)
}

/// De-duplicated, optionally filtered by law name, capped at `limit`.
pub fn select_citations(
    found: Vec<Citation>,
    law: Option<&str>,
    limit: Option<usize>,
) -> Vec<Citation> {
    citations::deduplicate(found)
        .into_iter()
        .filter(|c| law.is_none_or(|law| c.law_name.contains(law)))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn print_dry_run(selected: &[Citation], format: ReportFormat) -> anyhow::Result<()> {
    if format == ReportFormat::Json {
        let text = serde_json::to_string_pretty(selected).context("serialize citations")?;
        println!("{text}");
        return Ok(());
    }
    println!("=== 추출된 조문 인용 ({}개) ===\n", selected.len());
    for citation in selected {
        println!("- {} ({})", citation.full_text, citation.file);
    }
    Ok(())
}

fn print_checks_json(results: &[CitationCheck]) -> anyhow::Result<()> {
    let counts = citations::tally(results);
    let text = serde_json::to_string_pretty(&json!({
        "total": results.len(),
        "valid": counts.valid,
        "unknown": counts.unknown,
        "invalid": counts.invalid,
        "results": results,
    }))
    .context("serialize citation checks")?;
    println!("{text}");
    Ok(())
}

pub fn gateway_status(ctx: &AppContext) {
    let gateway = &ctx.settings.gateway;
    match gateway.relay_url.as_deref() {
        Some(url) => {
            println!("relay: configured");
            println!("  url: {url}");
            let key = if gateway.relay_api_key.is_some() { "set" } else { "not set" };
            println!("  api key: {key}");
        }
        None => {
            println!("relay: not configured (requests go directly to the origin)");
            println!("  set {ENV_GATEWAY_URL} (and {ENV_GATEWAY_API_KEY}) to route through a relay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(law: &str, article: &str) -> Citation {
        Citation {
            law_name: law.to_owned(),
            article: article.to_owned(),
            paragraph: None,
            full_text: format!("{law} {article}"),
            file: "checklists/hr.yaml".to_owned(),
        }
    }

    #[test]
    fn selection_deduplicates_filters_then_limits() {
        let found = vec![
            citation("근로기준법", "제60조"),
            citation("근로기준법", "제60조"),
            citation("상법", "제401조"),
            citation("근로기준법", "제61조"),
            citation("근로기준법", "제62조"),
        ];

        let selected = select_citations(found, Some("근로"), Some(2));
        let articles = selected.iter().map(|c| c.article.as_str()).collect::<Vec<_>>();
        assert_eq!(articles, ["제60조", "제61조"]);
    }

    #[test]
    fn lookup_falls_back_to_alias_and_registry_name() {
        let registry = LawRegistry::from_entries([("개인정보보호법", "011357")]);
        let index: ReverseIndex = serde_json::from_value(json!({
            "개인정보보호법": [{ "path": "compliance_calendar.yaml", "items": ["privacy-audit"] }]
        }))
        .unwrap();

        let (law, files) = lookup_law(&index, &registry, "개보법").unwrap();
        assert_eq!(law, "개인정보보호법");
        assert_eq!(files[0].items, ["privacy-audit"]);
        assert!(lookup_law(&index, &registry, "상법").is_none());
    }
}
