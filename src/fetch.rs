//! `fetch`: download one document (or a statute with its decrees) into the cache.

use std::path::Path;

use anyhow::Context as _;

use crate::api::{LawApi, SearchQuery};
use crate::cache::LawCache;
use crate::cli::FetchArgs;
use crate::context::AppContext;
use crate::error::Error;
use crate::formats::{CacheEntry, DocumentKind, NormalizedRecord};
use crate::registry::{LawRegistry, strip_spaces};

/// Candidates considered when resolving a name or case number by search.
const NAME_SEARCH_SIZE: u32 = 5;
const DECREE_SEARCH_SIZE: u32 = 3;
const DECREE_SUFFIXES: [&str; 2] = ["시행령", "시행규칙"];

pub fn run(args: FetchArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let cache = ctx.cache();

    if let Some(id) = args.id.as_deref() {
        return fetch_by_id(ctx, &cache, args.kind, id, args.force);
    }
    if let Some(case) = args.case.as_deref() {
        let api = ctx.api()?;
        let entry = fetch_case(&api, &cache, case)?;
        print_saved(&entry);
        return Ok(());
    }
    if let Some(name) = args.name.as_deref() {
        let registry = ctx.registry()?;
        fetch_by_name(ctx, &cache, &registry, name, args.force)?;
        if args.with_decree {
            let api = ctx.api()?;
            for entry in fetch_decrees(&api, &cache, name) {
                print_saved(&entry);
            }
        }
        return Ok(());
    }
    anyhow::bail!("one of --id, --name or --case is required")
}

fn fetch_by_id(
    ctx: &AppContext,
    cache: &LawCache,
    kind: DocumentKind,
    id: &str,
    force: bool,
) -> anyhow::Result<()> {
    // Only statutes are read back from the cache; other kinds always refetch.
    if kind == DocumentKind::Statute
        && !force
        && let Some(path) = cache.find(kind, Some(id), None)?
    {
        print_cached(&path);
        return Ok(());
    }

    let api = ctx.api()?;
    let entry = download(&api, cache, kind, id)?;
    print_saved(&entry);
    Ok(())
}

fn fetch_by_name(
    ctx: &AppContext,
    cache: &LawCache,
    registry: &LawRegistry,
    name: &str,
    force: bool,
) -> anyhow::Result<()> {
    if !force && let Some(path) = cache.find(DocumentKind::Statute, None, Some(name))? {
        print_cached(&path);
        return Ok(());
    }

    let api = ctx.api()?;
    let id = match registry.law_id(name) {
        Some(id) => {
            tracing::debug!(name, id, "resolved through the major-law registry");
            id.to_owned()
        }
        None => resolve_by_search(&api, DocumentKind::Statute, name, "name")?,
    };
    let entry = download(&api, cache, DocumentKind::Statute, &id)?;
    print_saved(&entry);
    Ok(())
}

fn fetch_case(api: &LawApi<'_>, cache: &LawCache, case_number: &str) -> anyhow::Result<CacheEntry> {
    let id = resolve_by_search(api, DocumentKind::Precedent, case_number, "case_number")?;
    download(api, cache, DocumentKind::Precedent, &id)
}

/// Enforcement decree and rule of `name`. Failures are logged and skipped.
fn fetch_decrees(api: &LawApi<'_>, cache: &LawCache, name: &str) -> Vec<CacheEntry> {
    let mut saved = Vec::new();
    for suffix in DECREE_SUFFIXES {
        let query = format!("{name}{suffix}");
        match fetch_decree(api, cache, &query, suffix) {
            Ok(Some(entry)) => saved.push(entry),
            Ok(None) => tracing::warn!(%query, "no matching decree found"),
            Err(err) => tracing::warn!(%query, error = %format!("{err:#}"), "decree fetch failed"),
        }
    }
    saved
}

fn fetch_decree(
    api: &LawApi<'_>,
    cache: &LawCache,
    query: &str,
    suffix: &str,
) -> anyhow::Result<Option<CacheEntry>> {
    let search = SearchQuery {
        display: DECREE_SEARCH_SIZE,
        ..SearchQuery::new(query)
    };
    let page = api.search(DocumentKind::Statute, &search)?;
    let Some(hit) = page
        .records
        .iter()
        .find(|record| record.name().contains(suffix) && !record.id().is_empty())
    else {
        return Ok(None);
    };
    download(api, cache, DocumentKind::Statute, hit.id()).map(Some)
}

/// Searches for `key` and returns the id of the row whose `field` equals it
/// (ignoring spaces), else of the first row.
fn resolve_by_search(
    api: &LawApi<'_>,
    kind: DocumentKind,
    key: &str,
    field: &str,
) -> anyhow::Result<String> {
    let query = SearchQuery {
        display: NAME_SEARCH_SIZE,
        ..SearchQuery::new(key)
    };
    let page = api
        .search(kind, &query)
        .with_context(|| format!("search {} for {key:?}", kind.target()))?;

    pick_match(&page.records, field, key)
        .map(|record| record.id().to_owned())
        .ok_or_else(|| {
            Error::NotFound {
                kind,
                key: key.to_owned(),
                message: "no search results".to_owned(),
            }
            .into()
        })
}

pub fn pick_match<'r>(
    records: &'r [NormalizedRecord],
    field: &str,
    key: &str,
) -> Option<&'r NormalizedRecord> {
    let wanted = strip_spaces(key);
    records
        .iter()
        .find(|record| record.get(field) == key)
        .or_else(|| records.iter().find(|record| strip_spaces(record.get(field)) == wanted))
        .or_else(|| records.first())
}

fn download(
    api: &LawApi<'_>,
    cache: &LawCache,
    kind: DocumentKind,
    id: &str,
) -> anyhow::Result<CacheEntry> {
    let document = api
        .fetch_document(kind, id)
        .with_context(|| format!("fetch {} {id}", kind.target()))?;
    cache.save(&document)
}

fn print_cached(path: &Path) {
    println!("cached: {}", path.display());
}

fn print_saved(entry: &CacheEntry) {
    println!(
        "saved: [{}] {} (ID: {}) -> {}",
        entry.kind,
        entry.name,
        entry.identifier,
        entry.path.display()
    );
}
