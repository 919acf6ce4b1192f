mod law_stub;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use law_stub::{ADMIN_RULE_SEARCH_XML, LawStub, NAME_SEARCH_XML, query_param};
use predicates::prelude::*;

fn beopsuny(home: &Path, stub: &LawStub) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("beopsuny");
    cmd.arg("--home")
        .arg(home)
        .env("BEOPSUNY_OC_CODE", "test")
        .env("BEOPSUNY_API_BASE_URL", &stub.base_url)
        .env_remove("BEOPSUNY_GATEWAY_URL")
        .env_remove("BEOPSUNY_GATEWAY_API_KEY")
        .env_remove("BEOPSUNY_HOME")
        .env_remove("RUST_LOG");
    cmd
}

/// Statute searches answer with `NAME_SEARCH_XML`; the second administrative
/// rule search fails, the others repeat the same two rules.
fn origin() -> LawStub {
    let rule_searches = AtomicUsize::new(0);
    LawStub::spawn(move |url| {
        if query_param(url, "target").as_deref() != Some("admrul") {
            return (200, NAME_SEARCH_XML.to_owned());
        }
        match rule_searches.fetch_add(1, Ordering::SeqCst) {
            1 => (500, "internal error".to_owned()),
            _ => (200, ADMIN_RULE_SEARCH_XML.to_owned()),
        }
    })
}

#[test]
fn exact_lookup_reports_law_decrees_and_rules_as_json() {
    let stub = origin();
    let home = tempfile::tempdir().unwrap();

    let output = beopsuny(home.path(), &stub)
        .args(["exact", "의료법", "--with-admrul", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(report["query"], "의료법");
    assert!(report["major_law_id"].is_null());
    let ids = |key: &str| {
        report[key]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["id"].as_str().unwrap().to_owned())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids("exact_matches"), ["001815"]);
    assert_eq!(ids("related_laws"), ["003837", "006440"]);
    assert_eq!(ids("admin_rules"), ["2100000201", "2100000202"]);

    let searches = stub
        .requests()
        .iter()
        .map(|r| {
            (
                query_param(&r.url, "target").unwrap_or_default(),
                query_param(&r.url, "query").unwrap_or_default(),
                query_param(&r.url, "display").unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        searches,
        [
            ("law".to_owned(), "의료법".to_owned(), "100".to_owned()),
            ("admrul".to_owned(), "의료법".to_owned(), "10".to_owned()),
            ("admrul".to_owned(), "의료법 시행".to_owned(), "10".to_owned()),
            ("admrul".to_owned(), "의료법 기준".to_owned(), "10".to_owned()),
        ]
    );
}

#[test]
fn exact_lookup_text_notes_registered_laws() {
    let stub = origin();
    let home = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(home.path().join("assets")).unwrap();
    std::fs::write(
        home.path().join("assets/law_index.yaml"),
        "major_laws:\n  의료법: \"001815\"\n",
    )
    .unwrap();

    beopsuny(home.path(), &stub)
        .args(["exact", "의료법"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== 법령 정확 검색: '의료법' ==="))
        .stdout(predicate::str::contains("beopsuny fetch --id 001815"))
        .stdout(predicate::str::contains("정확히 일치하는 법령:"))
        .stdout(predicate::str::contains("관련 법령 (시행령/시행규칙):"))
        .stdout(predicate::str::contains("응급의료").not())
        .stdout(predicate::str::contains("행정규칙").not());

    assert!(
        stub.requests()
            .iter()
            .all(|r| query_param(&r.url, "target").as_deref() == Some("law"))
    );
}
