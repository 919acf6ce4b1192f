//! Table-driven extraction of [`NormalizedRecord`]s from origin XML.
//!
//! Each [`DocumentKind`] owns an ordered list of logical fields, and each
//! field an ordered list of candidate source tags. Search rows and by-ID
//! documents name some fields differently, so both spellings sit in the same
//! candidate list; the first non-empty value wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::formats::{DocumentKind, NormalizedRecord};
use crate::xml::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    /// Rich text carrying HTML markup.
    Html { preserve_breaks: bool },
    /// Ordinance kind codes (`C0001`) to display names.
    OrdinanceType,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub candidates: &'static [&'static str],
    pub transform: Transform,
}

const fn plain(field: &'static str, candidates: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        field,
        candidates,
        transform: Transform::None,
    }
}

const fn html(
    field: &'static str,
    candidates: &'static [&'static str],
    preserve_breaks: bool,
) -> FieldSpec {
    FieldSpec {
        field,
        candidates,
        transform: Transform::Html { preserve_breaks },
    }
}

static STATUTE_FIELDS: &[FieldSpec] = &[
    plain("id", &["법령ID"]),
    plain("name", &["법령명_한글", "법령명한글", "법령명"]),
    plain("promulgation_date", &["공포일자"]),
    plain("promulgation_number", &["공포번호"]),
    plain("enforcement_date", &["시행일자"]),
    plain("ministry", &["소관부처명", "소관부처"]),
    plain("law_type", &["법령구분명", "법종구분"]),
    plain("revision_type", &["제개정구분명"]),
];

static PRECEDENT_FIELDS: &[FieldSpec] = &[
    plain("id", &["판례일련번호", "판례정보일련번호"]),
    plain("name", &["사건명"]),
    plain("case_number", &["사건번호"]),
    plain("court", &["법원명"]),
    plain("judgment_date", &["선고일자"]),
    plain("case_type", &["사건종류명"]),
    plain("judgment_type", &["판결유형"]),
    html("points", &["판시사항"], true),
    html("summary", &["판결요지"], true),
];

static ADMINISTRATIVE_RULE_FIELDS: &[FieldSpec] = &[
    plain("id", &["행정규칙일련번호"]),
    plain("name", &["행정규칙명", "행정규칙명한글"]),
    plain("rule_type", &["행정규칙종류"]),
    plain("promulgation_date", &["발령일자"]),
    plain("enforcement_date", &["시행일자"]),
    plain("ministry", &["소관부처명", "소관부처"]),
];

static LOCAL_ORDINANCE_FIELDS: &[FieldSpec] = &[
    plain("id", &["자치법규일련번호", "자치법규ID"]),
    plain("name", &["자치법규명"]),
    FieldSpec {
        field: "ordinance_type",
        candidates: &["자치법규종류"],
        transform: Transform::OrdinanceType,
    },
    plain("local_government", &["지자체기관명"]),
    plain("promulgation_date", &["공포일자"]),
    plain("enforcement_date", &["시행일자"]),
];

static INTERPRETATION_FIELDS: &[FieldSpec] = &[
    plain("id", &["법령해석례일련번호"]),
    plain("name", &["안건명"]),
    plain("case_number", &["안건번호"]),
    plain("requesting_agency", &["질의기관명"]),
    plain("responding_agency", &["회신기관명", "해석기관명"]),
    plain("response_date", &["회신일자", "해석일자"]),
    html("question", &["질의요지"], false),
    html("answer", &["회답"], false),
];

static CONSTITUTIONAL_DECISION_FIELDS: &[FieldSpec] = &[
    plain("id", &["헌재결정례일련번호"]),
    plain("name", &["사건명"]),
    plain("case_number", &["사건번호"]),
    plain("decision_date", &["종국일자"]),
    plain("decision_type", &["결정유형"]),
    plain("case_type", &["사건종류명", "사건종류"]),
    html("points", &["판시사항"], false),
    html("summary", &["결정요지"], false),
];

pub fn field_table(kind: DocumentKind) -> &'static [FieldSpec] {
    match kind {
        DocumentKind::Statute => STATUTE_FIELDS,
        DocumentKind::Precedent => PRECEDENT_FIELDS,
        DocumentKind::AdministrativeRule => ADMINISTRATIVE_RULE_FIELDS,
        DocumentKind::LocalOrdinance => LOCAL_ORDINANCE_FIELDS,
        DocumentKind::Interpretation => INTERPRETATION_FIELDS,
        DocumentKind::ConstitutionalDecision => CONSTITUTIONAL_DECISION_FIELDS,
    }
}

/// Reads every field of `kind`'s table from `element`'s descendants.
pub fn extract_one(element: &Element, kind: DocumentKind) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();
    for spec in field_table(kind) {
        let raw = spec
            .candidates
            .iter()
            .filter_map(|tag| element.find_text(tag))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or("");

        let value = match spec.transform {
            Transform::None => raw.to_owned(),
            Transform::Html { preserve_breaks } => clean_html_text(raw, preserve_breaks, None),
            Transform::OrdinanceType => ordinance_type_name(raw).to_owned(),
        };
        record.set(spec.field, value);
    }
    record
}

/// One record per repeating search element. An empty result set is `[]`.
pub fn extract_many(root: &Element, kind: DocumentKind) -> Vec<NormalizedRecord> {
    root.find_all(kind.search_element())
        .into_iter()
        .map(|row| extract_one(row, kind))
        .collect()
}

/// `totalCnt` of a search response, 0 when absent or malformed.
pub fn total_count(root: &Element) -> u64 {
    root.find_text("totalCnt")
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0)
}

fn ordinance_type_name(code: &str) -> &str {
    match code {
        "C0001" => "조례",
        "C0002" => "규칙",
        other => other,
    }
}

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("valid break tag regex"));
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Strips markup. Break tags become newlines first when `preserve_breaks`
/// is set. The result is trimmed, so breaks at either edge leave no newline.
/// `max_length` truncates the trimmed text by characters and appends `...`
/// only when something was cut.
pub fn clean_html_text(text: &str, preserve_breaks: bool, max_length: Option<usize>) -> String {
    let text = if preserve_breaks {
        BREAK_TAG.replace_all(text, "\n")
    } else {
        std::borrow::Cow::Borrowed(text)
    };
    let text = ANY_TAG.replace_all(&text, "");
    let text = text.trim();

    match max_length {
        Some(max) if max > 0 && text.chars().count() > max => {
            let mut truncated = text.chars().take(max).collect::<String>();
            truncated.push_str("...");
            truncated
        }
        _ => text.to_owned(),
    }
}

const NO_MATCH_PHRASES: &[&str] = &["일치하는", "해당하는"];
const NOT_FOUND_PHRASE: &str = "없습니다";
const MAX_INDICATOR_CHARS: usize = 200;

/// The origin answers unknown IDs with a valid document holding a short
/// message such as `일치하는 법령이 없습니다`. The root's own text is always
/// inspected. Leaf children of a flat envelope are inspected only when the
/// document carries no identifier for `kind`, so a real flat document (an
/// interpretation answering `...해당하는 ... 없습니다`) is never rejected.
pub fn detect_not_found(root: &Element, kind: DocumentKind) -> Option<String> {
    let mut candidates = vec![root.text.trim()];
    if root.children.iter().all(Element::is_leaf) && extract_one(root, kind).id().is_empty() {
        candidates.extend(root.children.iter().map(|child| child.text.trim()));
    }

    candidates
        .into_iter()
        .find(|text| {
            !text.is_empty()
                && text.chars().count() <= MAX_INDICATOR_CHARS
                && text.contains(NOT_FOUND_PHRASE)
                && NO_MATCH_PHRASES.iter().any(|phrase| text.contains(phrase))
        })
        .map(str::to_owned)
}

/// True when a payload that should be XML is an HTML page.
pub fn is_html_page(payload: &str) -> bool {
    let head = payload
        .trim_start()
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    #[test]
    fn every_kind_has_id_and_name_fields() {
        for kind in DocumentKind::ALL {
            let fields = field_table(kind)
                .iter()
                .map(|spec| spec.field)
                .collect::<Vec<_>>();
            assert_eq!(fields.first(), Some(&"id"), "kind={kind:?}");
            assert!(fields.contains(&"name"), "kind={kind:?}");
            assert!(
                field_table(kind).iter().all(|spec| !spec.candidates.is_empty()),
                "kind={kind:?}"
            );
        }
    }

    #[test]
    fn first_non_empty_candidate_wins() {
        let row = xml::parse(
            "<law><법령ID>001815</법령ID><법령명_한글> </법령명_한글>\
             <법령명한글>의료법</법령명한글><법령명>무시</법령명></law>",
        )
        .unwrap();
        let record = extract_one(&row, DocumentKind::Statute);
        assert_eq!(record.id(), "001815");
        assert_eq!(record.name(), "의료법");
        assert_eq!(record.get("ministry"), "");
        assert_eq!(record.get("enforcement_date"), "");
    }

    #[test]
    fn search_response_rows() {
        let root = xml::parse(
            r#"<LawSearch>
  <totalCnt>2</totalCnt>
  <law><법령ID>001815</법령ID><법령명한글>의료법</법령명한글><시행일자>20240101</시행일자><소관부처명>보건복지부</소관부처명></law>
  <law><법령ID>001816</법령ID><법령명한글>의료법 시행령</법령명한글></law>
</LawSearch>"#,
        )
        .unwrap();

        let records = extract_many(&root, DocumentKind::Statute);
        assert_eq!(total_count(&root), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("enforcement_date"), "20240101");
        assert_eq!(records[0].get("ministry"), "보건복지부");
        assert_eq!(records[1].name(), "의료법 시행령");
    }

    #[test]
    fn empty_search_is_not_an_error() {
        let root = xml::parse("<LawSearch><totalCnt>0</totalCnt></LawSearch>").unwrap();
        assert!(extract_many(&root, DocumentKind::Statute).is_empty());
        assert_eq!(total_count(&root), 0);
        assert_eq!(detect_not_found(&root, DocumentKind::Statute), None);
    }

    #[test]
    fn ordinance_rows_use_law_element_and_map_type_codes() {
        let root = xml::parse(
            "<OrdinSearch><law><자치법규ID>2001</자치법규ID><자치법규명>서울특별시 조례</자치법규명>\
             <자치법규종류>C0001</자치법규종류></law></OrdinSearch>",
        )
        .unwrap();
        let records = extract_many(&root, DocumentKind::LocalOrdinance);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "2001");
        assert_eq!(records[0].get("ordinance_type"), "조례");
    }

    #[test]
    fn precedent_holdings_keep_paragraphs() {
        let doc = xml::parse(
            "<PrecService><판례정보일련번호>123456</판례정보일련번호><사건번호>2023다12345</사건번호>\
             <판시사항><![CDATA[<p>[1] 첫째</p><br/>[2] 둘째]]></판시사항></PrecService>",
        )
        .unwrap();
        let record = extract_one(&doc, DocumentKind::Precedent);
        assert_eq!(record.id(), "123456");
        assert_eq!(record.get("case_number"), "2023다12345");
        assert_eq!(record.get("points"), "[1] 첫째\n[2] 둘째");
    }

    #[test]
    fn clean_html_text_variants() {
        assert_eq!(clean_html_text("<p>테스트</p>", false, None), "테스트");
        assert_eq!(clean_html_text("<div><p>테스트</p></div>", false, None), "테스트");
        assert_eq!(
            clean_html_text("줄1<br>줄2<br/>줄3", true, None),
            "줄1\n줄2\n줄3"
        );
        assert_eq!(clean_html_text("줄1<br>줄2", false, None), "줄1줄2");
        assert_eq!(
            clean_html_text("가나다라마바사아자차", false, Some(5)),
            "가나다라마..."
        );
        assert_eq!(clean_html_text("가나다", false, Some(10)), "가나다");
        assert_eq!(clean_html_text("가나다", false, Some(3)), "가나다");
    }

    #[test]
    fn preserved_breaks_leave_no_markup() {
        let input = "a<br>b<br />c<br/>d<b>e</b>";
        let cleaned = clean_html_text(input, true, None);
        assert!(!cleaned.contains('<') && !cleaned.contains('>'));
        assert_eq!(cleaned.matches('\n').count(), 3);
    }

    #[test]
    fn edge_breaks_are_trimmed_with_the_text() {
        assert_eq!(clean_html_text("a<br>", true, None), "a");
        assert_eq!(clean_html_text("<br/>a<br>b", true, None), "a\nb");
        assert_eq!(clean_html_text("<br>가나다라<br>", true, Some(3)), "가나다...");
    }

    #[test]
    fn truncation_is_idempotent_once_short() {
        let once = clean_html_text("가나다라마", false, Some(5));
        assert_eq!(clean_html_text(&once, false, Some(5)), once);
    }

    #[test]
    fn detects_not_found_messages() {
        let root = xml::parse("<Law>일치하는 법령이 없습니다. 법령명을 확인하여 주십시오.</Law>").unwrap();
        assert!(detect_not_found(&root, DocumentKind::Statute).is_some());

        let root =
            xml::parse("<Law><msg>ID '999'에 해당하는 법령을 찾을 수 없습니다</msg></Law>").unwrap();
        assert_eq!(
            detect_not_found(&root, DocumentKind::Statute).as_deref(),
            Some("ID '999'에 해당하는 법령을 찾을 수 없습니다")
        );
    }

    #[test]
    fn article_text_is_not_mistaken_for_not_found() {
        let root = xml::parse(
            "<법령><기본정보><법령ID>1</법령ID></기본정보>\
             <조문><조문단위><조문내용>해당하는 자는 신청할 수 없습니다.</조문내용></조문단위></조문></법령>",
        )
        .unwrap();
        assert_eq!(detect_not_found(&root, DocumentKind::Statute), None);
    }

    #[test]
    fn flat_document_with_an_identifier_is_never_not_found() {
        let root = xml::parse(
            "<ExpcService><법령해석례일련번호>313107</법령해석례일련번호>\
             <안건명>건축물 사용승인 관련</안건명>\
             <회답>「건축법」 제2조에 해당하는 건축물은 허가 없이 사용할 수 없습니다.</회답></ExpcService>",
        )
        .unwrap();
        assert_eq!(detect_not_found(&root, DocumentKind::Interpretation), None);

        let envelope =
            xml::parse("<ExpcService><msg>일치하는 해석례가 없습니다</msg></ExpcService>").unwrap();
        assert!(detect_not_found(&envelope, DocumentKind::Interpretation).is_some());
    }

    #[test]
    fn recognises_html_error_pages() {
        assert!(is_html_page("  <!DOCTYPE html><html></html>"));
        assert!(is_html_page("<HTML><body>blocked</body></HTML>"));
        assert!(!is_html_page("<?xml version=\"1.0\"?><LawSearch/>"));
    }
}
