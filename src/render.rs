//! Statute XML → Markdown with YAML front matter.

use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;

use crate::cache::sanitize_filename;
use crate::cli::ParseArgs;
use crate::config::Layout;
use crate::extract::{self, clean_html_text};
use crate::formats::{DocumentKind, NormalizedRecord, StatuteFrontMatter};
use crate::store;
use crate::xml::{self, Element};

const SOURCE_NAME: &str = "국가법령정보센터";
const CIRCLED: [char; 20] = [
    '①', '②', '③', '④', '⑤', '⑥', '⑦', '⑧', '⑨', '⑩', '⑪', '⑫', '⑬', '⑭', '⑮', '⑯', '⑰', '⑱', '⑲',
    '⑳',
];

static STRUCTURE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*제\d+[장절관편]").expect("valid heading regex"));
static ARTICLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^제\d+조(?:의\d+)?(?:\([^)]+\))?\s*").expect("valid article prefix regex")
});
static PARAGRAPH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[①②③④⑤⑥⑦⑧⑨⑩⑪⑫⑬⑭⑮⑯⑰⑱⑲⑳]\s*").expect("valid paragraph prefix regex")
});
static ITEM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("valid item prefix regex"));
static SUB_ITEM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[가-힣]\.\s*").expect("valid sub-item prefix regex"));

#[derive(Debug, Clone, Default)]
pub struct StatuteDocument {
    pub info: NormalizedRecord,
    pub name_hanja: String,
    pub articles: Vec<Article>,
    pub addenda: Vec<Addendum>,
}

#[derive(Debug, Clone, Default)]
pub struct Article {
    pub number: String,
    pub branch: String,
    pub title: String,
    pub content: String,
    pub enforcement_date: String,
    pub paragraphs: Vec<Paragraph>,
}

impl Article {
    /// `제N조` or `제N조의M`.
    pub fn label(&self) -> String {
        if self.branch.is_empty() || self.branch == "0" {
            format!("제{}조", self.number)
        } else {
            format!("제{}조의{}", self.number, self.branch)
        }
    }

    fn matches_filter(&self, filter: &str) -> bool {
        self.number == filter || self.label() == format!("제{filter}조")
    }

    /// Chapter/section dividers are encoded as untitled articles.
    fn is_structure_heading(&self) -> bool {
        self.title.is_empty()
            && !self.content.trim().is_empty()
            && STRUCTURE_HEADING.is_match(self.content.trim())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub number: String,
    pub content: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default)]
pub struct Item {
    pub number: String,
    pub content: String,
    pub sub_items: Vec<SubItem>,
}

#[derive(Debug, Clone, Default)]
pub struct SubItem {
    pub number: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct Addendum {
    pub promulgation_date: String,
    pub promulgation_number: String,
    pub content: String,
}

fn text(element: &Element, name: &str) -> String {
    element.child_text(name).trim().to_owned()
}

pub fn parse_statute(root: &Element) -> StatuteDocument {
    let articles = root
        .find_all("조문단위")
        .into_iter()
        .map(|unit| Article {
            number: text(unit, "조문번호"),
            branch: text(unit, "조문가지번호"),
            title: text(unit, "조문제목"),
            content: text(unit, "조문내용"),
            enforcement_date: text(unit, "조문시행일자"),
            paragraphs: unit
                .find_all("항")
                .into_iter()
                .map(|para| Paragraph {
                    number: text(para, "항번호"),
                    content: text(para, "항내용"),
                    items: para
                        .find_all("호")
                        .into_iter()
                        .map(|item| Item {
                            number: text(item, "호번호"),
                            content: text(item, "호내용"),
                            sub_items: item
                                .find_all("목")
                                .into_iter()
                                .map(|sub| SubItem {
                                    number: text(sub, "목번호"),
                                    content: text(sub, "목내용"),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let addenda = root
        .find_all("부칙단위")
        .into_iter()
        .map(|unit| Addendum {
            promulgation_date: text(unit, "부칙공포일자"),
            promulgation_number: text(unit, "부칙공포번호"),
            content: text(unit, "부칙내용"),
        })
        .collect();

    StatuteDocument {
        info: extract::extract_one(root, DocumentKind::Statute),
        name_hanja: root.find_text("법령명_한자").unwrap_or("").trim().to_owned(),
        articles,
        addenda,
    }
}

/// `1` → `①`; circled input is kept; anything else is parenthesised.
pub fn paragraph_marker(number: &str) -> String {
    if number.chars().next().is_some_and(|c| CIRCLED.contains(&c)) {
        return number.to_owned();
    }
    match number.parse::<usize>() {
        Ok(n @ 1..=20) => CIRCLED[n - 1].to_string(),
        _ => format!("({number})"),
    }
}

pub fn source_url(law_name: &str, article_filter: Option<&str>) -> String {
    let mut url = match url::Url::parse("https://www.law.go.kr/") {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push("법령").push(law_name);
        if let Some(article) = article_filter {
            segments.push(&format!("제{article}조"));
        }
    }
    url.into()
}

pub fn front_matter(
    doc: &StatuteDocument,
    article_filter: Option<&str>,
    retrieved_at: &str,
) -> StatuteFrontMatter {
    let info = &doc.info;
    let tags = ["법령", info.get("law_type"), info.get("ministry")]
        .into_iter()
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect();

    StatuteFrontMatter {
        title: info.name().to_owned(),
        law_id: info.id().to_owned(),
        doc_type: "법령".to_owned(),
        law_type: info.get("law_type").to_owned(),
        ministry: info.get("ministry").to_owned(),
        promulgation_date: info.get("promulgation_date").to_owned(),
        enforcement_date: info.get("enforcement_date").to_owned(),
        revision_type: info.get("revision_type").to_owned(),
        source_url: source_url(info.name(), article_filter),
        source_name: SOURCE_NAME.to_owned(),
        retrieved_at: retrieved_at.to_owned(),
        article_filter: article_filter.map(str::to_owned),
        tags,
    }
}

pub fn to_markdown(
    doc: &StatuteDocument,
    article_filter: Option<&str>,
    retrieved_at: &str,
) -> anyhow::Result<String> {
    let yaml = serde_yaml::to_string(&front_matter(doc, article_filter, retrieved_at))
        .context("serialize statute front matter")?;

    let mut out = format!("---\n{yaml}---\n\n");
    write_body(&mut out, doc, article_filter).context("render statute markdown")?;
    Ok(out)
}

fn write_body(out: &mut String, doc: &StatuteDocument, article_filter: Option<&str>) -> fmt::Result {
    let info = &doc.info;
    writeln!(out, "# {}", info.name())?;
    if !doc.name_hanja.is_empty() {
        writeln!(out, "*{}*", doc.name_hanja)?;
    }

    out.push_str("\n## 기본 정보\n\n| 항목 | 내용 |\n|------|------|\n");
    for (label, field) in [
        ("법령ID", "id"),
        ("법종구분", "law_type"),
        ("소관부처", "ministry"),
        ("공포일자", "promulgation_date"),
        ("공포번호", "promulgation_number"),
        ("시행일자", "enforcement_date"),
        ("제개정구분", "revision_type"),
    ] {
        writeln!(out, "| {label} | {} |", info.get(field))?;
    }

    out.push_str("\n## 조문\n\n");
    for article in &doc.articles {
        if article_filter.is_some_and(|filter| !article.matches_filter(filter)) {
            continue;
        }
        if article.is_structure_heading() {
            continue;
        }
        write_article(out, article)?;
    }

    if article_filter.is_none() && !doc.addenda.is_empty() {
        out.push_str("## 부칙\n\n");
        for addendum in &doc.addenda {
            writeln!(
                out,
                "### 부칙 (공포 {}, 제{}호)\n",
                addendum.promulgation_date, addendum.promulgation_number
            )?;
            if !addendum.content.is_empty() {
                writeln!(out, "{}", clean_html_text(&addendum.content, false, None))?;
            }
            out.push('\n');
        }
    }
    Ok(())
}

fn write_article(out: &mut String, article: &Article) -> fmt::Result {
    write!(out, "### {}", article.label())?;
    if !article.title.is_empty() {
        write!(out, " ({})", article.title)?;
    }
    out.push_str("\n\n");

    let content = ARTICLE_PREFIX.replace(&article.content, "");
    let content = content.trim();
    if !content.is_empty() {
        writeln!(out, "> {content}\n")?;
    }

    for para in &article.paragraphs {
        if !para.content.is_empty() {
            let content = PARAGRAPH_PREFIX.replace(&para.content, "");
            writeln!(out, "{} {}", paragraph_marker(&para.number), content.trim())?;
        }
        for item in &para.items {
            if !item.content.is_empty() {
                let content = ITEM_PREFIX.replace(&item.content, "");
                writeln!(
                    out,
                    "   {}. {}",
                    item.number.trim_end_matches('.'),
                    content.trim()
                )?;
            }
            for sub in &item.sub_items {
                if !sub.content.is_empty() {
                    let content = SUB_ITEM_PREFIX.replace(&sub.content, "");
                    writeln!(
                        out,
                        "      {}. {}",
                        sub.number.trim_end_matches('.'),
                        content.trim()
                    )?;
                }
            }
        }
        out.push('\n');
    }

    if !article.enforcement_date.is_empty() {
        writeln!(out, "*시행일: {}*\n", article.enforcement_date)?;
    }
    out.push_str("---\n\n");
    Ok(())
}

pub fn run(args: ParseArgs, layout: &Layout) -> anyhow::Result<()> {
    let input = PathBuf::from(&args.xml);
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("read statute xml: {}", input.display()))?;
    let root = xml::parse(&raw)
        .map_err(|err| anyhow::anyhow!("parse statute xml {}: {err}", input.display()))?;

    let doc = parse_statute(&root);
    let retrieved_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let markdown = to_markdown(&doc, args.article.as_deref(), &retrieved_at)?;

    if args.print {
        print!("{markdown}");
        return Ok(());
    }

    let out_path = match args.out {
        Some(out) => PathBuf::from(out),
        None => layout
            .parsed_dir()
            .join(format!("{}.md", sanitize_filename(doc.info.name()))),
    };
    store::write_atomic(&out_path, markdown.as_bytes())
        .with_context(|| format!("write markdown: {}", out_path.display()))?;
    tracing::info!(path = %out_path.display(), articles = doc.articles.len(), "statute rendered");
    println!("{}", out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<법령 법령키="0018152024">
  <기본정보>
    <법령ID>001815</법령ID>
    <공포일자>20240102</공포일자>
    <공포번호>19912</공포번호>
    <법종구분>법률</법종구분>
    <법령명_한글><![CDATA[의료법]]></법령명_한글>
    <법령명_한자>醫療法</법령명_한자>
    <시행일자>20240301</시행일자>
    <제개정구분명>일부개정</제개정구분명>
    <소관부처 소관부처코드="1352000">보건복지부</소관부처>
  </기본정보>
  <조문>
    <조문단위 조문키="0000000">
      <조문번호>1</조문번호>
      <조문여부>전문</조문여부>
      <조문내용>제1장 총칙</조문내용>
    </조문단위>
    <조문단위 조문키="0001001">
      <조문번호>1</조문번호>
      <조문제목>목적</조문제목>
      <조문내용>제1조(목적) 이 법은 국민의료에 필요한 사항을 규정한다.</조문내용>
      <조문시행일자>20240301</조문시행일자>
    </조문단위>
    <조문단위 조문키="0002001">
      <조문번호>2</조문번호>
      <조문제목>의료인</조문제목>
      <조문내용>제2조(의료인)</조문내용>
      <항>
        <항번호>①</항번호>
        <항내용>① 이 법에서 "의료인"이란 다음 각 호를 말한다.</항내용>
        <호>
          <호번호>1.</호번호>
          <호내용>1. 의사</호내용>
          <목><목번호>가.</목번호><목내용>가. 전문의</목내용></목>
        </호>
      </항>
      <항>
        <항번호>2</항번호>
        <항내용>의료인은 품위를 유지한다.</항내용>
      </항>
    </조문단위>
    <조문단위 조문키="0002002">
      <조문번호>2</조문번호>
      <조문가지번호>2</조문가지번호>
      <조문제목>정의</조문제목>
      <조문내용>제2조의2(정의) 생략</조문내용>
    </조문단위>
  </조문>
  <부칙>
    <부칙단위>
      <부칙공포일자>20240102</부칙공포일자>
      <부칙공포번호>19912</부칙공포번호>
      <부칙내용><![CDATA[이 법은 <b>공포</b> 후 시행한다.]]></부칙내용>
    </부칙단위>
  </부칙>
</법령>"#;

    fn doc() -> StatuteDocument {
        parse_statute(&xml::parse(STATUTE).unwrap())
    }

    #[test]
    fn parses_basic_info_and_structure() {
        let doc = doc();
        assert_eq!(doc.info.id(), "001815");
        assert_eq!(doc.info.name(), "의료법");
        assert_eq!(doc.info.get("law_type"), "법률");
        assert_eq!(doc.info.get("ministry"), "보건복지부");
        assert_eq!(doc.name_hanja, "醫療法");
        assert_eq!(doc.articles.len(), 4);
        assert_eq!(doc.articles[2].paragraphs[0].items[0].sub_items.len(), 1);
        assert_eq!(doc.addenda.len(), 1);
    }

    #[test]
    fn renders_markdown_body() {
        let markdown = to_markdown(&doc(), None, "2024-03-31 09:00:00").unwrap();

        assert!(markdown.starts_with("---\ntitle: 의료법\n"));
        assert!(markdown.contains("# 의료법\n*醫療法*\n"));
        assert!(markdown.contains("| 공포번호 | 19912 |"));
        assert!(!markdown.contains("제1장 총칙"));
        assert!(markdown.contains("### 제1조 (목적)\n\n> 이 법은 국민의료에 필요한 사항을 규정한다.\n"));
        assert!(markdown.contains("*시행일: 20240301*"));
        assert!(markdown.contains("① 이 법에서 \"의료인\"이란 다음 각 호를 말한다.\n   1. 의사\n      가. 전문의\n"));
        assert!(markdown.contains("② 의료인은 품위를 유지한다."));
        assert!(markdown.contains("### 제2조의2 (정의)"));
        assert!(markdown.contains("## 부칙\n\n### 부칙 (공포 20240102, 제19912호)\n\n이 법은 공포 후 시행한다."));
    }

    #[test]
    fn article_filter_limits_output_and_drops_addenda() {
        let markdown = to_markdown(&doc(), Some("1"), "2024-03-31 09:00:00").unwrap();

        assert!(markdown.contains("### 제1조 (목적)"));
        assert!(!markdown.contains("### 제2조"));
        assert!(!markdown.contains("## 부칙"));
        let fm = front_matter(&doc(), Some("1"), "2024-03-31 09:00:00");
        assert_eq!(fm.article_filter.as_deref(), Some("1"));
        assert!(fm.source_url.ends_with("/%EC%A0%9C1%EC%A1%B0"));
    }

    #[test]
    fn front_matter_fields() {
        let fm = front_matter(&doc(), None, "2024-03-31 09:00:00");
        assert_eq!(fm.doc_type, "법령");
        assert_eq!(fm.tags, ["법령", "법률", "보건복지부"]);
        assert_eq!(fm.source_name, SOURCE_NAME);
        assert!(fm.source_url.starts_with("https://www.law.go.kr/"));
        assert!(fm.source_url.ends_with("%EC%9D%98%EB%A3%8C%EB%B2%95"));
    }

    #[test]
    fn paragraph_markers() {
        assert_eq!(paragraph_marker("1"), "①");
        assert_eq!(paragraph_marker("20"), "⑳");
        assert_eq!(paragraph_marker("③"), "③");
        assert_eq!(paragraph_marker("21"), "(21)");
        assert_eq!(paragraph_marker(""), "()");
    }
}
