//! Client for the origin's `lawSearch.do` / `lawService.do` endpoints.

use crate::error::{Error, Result};
use crate::extract;
use crate::formats::{DocumentKind, NormalizedRecord, SearchPage};
use crate::gateway::{FetchOptions, Gateway};
use crate::xml::{self, Element};

const SEARCH_ENDPOINT: &str = "lawSearch.do";
const SERVICE_ENDPOINT: &str = "lawService.do";

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub page: u32,
    pub display: u32,
    pub sort: Option<String>,
    /// Additional raw query parameters (date ranges and the like).
    pub extra: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            display: 20,
            sort: None,
            extra: Vec::new(),
        }
    }
}

/// A by-ID document: the normalized record and the payload it came from.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub kind: DocumentKind,
    pub record: NormalizedRecord,
    pub raw: String,
}

/// Which date an amendment window filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DateType {
    /// Enforcement date (`efYd`).
    #[value(name = "ef")]
    Enforcement,
    /// Promulgation date (`ancYd`).
    #[value(name = "anc")]
    Promulgation,
}

impl DateType {
    fn range_param(self) -> &'static str {
        match self {
            Self::Enforcement => "efYd",
            Self::Promulgation => "ancYd",
        }
    }

    fn sort(self) -> &'static str {
        match self {
            Self::Enforcement => "efdes",
            Self::Promulgation => "ddes",
        }
    }
}

pub struct LawApi<'a> {
    gateway: &'a Gateway,
    base_url: String,
    oc_code: String,
}

impl<'a> LawApi<'a> {
    pub fn new(gateway: &'a Gateway, base_url: &str, oc_code: &str) -> Self {
        Self {
            gateway,
            base_url: base_url.trim_end_matches('/').to_owned(),
            oc_code: oc_code.to_owned(),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        self.gateway
    }

    /// Builds the endpoint URL, fetches it, rejects HTML pages and parses the XML.
    pub fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Element> {
        self.request_raw(endpoint, params).map(|(root, _)| root)
    }

    fn request_raw(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<(Element, String)> {
        let base = format!("{}/{endpoint}", self.base_url);
        let mut query = vec![("OC", self.oc_code.as_str())];
        query.extend_from_slice(params);
        query.push(("type", "XML"));

        let url = url::Url::parse_with_params(&base, &query)
            .map_err(|err| Error::configuration(format!("invalid origin url {base}: {err}")))?;
        let url = url.as_str();

        let body = self.gateway.fetch(url, &FetchOptions::default())?;
        if extract::is_html_page(&body) {
            return Err(Error::Blocked {
                url: url.to_owned(),
                reason: "received an HTML page instead of XML".to_owned(),
            });
        }
        let root = xml::parse(&body).map_err(|err| Error::parse(url, err))?;
        Ok((root, body))
    }

    pub fn search(&self, kind: DocumentKind, query: &SearchQuery) -> Result<SearchPage> {
        let page = query.page.to_string();
        let display = query.display.to_string();
        let mut params = vec![("target", kind.target())];
        if !query.query.is_empty() {
            params.push(("query", query.query.as_str()));
        }
        params.push(("display", display.as_str()));
        params.push(("page", page.as_str()));
        if let Some(sort) = query.sort.as_deref() {
            params.push(("sort", sort));
        }
        params.extend(query.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let root = self.request(SEARCH_ENDPOINT, &params)?;
        let records = extract::extract_many(&root, kind);
        let total = extract::total_count(&root);
        tracing::debug!(kind = kind.target(), total, rows = records.len(), "search done");
        Ok(SearchPage { total, records })
    }

    /// Fetches one document. A not-found envelope becomes [`Error::NotFound`].
    pub fn fetch_document(&self, kind: DocumentKind, id: &str) -> Result<FetchedDocument> {
        let (root, raw) = self.fetch_tree(kind, id)?;
        let mut record = extract::extract_one(&root, kind);
        if record.id().is_empty() {
            record.set("id", id);
        }
        Ok(FetchedDocument { kind, record, raw })
    }

    /// The parsed statute document, for article-level inspection.
    pub fn fetch_statute(&self, id: &str) -> Result<Element> {
        self.fetch_tree(DocumentKind::Statute, id)
            .map(|(root, _)| root)
    }

    fn fetch_tree(&self, kind: DocumentKind, id: &str) -> Result<(Element, String)> {
        let (root, raw) = self.request_raw(
            SERVICE_ENDPOINT,
            &[("target", kind.target()), (kind.id_param(), id)],
        )?;
        if let Some(message) = extract::detect_not_found(&root, kind) {
            return Err(Error::NotFound {
                kind,
                key: id.to_owned(),
                message,
            });
        }
        Ok((root, raw))
    }

    /// Statutes amended in `[from, to]` (both `YYYYMMDD`).
    pub fn recent_amendments(
        &self,
        from: &str,
        to: &str,
        date_type: DateType,
        display: u32,
    ) -> Result<SearchPage> {
        let query = SearchQuery {
            query: String::new(),
            page: 1,
            display,
            sort: Some(date_type.sort().to_owned()),
            extra: vec![(date_type.range_param().to_owned(), format!("{from}~{to}"))],
        };
        self.search(DocumentKind::Statute, &query)
    }
}
