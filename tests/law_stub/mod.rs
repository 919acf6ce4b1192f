use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One request as the stub saw it.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub url: String,
    pub api_key: Option<String>,
    pub user_agent: Option<String>,
}

type Handler = Box<dyn Fn(&str) -> (u16, String) + Send + 'static>;

/// Local stand-in for the origin API or the relay.
pub struct LawStub {
    pub base_url: String,
    log: Arc<Mutex<Vec<LoggedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl LawStub {
    /// Answers every request with `handler(url)`.
    pub fn spawn(handler: impl Fn(&str) -> (u16, String) + Send + 'static) -> Self {
        Self::start(Box::new(handler))
    }

    /// Answers requests with `responses` in order; the last one repeats.
    pub fn scripted(responses: Vec<(u16, &str)>) -> Self {
        let queue = Mutex::new(
            responses
                .into_iter()
                .map(|(status, body)| (status, body.to_owned()))
                .collect::<VecDeque<_>>(),
        );
        Self::start(Box::new(move |_| {
            let mut queue = queue.lock().expect("lock script");
            if queue.len() > 1 {
                queue.pop_front().expect("non-empty script")
            } else {
                queue.front().cloned().unwrap_or((500, "script exhausted".to_owned()))
            }
        }))
    }

    fn start(handler: Handler) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start law stub server");
        let base_url = format!("http://{}", server.server_addr());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_log = Arc::clone(&log);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.to_string().eq_ignore_ascii_case(name))
                        .map(|h| h.value.to_string())
                };
                let url = request.url().to_owned();
                thread_log.lock().expect("lock log").push(LoggedRequest {
                    url: url.clone(),
                    api_key: header("x-api-key"),
                    user_agent: header("User-Agent"),
                });

                let (status, body) = handler(&url);
                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        Self {
            base_url,
            log,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.log.lock().expect("lock log").clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().expect("lock log").len()
    }
}

impl Drop for LawStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Decoded query parameter of a logged request path.
#[allow(dead_code)]
pub fn query_param(path: &str, key: &str) -> Option<String> {
    let url = url::Url::parse(&format!("http://stub{path}")).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[allow(dead_code)]
pub const STATUTE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<법령 법령키="0018152024">
  <기본정보>
    <법령ID>001815</법령ID>
    <법령명_한글><![CDATA[의료법]]></법령명_한글>
    <공포일자>20240102</공포일자>
    <시행일자>20240301</시행일자>
    <제개정구분명>일부개정</제개정구분명>
  </기본정보>
  <조문>
    <조문단위>
      <조문번호>1</조문번호>
      <조문제목>목적</조문제목>
      <조문내용>제1조(목적) 이 법은 국민의료에 필요한 사항을 규정한다.</조문내용>
    </조문단위>
  </조문>
</법령>"#;

#[allow(dead_code)]
pub const NOT_FOUND_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Law>일치하는 법령이 없습니다. 법령명을 확인하여 주십시오.</Law>"#;

#[allow(dead_code)]
pub const EMPTY_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LawSearch>
  <target>law</target>
  <키워드>없는법</키워드>
  <section>lawNm</section>
  <totalCnt>0</totalCnt>
  <page>1</page>
</LawSearch>"#;

#[allow(dead_code)]
pub const AMENDED_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LawSearch>
  <target>law</target>
  <totalCnt>1</totalCnt>
  <page>1</page>
  <law id="1">
    <법령일련번호>262000</법령일련번호>
    <법령명한글><![CDATA[의료법]]></법령명한글>
    <법령ID>001815</법령ID>
    <공포일자>20240102</공포일자>
    <제개정구분명>일부개정</제개정구분명>
    <시행일자>20240301</시행일자>
  </law>
</LawSearch>"#;

/// Name search where the decree ranks above the statute itself.
#[allow(dead_code)]
pub const NAME_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LawSearch>
  <target>law</target>
  <totalCnt>4</totalCnt>
  <page>1</page>
  <law id="1">
    <법령명한글><![CDATA[의료법 시행령]]></법령명한글>
    <법령ID>003837</법령ID>
    <법령구분명>대통령령</법령구분명>
  </law>
  <law id="2">
    <법령명한글><![CDATA[의료법]]></법령명한글>
    <법령ID>001815</법령ID>
    <법령구분명>법률</법령구분명>
    <소관부처명>보건복지부</소관부처명>
  </law>
  <law id="3">
    <법령명한글><![CDATA[의료법 시행규칙]]></법령명한글>
    <법령ID>006440</법령ID>
    <법령구분명>보건복지부령</법령구분명>
  </law>
  <law id="4">
    <법령명한글><![CDATA[응급의료에 관한 법률]]></법령명한글>
    <법령ID>001788</법령ID>
  </law>
</LawSearch>"#;

#[allow(dead_code)]
pub const DECREE_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LawSearch>
  <target>law</target>
  <totalCnt>1</totalCnt>
  <page>1</page>
  <law id="1">
    <법령명한글><![CDATA[의료법 시행령]]></법령명한글>
    <법령ID>003837</법령ID>
  </law>
</LawSearch>"#;

#[allow(dead_code)]
pub const ADMIN_RULE_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AdmRulSearch>
  <target>admrul</target>
  <totalCnt>2</totalCnt>
  <page>1</page>
  <admrul id="1">
    <행정규칙일련번호>2100000201</행정규칙일련번호>
    <행정규칙명><![CDATA[의료기관 인증기준 고시]]></행정규칙명>
    <행정규칙종류>고시</행정규칙종류>
    <소관부처명>보건복지부</소관부처명>
  </admrul>
  <admrul id="2">
    <행정규칙일련번호>2100000202</행정규칙일련번호>
    <행정규칙명><![CDATA[진료기록부 작성 지침]]></행정규칙명>
    <행정규칙종류>예규</행정규칙종류>
  </admrul>
</AdmRulSearch>"#;
