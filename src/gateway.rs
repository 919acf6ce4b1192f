//! Fetches a URL either directly or through the forwarding relay.
//!
//! The relay is addressed as `GET {relay}/fetch/{base64url(target)}` so it
//! never looks like an open pass-through proxy. Only the relay path retries:
//! transient failures get up to [`MAX_ATTEMPTS`] attempts with a linear
//! backoff of `attempt * 2` seconds. Credentials problems fail at once.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::config::{ENV_GATEWAY_API_KEY, ENV_GATEWAY_URL};
use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = "Beopsuny/1.0";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP_SECS: u64 = 2;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    pub relay_url: Option<String>,
    pub relay_api_key: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("relay_url", &self.relay_url)
            .field("relay_api_key", &self.relay_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl GatewayConfig {
    pub fn relay_configured(&self) -> bool {
        self.relay_url.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Route {
    /// Relay when one is configured, otherwise direct.
    #[default]
    Auto,
    Relay,
    Direct,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Extra headers; they override the defaults.
    pub headers: Vec<(String, String)>,
    pub route: Route,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
            route: Route::Auto,
        }
    }
}

/// Blocking pause between attempts. Tests swap in a recorder.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct Gateway {
    config: GatewayConfig,
    client: reqwest::blocking::Client,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| Error::configuration(format!("build http client: {err}")))?;

        Ok(Self {
            config,
            client,
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// Returns the response body as text; the payload is not inspected.
    pub fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String> {
        match (options.route, self.config.relay_url.as_deref()) {
            (Route::Direct, _) | (Route::Auto, None) => self.fetch_direct(url, options),
            (Route::Auto | Route::Relay, Some(relay_url)) => {
                self.fetch_via_relay(relay_url, url, options)
            }
            (Route::Relay, None) => Err(Error::configuration(format!(
                "relay requested but none is configured.\n\
                 Set it with: export {ENV_GATEWAY_URL}='https://your-gateway.example.com'\n\
                 or add `gateway.url` to config/settings.yaml"
            ))),
        }
    }

    fn fetch_direct(&self, url: &str, options: &FetchOptions) -> Result<String> {
        tracing::debug!(url, "fetching directly");
        let (status, body) = self.send(url, url, options, None)?;
        match status {
            status if status.is_success() => Ok(body),
            StatusCode::FORBIDDEN => Err(Error::Blocked {
                url: url.to_owned(),
                reason: "HTTP 403 Forbidden".to_owned(),
            }),
            status => Err(Error::Network {
                url: url.to_owned(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
            }),
        }
    }

    fn fetch_via_relay(&self, relay_url: &str, url: &str, options: &FetchOptions) -> Result<String> {
        let relay_target = format!(
            "{}/fetch/{}",
            relay_url.trim_end_matches('/'),
            encode_target_url(url)
        );
        tracing::debug!(url, relay = relay_url, "fetching via relay");

        let mut attempt = 1;
        loop {
            let err = match self.relay_attempt(&relay_target, url, options) {
                Ok(body) => return Ok(body),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let wait = Duration::from_secs(u64::from(attempt) * BACKOFF_STEP_SECS);
            tracing::warn!(
                attempt,
                attempts = MAX_ATTEMPTS,
                wait_secs = wait.as_secs(),
                error = %err,
                "relay request failed; retrying"
            );
            self.sleeper.sleep(wait);
            attempt += 1;
        }
    }

    fn relay_attempt(&self, relay_target: &str, url: &str, options: &FetchOptions) -> Result<String> {
        let api_key = self.config.relay_api_key.as_deref();
        let (status, body) = self.send(relay_target, url, options, api_key)?;
        if status.is_success() {
            return Ok(body);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let message = match api_key {
                    Some(_) => format!("the relay rejected the API key; check {ENV_GATEWAY_API_KEY}"),
                    None => format!(
                        "the relay requires an API key; set {ENV_GATEWAY_API_KEY}"
                    ),
                };
                Err(Error::Authentication {
                    status: status.as_u16(),
                    message,
                })
            }
            status => Err(Error::Network {
                url: url.to_owned(),
                status: Some(status.as_u16()),
                message: format!("relay answered HTTP {status}"),
            }),
        }
    }

    /// One GET. Transport failures become status-less `Network` errors.
    fn send(
        &self,
        request_url: &str,
        target_url: &str,
        options: &FetchOptions,
        api_key: Option<&str>,
    ) -> Result<(StatusCode, String)> {
        let headers = build_headers(options, api_key)?;
        let network = |err: reqwest::Error| Error::Network {
            url: target_url.to_owned(),
            status: None,
            message: if err.is_timeout() {
                format!("timed out after {}s", options.timeout.as_secs())
            } else {
                format!("{err:#}")
            },
        };

        let response = self
            .client
            .get(request_url)
            .headers(headers)
            .timeout(options.timeout)
            .send()
            .map_err(network)?;
        let status = response.status();
        let body = response.text().map_err(network)?;
        Ok((status, body))
    }
}

fn build_headers(options: &FetchOptions, api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    if let Some(key) = api_key {
        headers.insert(API_KEY_HEADER, header_value(API_KEY_HEADER, key)?);
    }
    for (name, value) in &options.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::configuration(format!("invalid header name {name:?}: {err}")))?;
        headers.insert(header, header_value(name, value)?);
    }
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| Error::configuration(format!("invalid value for header {name}: {err}")))
}

/// URL-safe base64 of the target URL, padding stripped.
pub fn encode_target_url(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}
