use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gateway::GatewayConfig;

pub const ENV_HOME: &str = "BEOPSUNY_HOME";
pub const ENV_OC_CODE: &str = "BEOPSUNY_OC_CODE";
pub const ENV_API_BASE_URL: &str = "BEOPSUNY_API_BASE_URL";
pub const ENV_GATEWAY_URL: &str = "BEOPSUNY_GATEWAY_URL";
pub const ENV_GATEWAY_API_KEY: &str = "BEOPSUNY_GATEWAY_API_KEY";

pub const DEFAULT_API_BASE_URL: &str = "http://www.law.go.kr/DRF";
const OC_CODE_SIGNUP_URL: &str = "https://open.law.go.kr";

/// Every on-disk location, derived from one home directory.
#[derive(Debug, Clone)]
pub struct Layout {
    home: PathBuf,
}

impl Layout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home.join("config").join("settings.yaml")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.home.join("assets")
    }

    pub fn law_index_path(&self) -> PathBuf {
        self.assets_dir().join("law_index.yaml")
    }

    pub fn compliance_calendar_path(&self) -> PathBuf {
        self.assets_dir().join("compliance_calendar.yaml")
    }

    pub fn clause_references_path(&self) -> PathBuf {
        self.assets_dir().join("clause_references.yaml")
    }

    pub fn checklists_dir(&self) -> PathBuf {
        self.assets_dir().join("checklists")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.home.join("data")
    }

    /// Root of the document cache (`data/raw`).
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("raw")
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.data_dir().join("parsed")
    }

    pub fn reverse_index_path(&self) -> PathBuf {
        self.data_dir().join("law_to_files.json")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir().join("maintenance_state.json")
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    oc_code: Option<String>,
    #[serde(default)]
    gateway: Option<GatewaySection>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewaySection {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

/// Process-wide settings, loaded once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct Settings {
    pub oc_code: Option<String>,
    pub api_base_url: String,
    pub gateway: GatewayConfig,
    settings_path: PathBuf,
}

impl Settings {
    /// Environment first, then `config/settings.yaml`. A missing file is fine.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.settings_path();
        let file = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => SettingsFile::default(),
            Ok(text) => serde_yaml::from_str(&text)
                .map_err(|err| Error::parse(path.display().to_string(), err))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => SettingsFile::default(),
            Err(err) => {
                return Err(Error::configuration(format!(
                    "read settings {}: {err}",
                    path.display()
                )));
            }
        };

        Ok(Self::resolve(file, path, |name| std::env::var(name).ok()))
    }

    fn resolve(
        file: SettingsFile,
        settings_path: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let gateway_file = file.gateway.unwrap_or_default();

        let gateway = match env(ENV_GATEWAY_URL) {
            Some(url) => GatewayConfig {
                relay_url: Some(trim_url(&url)),
                relay_api_key: env(ENV_GATEWAY_API_KEY),
            },
            None => GatewayConfig {
                relay_url: non_empty(gateway_file.url).map(|url| trim_url(&url)),
                relay_api_key: non_empty(gateway_file.api_key),
            },
        };

        Self {
            oc_code: env(ENV_OC_CODE).or_else(|| non_empty(file.oc_code)),
            api_base_url: trim_url(
                &env(ENV_API_BASE_URL).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned()),
            ),
            gateway,
            settings_path,
        }
    }

    /// The origin auth code, needed only once an origin call is made.
    pub fn require_oc_code(&self) -> Result<&str> {
        self.oc_code.as_deref().ok_or_else(|| {
            Error::configuration(format!(
                "origin auth code (OC) is not configured.\n\
                 Set it with: export {ENV_OC_CODE}='your_oc_code'\n\
                 or add `oc_code: your_oc_code` to {}\n\
                 Request a code at {OC_CODE_SIGNUP_URL}",
                self.settings_path.display()
            ))
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}
