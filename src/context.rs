use anyhow::Context as _;

use crate::api::LawApi;
use crate::cache::LawCache;
use crate::config::{Layout, Settings};
use crate::gateway::Gateway;
use crate::registry::LawRegistry;

/// Everything a command needs, built once per process.
#[derive(Debug)]
pub struct AppContext {
    pub layout: Layout,
    pub settings: Settings,
    gateway: Gateway,
}

impl AppContext {
    pub fn load(home: &str) -> anyhow::Result<Self> {
        let layout = Layout::new(home);
        let settings = Settings::load(&layout).context("load settings")?;
        let gateway = Gateway::new(settings.gateway.clone()).context("init gateway")?;
        tracing::debug!(
            home = %layout.home().display(),
            relay = settings.gateway.relay_configured(),
            "context loaded"
        );
        Ok(Self {
            layout,
            settings,
            gateway,
        })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Fails with a configuration error when no auth code is set.
    pub fn api(&self) -> anyhow::Result<LawApi<'_>> {
        let oc_code = self.settings.require_oc_code()?;
        Ok(LawApi::new(
            &self.gateway,
            &self.settings.api_base_url,
            oc_code,
        ))
    }

    pub fn cache(&self) -> LawCache {
        LawCache::new(self.layout.cache_dir())
    }

    pub fn registry(&self) -> anyhow::Result<LawRegistry> {
        LawRegistry::load(&self.layout.law_index_path())
    }
}
