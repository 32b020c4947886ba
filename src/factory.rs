//! Wires configuration into live adapters, the engine and the journal.

use std::path::PathBuf;

use restock_akbal::{AkbalConfig, AkbalStorefront};
use restock_browser::{LaunchProfile, SessionStore};
use restock_engine::{DecisionEngine, OpenRouterClient};
use restock_getir::{GetirConfig, GetirStorefront};
use restock_journal::Journal;
use restock_migros::{MigrosConfig, MigrosStorefront};
use restock_protocols::{ProviderId, Storefront};

use crate::config::{Config, ConfigError};

/// Build the adapter for `provider`.
///
/// Each provider gets its own debugging port and profile directory, so
/// runs against different storefronts drive separate Chrome instances.
pub(crate) fn build_storefront(provider: ProviderId, config: &Config) -> Box<dyn Storefront> {
    let launch = launch_profile(provider, config);
    let sessions = SessionStore::new(config.data_dir().join("sessions"));

    match provider {
        ProviderId::Getir => {
            let mut adapter_config = GetirConfig::new(launch, sessions);
            if let Some(url) = &config.storefronts.getir.base_url {
                adapter_config.base_url = url.clone();
            }
            adapter_config.max_candidates = config.order.max_candidates;
            Box::new(GetirStorefront::new(adapter_config))
        }
        ProviderId::Migros => {
            let mut adapter_config = MigrosConfig::new(launch, sessions);
            if let Some(url) = &config.storefronts.migros.base_url {
                adapter_config.base_url = url.clone();
            }
            adapter_config.max_candidates = config.order.max_candidates;
            Box::new(MigrosStorefront::new(adapter_config))
        }
        ProviderId::Akbal => {
            let mut adapter_config = AkbalConfig::new(launch);
            if let Some(url) = &config.storefronts.akbal.base_url {
                adapter_config.base_url = url.clone();
            }
            adapter_config.max_candidates = config.order.max_candidates;
            Box::new(AkbalStorefront::new(adapter_config))
        }
    }
}

fn launch_profile(provider: ProviderId, config: &Config) -> LaunchProfile {
    LaunchProfile {
        debug_port: config.browser.debug_port + port_offset(provider),
        profile_dir: profile_dir(provider, config),
        headless: config.browser.headless,
        ..LaunchProfile::default()
    }
}

fn port_offset(provider: ProviderId) -> u16 {
    match provider {
        ProviderId::Getir => 0,
        ProviderId::Migros => 1,
        ProviderId::Akbal => 2,
    }
}

fn profile_dir(provider: ProviderId, config: &Config) -> PathBuf {
    config.data_dir().join("profiles").join(provider.as_str())
}

/// Build the decision engine from the configured model settings.
///
/// The API key comes from the config file or, failing that, the
/// OPENROUTER_API_KEY environment variable.
pub(crate) fn build_engine(config: &Config) -> Result<DecisionEngine<OpenRouterClient>, ConfigError> {
    let api_key = config
        .model
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
        .ok_or_else(|| ConfigError::EnvVarNotSet("OPENROUTER_API_KEY".to_string()))?;

    let mut client = match &config.model.api_url {
        Some(url) => OpenRouterClient::with_url(api_key, url.clone()),
        None => OpenRouterClient::new(api_key),
    };
    if let Some(model) = &config.model.model {
        client = client.with_model(model);
    }

    Ok(DecisionEngine::new(client))
}

/// Open the journal database under the data directory.
pub(crate) async fn open_journal(config: &Config) -> Result<Journal, Box<dyn std::error::Error>> {
    let dir = config.data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(Journal::open(dir.join("journal.db")).await?)
}
