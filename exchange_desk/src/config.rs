use std::sync::Arc;

use anyhow::Context;
use common::{
    BlockedPairs, Database, Exchange, ExchangeSettings, ExchangeStore, LinkPolicy, MemoryStore,
};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

pub struct AppConfig {
    pub database_url: String,
    pub store: StoreKind,
    pub bind_addr: String,
    pub link_policy: LinkPolicy,
    pub blocked_pairs: String,
    pub fiat_currency: String,
    pub seed_rates: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| cli::DEFAULT_DATABASE_URL.to_string());

        let store = match lookup("STORE").as_deref().map(str::trim) {
            None | Some("sqlite") => StoreKind::Sqlite,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("STORE must be `sqlite` or `memory`, got `{}`", other),
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let link_policy = match lookup("LINK_POLICY") {
            Some(policy) => policy.parse().context("LINK_POLICY is invalid")?,
            None => LinkPolicy::ClaimCode,
        };

        let blocked_pairs = lookup("BLOCKED_PAIRS").unwrap_or_default();

        let fiat_currency = lookup("FIAT_CURRENCY")
            .map(|c| c.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "XOF".to_string());

        let seed_rates = match lookup("SEED_RATES") {
            Some(flag) => flag
                .trim()
                .parse::<bool>()
                .with_context(|| format!("SEED_RATES must be true or false, got `{}`", flag))?,
            None => true,
        };

        Ok(Self {
            database_url,
            store,
            bind_addr,
            link_policy,
            blocked_pairs,
            fiat_currency,
            seed_rates,
        })
    }

    pub fn settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            link_policy: self.link_policy,
            blocked_pairs: BlockedPairs::parse(&self.blocked_pairs),
            fiat_currency: self.fiat_currency.clone(),
        }
    }

    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        let store: Arc<dyn ExchangeStore> = match self.store {
            StoreKind::Sqlite => Arc::new(
                Database::new(&self.database_url)
                    .await
                    .context("Failed to initialize database")?,
            ),
            StoreKind::Memory => {
                log::warn!("Using the in-memory store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let exchange = Exchange::new(store, self.settings());
        if self.seed_rates {
            exchange
                .seed_default_rates()
                .await
                .context("Failed to seed default rates")?;
        }

        Ok(AppState::new(exchange))
    }
}
