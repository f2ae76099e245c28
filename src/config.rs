use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::store::credentials::{default_identities, Identity};
use crate::store::items::{default_items, VaultItem};

pub const DEFAULT_RATE_LIMIT_PER_MIN: usize = 120;

fn default_rate_limit() -> usize {
    DEFAULT_RATE_LIMIT_PER_MIN
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HMAC key for session tokens. `VAULT_JWT_SECRET` overrides it.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_min: usize,
    #[serde(default = "default_identities")]
    pub identities: Vec<Identity>,
    #[serde(default = "default_items")]
    pub items: Vec<VaultItem>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            rate_limit_per_min: DEFAULT_RATE_LIMIT_PER_MIN,
            identities: default_identities(),
            items: default_items(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: Config = serde_json::from_str(&raw).context("parsing config JSON")?;
        Ok(cfg)
    }

    /// File (or built-in defaults), then environment, then validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let cfg = cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `VAULT_JWT_SECRET` and `RATE_LIMIT_PER_MIN` from `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("VAULT_JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }
        if let Some(limit) = lookup("RATE_LIMIT_PER_MIN") {
            self.rate_limit_per_min = limit
                .trim()
                .parse()
                .with_context(|| format!("RATE_LIMIT_PER_MIN is not a number: {limit:?}"))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {}
            _ => bail!("jwt_secret must be configured (or set VAULT_JWT_SECRET)"),
        }
        if self.rate_limit_per_min == 0 {
            bail!("rate_limit_per_min must be greater than zero");
        }

        let mut ids = HashSet::new();
        let mut usernames = HashSet::new();
        for identity in &self.identities {
            if !ids.insert(identity.id) {
                bail!("duplicate identity id {}", identity.id);
            }
            if !usernames.insert(identity.username.as_str()) {
                bail!("duplicate username {:?}", identity.username);
            }
        }
        for item in &self.items {
            if !ids.contains(&item.owner_id) {
                bail!("item {} references unknown owner {}", item.id, item.owner_id);
            }
        }
        Ok(())
    }

    /// Key bytes for the token service. Only meaningful after `validate`.
    pub fn secret_bytes(&self) -> Vec<u8> {
        self.jwt_secret.clone().unwrap_or_default().into_bytes()
    }
}
