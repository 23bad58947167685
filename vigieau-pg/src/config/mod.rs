//! Configuration du chargement et du rafraîchissement

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

/// Paramètres du moteur
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nombre de zones par lot de restrictions/communes
    pub batch_size: usize,

    /// Nombre maximal de lots chargés en parallèle
    pub workers: usize,

    /// Intervalle de vérification du recalcul des zones (secondes)
    pub zones_poll_secs: u64,

    /// Intervalle de vérification des arrêtés municipaux (secondes)
    pub decrees_poll_secs: u64,

    /// Délai entre deux tentatives du chargement initial (secondes)
    pub initial_retry_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 8,
            zones_poll_secs: 10,
            decrees_poll_secs: 30,
            initial_retry_secs: 10,
        }
    }
}

/// Plancher du délai de nouvelle tentative
pub const MIN_RETRY: Duration = Duration::from_millis(100);

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Charge une configuration depuis un fichier JSON (champs absents = défauts)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()
    }

    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_or("ZONES_BATCH_SIZE", defaults.batch_size),
            workers: env_or("ZONES_WORKERS", defaults.workers),
            zones_poll_secs: env_or("ZONES_POLL_SECS", defaults.zones_poll_secs),
            decrees_poll_secs: env_or("DECREES_POLL_SECS", defaults.decrees_poll_secs),
            initial_retry_secs: env_or("INITIAL_RETRY_SECS", defaults.initial_retry_secs),
        }
    }

    /// Fichier si fourni, sinon environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::from_env().validate(),
        }
    }

    fn validate(self) -> Result<Self> {
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(self.workers > 0, "workers must be positive");
        anyhow::ensure!(
            self.zones_poll_secs > 0 && self.decrees_poll_secs > 0,
            "poll intervals must be positive"
        );
        anyhow::ensure!(self.initial_retry_secs > 0, "initial_retry_secs must be positive");
        Ok(self)
    }

    pub fn zones_poll(&self) -> Duration {
        Duration::from_secs(self.zones_poll_secs)
    }

    pub fn decrees_poll(&self) -> Duration {
        Duration::from_secs(self.decrees_poll_secs)
    }

    /// Délai entre deux tentatives du chargement initial, jamais sous `MIN_RETRY`
    pub fn initial_retry(&self) -> Duration {
        Duration::from_secs(self.initial_retry_secs).max(MIN_RETRY)
    }
}
