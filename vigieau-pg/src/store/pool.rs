//! Connexions PostgreSQL/PostGIS du chargeur de zones
//!
//! Les paramètres viennent des variables libpq (`PGHOST`, `PGPORT`,
//! `PGDATABASE`, `PGUSER`, `PGPASSWORD`, `PGSSLMODE`), surchargées par la
//! ligne de commande. Le pool est dimensionné sur le chargeur: chaque lot en
//! vol tient deux connexions (restrictions et communes), plus une pour les
//! lectures de dates.

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::config::EngineConfig;

const APPLICATION_NAME: &str = "vigieau-zones";

/// Chiffrement de la connexion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    /// TLS avec vérification du certificat serveur (racines webpki)
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    /// Noms libpq; `allow` et `prefer` (repli en clair) ne sont pas pris en charge
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "require" | "verify-ca" | "verify-full" => Ok(SslMode::Require),
            other => Err(format!(
                "unsupported sslmode '{other}', expected disable, require, verify-ca or verify-full"
            )),
        }
    }
}

/// Paramètres de connexion, construits par surcharges successives
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "vigieau".into(),
            user: "postgres".into(),
            password: None,
            ssl_mode: SslMode::Disable,
            max_connections: connections_for(EngineConfig::default().workers),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn connections_for(workers: usize) -> usize {
    workers * 2 + 1
}

impl DatabaseConfig {
    /// Valeurs par défaut surchargées par l'environnement libpq
    ///
    /// Une valeur invalide (`PGPORT`, `PGSSLMODE`) est une erreur plutôt
    /// qu'un retour silencieux au défaut.
    pub fn from_env() -> Result<Self> {
        let port = env_var("PGPORT")
            .map(|p| p.parse::<u16>().context(format!("Invalid PGPORT: {p}")))
            .transpose()?;
        let ssl_mode = env_var("PGSSLMODE")
            .map(|s| s.parse::<SslMode>().map_err(anyhow::Error::msg))
            .transpose()?;

        Ok(Self::default()
            .host(env_var("PGHOST"))
            .port(port)
            .dbname(env_var("PGDATABASE"))
            .user(env_var("PGUSER"))
            .password(env_var("PGPASSWORD"))
            .ssl_mode(ssl_mode))
    }

    pub fn host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn dbname(mut self, dbname: Option<String>) -> Self {
        if let Some(dbname) = dbname {
            self.dbname = dbname;
        }
        self
    }

    pub fn user(mut self, user: Option<String>) -> Self {
        if let Some(user) = user {
            self.user = user;
        }
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        if password.is_some() {
            self.password = password;
        }
        self
    }

    pub fn ssl_mode(mut self, ssl_mode: Option<SslMode>) -> Self {
        if let Some(ssl_mode) = ssl_mode {
            self.ssl_mode = ssl_mode;
        }
        self
    }

    /// Ajuste le pool au nombre de lots chargés en parallèle
    pub fn sized_for(mut self, engine: &EngineConfig) -> Self {
        self.max_connections = connections_for(engine.workers);
        self
    }

    fn deadpool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.application_name = Some(APPLICATION_NAME.into());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_connections,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(10)),
                recycle: None,
            },
            ..Default::default()
        });
        cfg
    }
}

/// Connecteur rustls sur les racines webpki
fn tls_connector() -> MakeRustlsConnect {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    MakeRustlsConnect::new(config)
}

/// Crée le pool (aucune connexion n'est ouverte avant le premier usage)
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.deadpool_config();
    let pool = match config.ssl_mode {
        SslMode::Disable => cfg.create_pool(Some(Runtime::Tokio1), NoTls),
        SslMode::Require => cfg.create_pool(Some(Runtime::Tokio1), tls_connector()),
    };
    pool.context(format!(
        "Failed to create pool for {}@{}:{}/{}",
        config.user, config.host, config.port, config.dbname
    ))
}

/// Vérifie la connexion et la présence de PostGIS; rend la version PostGIS
pub async fn check_postgis(pool: &Pool) -> Result<String> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    let row = client
        .query_one("SELECT postgis_lib_version()", &[])
        .await
        .context("PostGIS is not available on this database")?;
    Ok(row.try_get(0)?)
}
