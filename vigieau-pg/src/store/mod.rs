//! Sources de données des zones d'alerte
//!
//! Le moteur ne connaît la base qu'à travers [`ZoneStore`]: une requête pour
//! les zones et leur géométrie, deux requêtes par lot (restrictions et
//! communes), une pour les arrêtés municipaux et deux horodatages scalaires
//! pour détecter les changements.

pub mod fixture;
pub mod pool;
pub mod postgres;

use std::collections::HashMap;
use std::future::Future;
use std::time::SystemTime;

use thiserror::Error;
use zones_alerte::{MunicipalDecree, RestrictionRaw, UnknownValue, ZoneId, ZoneRaw};

pub use fixture::FixtureStore;
pub use pool::{check_postgis, create_pool, DatabaseConfig, SslMode};
pub use postgres::PgStore;

/// Erreurs d'accès à une source de données
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Invalid geometry for zone {zone_id}: {reason}")]
    Geometry { zone_id: ZoneId, reason: String },

    #[error("Invalid value in store: {0}")]
    Value(#[from] UnknownValue),

    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse fixture: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Accès en lecture aux données de restriction
///
/// `fetch_zones` ne renseigne ni la restriction ni les communes: le
/// chargeur les complète par lots avec `fetch_restrictions` et
/// `fetch_communes`. Seules les restrictions dont l'arrêté est publié sont
/// retournées.
pub trait ZoneStore: Send + Sync + 'static {
    fn fetch_zones(&self) -> impl Future<Output = Result<Vec<ZoneRaw>, StoreError>> + Send;

    fn fetch_restrictions(
        &self,
        zone_ids: &[ZoneId],
    ) -> impl Future<Output = Result<HashMap<ZoneId, RestrictionRaw>, StoreError>> + Send;

    fn fetch_communes(
        &self,
        zone_ids: &[ZoneId],
    ) -> impl Future<Output = Result<HashMap<ZoneId, Vec<String>>, StoreError>> + Send;

    /// Arrêtés municipaux publiés
    fn fetch_municipal_decrees(
        &self,
    ) -> impl Future<Output = Result<Vec<MunicipalDecree>, StoreError>> + Send;

    /// Date du dernier calcul des zones
    fn zones_computed_at(
        &self,
    ) -> impl Future<Output = Result<Option<SystemTime>, StoreError>> + Send;

    /// Date de la dernière modification d'un arrêté municipal
    fn decrees_updated_at(
        &self,
    ) -> impl Future<Output = Result<Option<SystemTime>, StoreError>> + Send;
}
