//! # vigieau-pg
//!
//! Chargement des zones d'alerte sécheresse depuis PostGIS et service des
//! recherches à partir d'un instantané publié atomiquement.
//!
//! ## Features
//!
//! - Chargement par lots concurrents (restrictions, usages, communes)
//! - Rafraîchissement sur changement de la date de calcul des zones
//! - Rafraîchissement séparé des arrêtés municipaux, sans reconstruire l'index
//! - Source JSON hors ligne pour les tests
//! - Export GeoJSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Service: chargement initial puis vérifications périodiques
//! vigieau-pg watch
//!
//! # Recherche ponctuelle
//! vigieau-pg resolve --lon 2.35 --lat 48.85 --profil particulier
//! vigieau-pg resolve --commune 75101 --fixture ./zones.json
//!
//! # Export GeoJSON
//! vigieau-pg export --output ./zones.geojson
//! ```

pub mod config;
pub mod export;
pub mod loader;
pub mod refresh;
pub mod service;
pub mod store;

pub use config::EngineConfig;
pub use loader::{GeometryLoader, LoadFailure};
pub use refresh::{RefreshController, RefreshOutcome, RefreshState, Scheduler, SnapshotHandle};
pub use service::{ServiceError, ZonesService};
pub use store::{create_pool, DatabaseConfig, FixtureStore, PgStore, StoreError, ZoneStore};
