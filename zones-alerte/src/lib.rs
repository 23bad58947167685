//! # zones-alerte
//!
//! Moteur de résolution des zones d'alerte sécheresse (restrictions d'usage de l'eau).
//!
//! ## Features
//!
//! - Index spatial statique (R-tree `rstar` chargé en bloc) pour les recherches par point
//! - Test d'inclusion exact avec les types `geo`
//! - Index par commune avec normalisation des arrondissements (Paris, Marseille, Lyon)
//! - Invariant "une zone active par type de ressource", avec résolveur de diagnostic
//! - Instantanés immuables, pré-formatés au chargement
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zones_alerte::{ResolveQuery, Snapshot, Profile};
//!
//! let snapshot = Snapshot::build(1, zones, decrees, SystemTime::now())?;
//! let query = ResolveQuery::point(2.35, 48.85).with_profile(Profile::Particulier);
//! for zone in snapshot.resolve(&query)? {
//!     println!("{:?} {:?}", zone.zone_type(), zone.id());
//! }
//! ```

pub mod commune;
pub mod error;
pub mod format;
pub mod index;
pub mod query;
pub mod resolve;
pub mod situation;
pub mod snapshot;
pub mod types;

pub use commune::normalize_code_commune;
pub use error::{UnknownValue, ZoneError};
pub use format::{DecreePlaceholder, FormattedZone, ZoneRecord, ZoneView};
pub use query::ResolveQuery;
pub use resolve::{AllowOverlaps, Locator, Strict, ZoneResolver};
pub use situation::DepartementSituation;
pub use snapshot::{DecreeIndex, Snapshot, ZoneSet};
pub use types::{
    ArreteRaw, ArreteStatus, MunicipalDecree, Profile, RestrictionRaw, Severity, UsageRaw,
    WaterType, ZoneId, ZoneRaw,
};
