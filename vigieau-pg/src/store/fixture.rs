//! Source de données JSON, pour les tests et l'usage hors ligne
//!
//! Format du fichier:
//!
//! ```json
//! {
//!   "zonesComputedAt": 1720000000,
//!   "decreesUpdatedAt": 1720000000,
//!   "zones": [{ "id": 1, "nom": "...", "type": "SUP", "geometry": { "type": "Polygon", ... },
//!               "restriction": { "id": 1, "arrete": { ... }, "usages": [ ... ] },
//!               "communes": ["38185"] }],
//!   "municipalDecrees": [{ "id": 1, "commune": "38185", "statut": "publie", "cheminFichier": "..." }]
//! }
//! ```
//!
//! Les horodatages sont en secondes depuis l'époque Unix.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use zones_alerte::{
    ArreteStatus, MunicipalDecree, RestrictionRaw, Severity, WaterType, ZoneId, ZoneRaw,
};

use super::{StoreError, ZoneStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureZone {
    id: ZoneId,
    #[serde(default)]
    id_sandre: Option<i32>,
    #[serde(default)]
    code: Option<String>,
    nom: String,
    #[serde(rename = "type")]
    zone_type: WaterType,
    #[serde(default)]
    ressource_influencee: bool,
    #[serde(default)]
    niveau_gravite: Option<Severity>,
    #[serde(default)]
    departement: Option<String>,
    #[serde(default)]
    bassin_versant: Option<String>,
    geometry: geojson::Geometry,
    #[serde(default)]
    restriction: Option<RestrictionRaw>,
    #[serde(default)]
    communes: Vec<String>,
}

impl FixtureZone {
    fn into_raw(self) -> Result<ZoneRaw, StoreError> {
        let geometry =
            geo::Geometry::<f64>::try_from(self.geometry).map_err(|e| StoreError::Geometry {
                zone_id: self.id,
                reason: e.to_string(),
            })?;
        Ok(ZoneRaw {
            id: self.id,
            id_sandre: self.id_sandre,
            code: self.code,
            nom: self.nom,
            zone_type: self.zone_type,
            ressource_influencee: self.ressource_influencee,
            niveau_gravite: self.niveau_gravite,
            departement: self.departement,
            bassin_versant: self.bassin_versant,
            geometry,
            restriction: self.restriction,
            communes: self.communes,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureDataset {
    #[serde(default)]
    zones_computed_at: Option<u64>,
    #[serde(default)]
    decrees_updated_at: Option<u64>,
    #[serde(default)]
    zones: Vec<FixtureZone>,
    #[serde(default)]
    municipal_decrees: Vec<MunicipalDecree>,
}

#[derive(Debug)]
struct FixtureState {
    zones: Vec<ZoneRaw>,
    decrees: Vec<MunicipalDecree>,
    zones_computed_at: Option<SystemTime>,
    decrees_updated_at: Option<SystemTime>,
}

/// Horodatage strictement postérieur au précédent
fn bump(previous: Option<SystemTime>) -> SystemTime {
    let now = SystemTime::now();
    match previous {
        Some(prev) if prev >= now => prev + Duration::from_millis(1),
        _ => now,
    }
}

/// Source en mémoire, modifiable pour simuler un recalcul des zones
#[derive(Debug)]
pub struct FixtureStore {
    state: RwLock<FixtureState>,
}

impl FixtureStore {
    pub fn new(zones: Vec<ZoneRaw>, decrees: Vec<MunicipalDecree>) -> Self {
        let now = SystemTime::now();
        Self {
            state: RwLock::new(FixtureState {
                zones,
                decrees,
                zones_computed_at: Some(now),
                decrees_updated_at: Some(now),
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let dataset: FixtureDataset = serde_json::from_str(json)?;
        let zones = dataset
            .zones
            .into_iter()
            .map(FixtureZone::into_raw)
            .collect::<Result<Vec<_>, _>>()?;
        let at = |secs: Option<u64>| secs.map(|s| UNIX_EPOCH + Duration::from_secs(s));

        Ok(Self {
            state: RwLock::new(FixtureState {
                zones,
                decrees: dataset.municipal_decrees,
                zones_computed_at: at(dataset.zones_computed_at),
                decrees_updated_at: at(dataset.decrees_updated_at),
            }),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Remplace les zones et avance la date de calcul
    pub fn replace_zones(&self, zones: Vec<ZoneRaw>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.zones = zones;
        state.zones_computed_at = Some(bump(state.zones_computed_at));
        Ok(())
    }

    /// Remplace les arrêtés municipaux et avance leur date de modification
    pub fn replace_decrees(&self, decrees: Vec<MunicipalDecree>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.decrees = decrees;
        state.decrees_updated_at = Some(bump(state.decrees_updated_at));
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FixtureState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("fixture lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FixtureState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("fixture lock poisoned".into()))
    }
}

impl ZoneStore for FixtureStore {
    async fn fetch_zones(&self) -> Result<Vec<ZoneRaw>, StoreError> {
        let state = self.read()?;
        Ok(state
            .zones
            .iter()
            .map(|z| ZoneRaw {
                restriction: None,
                communes: Vec::new(),
                ..z.clone()
            })
            .collect())
    }

    async fn fetch_restrictions(
        &self,
        zone_ids: &[ZoneId],
    ) -> Result<HashMap<ZoneId, RestrictionRaw>, StoreError> {
        let state = self.read()?;
        Ok(state
            .zones
            .iter()
            .filter(|z| zone_ids.contains(&z.id))
            .filter_map(|z| {
                z.restriction
                    .as_ref()
                    .filter(|r| r.arrete.statut == ArreteStatus::Publie)
                    .map(|r| (z.id, r.clone()))
            })
            .collect())
    }

    async fn fetch_communes(
        &self,
        zone_ids: &[ZoneId],
    ) -> Result<HashMap<ZoneId, Vec<String>>, StoreError> {
        let state = self.read()?;
        Ok(state
            .zones
            .iter()
            .filter(|z| zone_ids.contains(&z.id) && !z.communes.is_empty())
            .map(|z| (z.id, z.communes.clone()))
            .collect())
    }

    async fn fetch_municipal_decrees(&self) -> Result<Vec<MunicipalDecree>, StoreError> {
        let state = self.read()?;
        Ok(state
            .decrees
            .iter()
            .filter(|d| d.statut == ArreteStatus::Publie)
            .cloned()
            .collect())
    }

    async fn zones_computed_at(&self) -> Result<Option<SystemTime>, StoreError> {
        Ok(self.read()?.zones_computed_at)
    }

    async fn decrees_updated_at(&self) -> Result<Option<SystemTime>, StoreError> {
        Ok(self.read()?.decrees_updated_at)
    }
}
