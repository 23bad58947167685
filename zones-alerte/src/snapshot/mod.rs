//! Instantané publié du moteur de résolution
//!
//! Un [`Snapshot`] est construit en entier puis n'est plus jamais modifié.
//! Il regroupe l'ensemble des zones ([`ZoneSet`]: enregistrements
//! pré-formatés, géométries, index spatial, index par commune) et l'index
//! des arrêtés municipaux ([`DecreeIndex`]). Les deux parties sont derrière
//! des `Arc` pour que le rafraîchissement des seuls arrêtés municipaux
//! réutilise l'index spatial existant.

pub mod digest;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use geo::{BoundingRect, Geometry, MultiPolygon, Rect};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::commune::normalize_code_commune;
use crate::format::ZoneRecord;
use crate::index::{ZoneEntry, ZoneTree};
use crate::types::{ArreteStatus, MunicipalDecree, ZoneId, ZoneRaw};
use crate::ZoneError;

/// Zone prête à être indexée
struct PreparedZone {
    record: ZoneRecord,
    shape: MultiPolygon<f64>,
    bbox: Rect<f64>,
    communes: Vec<String>,
}

/// Raison de l'exclusion d'une zone à la construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skipped {
    Unpublished,
    Geometry,
}

/// Ensemble des zones actives et de leurs index
#[derive(Debug)]
pub struct ZoneSet {
    records: Vec<ZoneRecord>,
    shapes: Vec<MultiPolygon<f64>>,
    tree: ZoneTree,
    by_id: HashMap<ZoneId, usize>,
    by_commune: HashMap<String, Vec<usize>>,
    by_departement: BTreeMap<String, Vec<usize>>,
}

impl ZoneSet {
    /// Construit l'ensemble des zones à partir du chargement brut
    ///
    /// Les zones sans arrêté publié et celles dont la géométrie n'est pas
    /// surfacique ou est vide sont écartées. L'ordre de sortie suit les
    /// identifiants de zone, indépendamment de l'ordre de chargement.
    pub fn build(zones: Vec<ZoneRaw>) -> Result<Self, ZoneError> {
        let total = zones.len();
        let prepared: Vec<Result<PreparedZone, (ZoneId, Skipped)>> =
            zones.into_par_iter().map(prepare_zone).collect();

        let mut kept = Vec::with_capacity(total);
        let mut unpublished = 0usize;
        let mut bad_geometry = 0usize;
        for result in prepared {
            match result {
                Ok(zone) => kept.push(zone),
                Err((id, Skipped::Unpublished)) => {
                    debug!(zone_id = id, "Zone skipped: no published arrete");
                    unpublished += 1;
                }
                Err((id, Skipped::Geometry)) => {
                    warn!(zone_id = id, "Zone skipped: unusable geometry");
                    bad_geometry += 1;
                }
            }
        }
        kept.sort_by_key(|z| z.record.id);

        if unpublished > 0 || bad_geometry > 0 {
            info!(
                total,
                kept = kept.len(),
                unpublished,
                bad_geometry,
                "Zones excluded from snapshot"
            );
        }

        let mut entries = Vec::with_capacity(kept.len());
        let mut records = Vec::with_capacity(kept.len());
        let mut shapes = Vec::with_capacity(kept.len());
        let mut by_id = HashMap::with_capacity(kept.len());
        let mut by_commune: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_departement: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for zone in kept {
            let idx = records.len();
            entries.push(ZoneEntry::new(idx, zone.bbox)?);
            if by_id.insert(zone.record.id, idx).is_some() {
                return Err(ZoneError::IndexBuild(format!(
                    "duplicate zone id {}",
                    zone.record.id
                )));
            }
            for commune in &zone.communes {
                let entry = by_commune
                    .entry(normalize_code_commune(commune).into_owned())
                    .or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
            if let Some(dep) = &zone.record.departement {
                by_departement.entry(dep.clone()).or_default().push(idx);
            }
            records.push(zone.record);
            shapes.push(zone.shape);
        }

        let tree = ZoneTree::bulk_load(entries);
        info!(zones = records.len(), communes = by_commune.len(), "Zone tree built");

        Ok(Self {
            records,
            shapes,
            tree,
            by_id,
            by_commune,
            by_departement,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ZoneRecord] {
        &self.records
    }

    pub fn record(&self, idx: usize) -> &ZoneRecord {
        &self.records[idx]
    }

    pub fn shape(&self, idx: usize) -> &MultiPolygon<f64> {
        &self.shapes[idx]
    }

    pub fn tree(&self) -> &ZoneTree {
        &self.tree
    }

    /// Zones et géométries, dans l'ordre des identifiants
    pub fn iter(&self) -> impl Iterator<Item = (&ZoneRecord, &MultiPolygon<f64>)> {
        self.records.iter().zip(self.shapes.iter())
    }

    pub fn get(&self, id: ZoneId) -> Option<&ZoneRecord> {
        self.by_id.get(&id).map(|&idx| &self.records[idx])
    }

    /// Indices des zones membres d'une commune (code déjà normalisé)
    pub fn commune_zones(&self, normalized_code: &str) -> &[usize] {
        self.by_commune
            .get(normalized_code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Codes commune indexés, triés
    pub fn communes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.by_commune.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub fn departement_zones(&self, code: &str) -> impl Iterator<Item = &ZoneRecord> {
        self.by_departement
            .get(code)
            .into_iter()
            .flatten()
            .map(|&idx| &self.records[idx])
    }

    pub fn departements(&self) -> impl Iterator<Item = &str> {
        self.by_departement.keys().map(String::as_str)
    }
}

fn prepare_zone(zone: ZoneRaw) -> Result<PreparedZone, (ZoneId, Skipped)> {
    let published = zone
        .restriction
        .as_ref()
        .is_some_and(|r| r.arrete.statut == ArreteStatus::Publie);
    if !published {
        return Err((zone.id, Skipped::Unpublished));
    }

    let shape = to_multi_polygon(&zone.geometry).ok_or((zone.id, Skipped::Geometry))?;
    let bbox = shape.bounding_rect().ok_or((zone.id, Skipped::Geometry))?;

    Ok(PreparedZone {
        record: ZoneRecord::from_raw(&zone),
        shape,
        bbox,
        communes: zone.communes,
    })
}

/// Convertit une géométrie surfacique en MultiPolygon
fn to_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let shape = match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for g in gc.iter() {
                polygons.extend(to_multi_polygon(g)?.0);
            }
            MultiPolygon::new(polygons)
        }
        _ => return None,
    };
    let non_empty = shape.0.iter().any(|p| p.exterior().0.len() >= 4);
    non_empty.then_some(shape)
}

/// Index des arrêtés municipaux publiés, par commune normalisée
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecreeIndex {
    by_commune: HashMap<String, MunicipalDecree>,
}

impl DecreeIndex {
    /// Construit l'index; pour une commune, l'arrêté d'identifiant le plus bas est retenu
    pub fn build(decrees: Vec<MunicipalDecree>) -> Self {
        let mut by_commune: HashMap<String, MunicipalDecree> = HashMap::new();
        for decree in decrees {
            if decree.statut != ArreteStatus::Publie {
                continue;
            }
            let code = normalize_code_commune(&decree.commune).into_owned();
            match by_commune.get(&code) {
                Some(existing) if existing.id <= decree.id => {}
                _ => {
                    by_commune.insert(code, decree);
                }
            }
        }
        Self { by_commune }
    }

    /// Arrêté municipal de la commune (code brut ou arrondissement)
    pub fn get(&self, code: &str) -> Option<&MunicipalDecree> {
        self.by_commune.get(normalize_code_commune(code).as_ref())
    }

    pub fn len(&self) -> usize {
        self.by_commune.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_commune.is_empty()
    }

    pub(crate) fn sorted(&self) -> Vec<(&str, &MunicipalDecree)> {
        let mut entries: Vec<_> = self
            .by_commune
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }
}

/// Unité de publication: zones, index et arrêtés municipaux
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    zones: Arc<ZoneSet>,
    decrees: Arc<DecreeIndex>,
    zones_loaded_at: SystemTime,
    decrees_loaded_at: SystemTime,
}

impl Snapshot {
    /// Assemble un instantané complet
    pub fn build(
        version: u64,
        zones: Vec<ZoneRaw>,
        decrees: Vec<MunicipalDecree>,
        loaded_at: SystemTime,
    ) -> Result<Self, ZoneError> {
        let zones = ZoneSet::build(zones)?;
        let decrees = DecreeIndex::build(decrees);
        info!(decrees = decrees.len(), "Municipal decrees indexed");
        Ok(Self {
            version,
            zones: Arc::new(zones),
            decrees: Arc::new(decrees),
            zones_loaded_at: loaded_at,
            decrees_loaded_at: loaded_at,
        })
    }

    /// Nouvel instantané partageant les zones, avec de nouveaux arrêtés municipaux
    pub fn with_decrees(
        &self,
        version: u64,
        decrees: Vec<MunicipalDecree>,
        loaded_at: SystemTime,
    ) -> Self {
        Self {
            version,
            zones: Arc::clone(&self.zones),
            decrees: Arc::new(DecreeIndex::build(decrees)),
            zones_loaded_at: self.zones_loaded_at,
            decrees_loaded_at: loaded_at,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Pointeur partagé vers les zones (identité conservée entre versions)
    pub fn zone_set(&self) -> &Arc<ZoneSet> {
        &self.zones
    }

    pub fn decrees(&self) -> &DecreeIndex {
        &self.decrees
    }

    pub fn zones_loaded_at(&self) -> SystemTime {
        self.zones_loaded_at
    }

    pub fn decrees_loaded_at(&self) -> SystemTime {
        self.decrees_loaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArreteRaw, RestrictionRaw, WaterType};
    use geo::{point, polygon, LineString, Polygon};

    fn restriction(statut: ArreteStatus) -> RestrictionRaw {
        RestrictionRaw {
            id: 1,
            arrete: ArreteRaw {
                id: 1,
                date_debut: None,
                date_fin: None,
                statut,
                departement: Some("38".into()),
                chemin_fichier: None,
                chemin_fichier_arrete_cadre: None,
            },
            usages: Vec::new(),
        }
    }

    fn zone(id: ZoneId, geometry: Geometry<f64>, statut: ArreteStatus) -> ZoneRaw {
        ZoneRaw {
            id,
            id_sandre: None,
            code: None,
            nom: format!("zone {id}"),
            zone_type: WaterType::Sup,
            ressource_influencee: false,
            niveau_gravite: None,
            departement: None,
            bassin_versant: None,
            geometry,
            restriction: Some(restriction(statut)),
            communes: vec!["75101".into(), "75056".into()],
        }
    }

    fn square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.), (x: 0., y: 0.)
        ])
    }

    #[test]
    fn test_build_filters_unpublished_and_bad_geometry() {
        let zones = vec![
            zone(3, square(), ArreteStatus::Publie),
            zone(1, square(), ArreteStatus::Publie),
            zone(2, square(), ArreteStatus::AVenir),
            zone(4, Geometry::Point(point!(x: 0.5, y: 0.5)), ArreteStatus::Publie),
            zone(
                5,
                Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![])),
                ArreteStatus::Publie,
            ),
        ];
        let set = ZoneSet::build(zones).unwrap();
        let ids: Vec<ZoneId> = set.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(set.get(2).is_none());
        assert_eq!(set.tree().len(), 2);
    }

    #[test]
    fn test_commune_index_is_normalized() {
        let set = ZoneSet::build(vec![zone(1, square(), ArreteStatus::Publie)]).unwrap();
        assert_eq!(set.commune_zones("75056"), &[0]);
        assert!(set.commune_zones("75101").is_empty());
        assert_eq!(set.communes(), vec!["75056"]);
        assert_eq!(set.departement_zones("38").count(), 1);
    }

    #[test]
    fn test_duplicate_zone_id_is_an_error() {
        let zones = vec![
            zone(1, square(), ArreteStatus::Publie),
            zone(1, square(), ArreteStatus::Publie),
        ];
        assert!(matches!(ZoneSet::build(zones), Err(ZoneError::IndexBuild(_))));
    }

    #[test]
    fn test_decree_index_keeps_lowest_published() {
        let decree = |id, commune: &str, statut| MunicipalDecree {
            id,
            commune: commune.into(),
            statut,
            chemin_fichier: Some(format!("am-{id}.pdf")),
        };
        let index = DecreeIndex::build(vec![
            decree(9, "75056", ArreteStatus::Publie),
            decree(4, "75104", ArreteStatus::Publie),
            decree(1, "75056", ArreteStatus::Abroge),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("75112").map(|d| d.id), Some(4));
        assert_eq!(index.get("75056").map(|d| d.id), Some(4));
        assert!(index.get("38185").is_none());
    }

    #[test]
    fn test_with_decrees_shares_zones() {
        let now = SystemTime::now();
        let snapshot =
            Snapshot::build(1, vec![zone(1, square(), ArreteStatus::Publie)], vec![], now)
                .unwrap();
        let next = snapshot.with_decrees(2, vec![], now);
        assert!(Arc::ptr_eq(snapshot.zone_set(), next.zone_set()));
        assert_eq!(next.version(), 2);
        assert_eq!(next.zones_loaded_at(), snapshot.zones_loaded_at());
    }
}
