//! Résolution des zones applicables à un point ou à une commune
//!
//! La recherche par point interroge l'index spatial (préfiltre sur les
//! bbox) puis teste l'inclusion exacte dans chaque polygone candidat. Les
//! deux chemins vérifient ensuite l'invariant "au plus une zone active par
//! type de ressource", selon la politique du résolveur:
//!
//! - [`Strict`] (défaut): plusieurs zones actives de même type sont une
//!   erreur [`ZoneError::AmbiguousZoneConflict`];
//! - [`AllowOverlaps`]: réservé aux diagnostics, retourne toutes les zones.

use std::marker::PhantomData;

use geo::{Intersects, Point};

use crate::commune::normalize_code_commune;
use crate::format::ZoneRecord;
use crate::snapshot::{Snapshot, ZoneSet};
use crate::types::{WaterType, ZoneId};
use crate::ZoneError;

/// Emplacement recherché
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    Point { lon: f64, lat: f64 },
    Municipality(String),
}

impl Locator {
    /// Point validé: lon dans ]-180, 180[, lat dans ]-85, 85[
    pub fn point(lon: f64, lat: f64) -> Result<Self, ZoneError> {
        let valid = lon > -180.0 && lon < 180.0 && lat > -85.0 && lat < 85.0;
        if valid {
            Ok(Locator::Point { lon, lat })
        } else {
            Err(ZoneError::InvalidCoordinate { lon, lat })
        }
    }

    pub fn municipality(code: impl Into<String>) -> Self {
        Locator::Municipality(code.into())
    }

    fn describe(&self) -> String {
        match self {
            Locator::Point { lon, lat } => format!("({lon}, {lat})"),
            Locator::Municipality(code) => format!("commune {code}"),
        }
    }
}

/// Politique appliquée quand plusieurs zones actives de même type se superposent
pub trait OverlapPolicy {
    fn check(zones: &[&ZoneRecord], locator: &Locator) -> Result<(), ZoneError>;
}

/// Invariant appliqué: conflit = erreur de données
#[derive(Debug, Clone, Copy, Default)]
pub struct Strict;

/// Aucune vérification, pour les appelants de diagnostic
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowOverlaps;

impl OverlapPolicy for Strict {
    fn check(zones: &[&ZoneRecord], locator: &Locator) -> Result<(), ZoneError> {
        match find_conflict(zones) {
            Some((zone_type, zone_ids)) => {
                let error = ZoneError::AmbiguousZoneConflict {
                    zone_type,
                    zone_ids,
                    location: locator.describe(),
                };
                tracing::error!(error = %error, "Overlapping active zones, data must be fixed");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

impl OverlapPolicy for AllowOverlaps {
    fn check(_zones: &[&ZoneRecord], _locator: &Locator) -> Result<(), ZoneError> {
        Ok(())
    }
}

/// Premier type de ressource ayant plus d'une zone active (non influencée)
pub fn find_conflict(zones: &[&ZoneRecord]) -> Option<(WaterType, Vec<ZoneId>)> {
    WaterType::ALL.into_iter().find_map(|zone_type| {
        let ids: Vec<ZoneId> = zones
            .iter()
            .filter(|z| z.zone_type == zone_type && !z.ressource_influencee)
            .map(|z| z.id)
            .collect();
        (ids.len() > 1).then_some((zone_type, ids))
    })
}

/// Résolveur lié à un instantané
#[derive(Debug)]
pub struct ZoneResolver<'s, P = Strict> {
    zones: &'s ZoneSet,
    _policy: PhantomData<P>,
}

impl<'s> ZoneResolver<'s, Strict> {
    pub fn new(snapshot: &'s Snapshot) -> Self {
        Self::with_zones(snapshot.zones())
    }
}

impl<'s> ZoneResolver<'s, AllowOverlaps> {
    /// Résolveur de diagnostic, sans contrôle des superpositions
    pub fn diagnostic(snapshot: &'s Snapshot) -> Self {
        Self::with_zones(snapshot.zones())
    }
}

impl<'s, P: OverlapPolicy> ZoneResolver<'s, P> {
    pub fn with_zones(zones: &'s ZoneSet) -> Self {
        Self {
            zones,
            _policy: PhantomData,
        }
    }

    /// Zones dont la bbox contient le point (sur-ensemble du résultat exact)
    pub fn candidates(&self, lon: f64, lat: f64) -> Vec<&'s ZoneRecord> {
        let indices = self.zones.tree().search_point(lon, lat);
        indices.into_iter().map(|i| self.zones.record(i)).collect()
    }

    /// Zones dont le polygone contient le point (bords compris)
    pub fn by_point(&self, lon: f64, lat: f64) -> Result<Vec<&'s ZoneRecord>, ZoneError> {
        let locator = Locator::point(lon, lat)?;
        let point = Point::new(lon, lat);

        let indices = self.zones.tree().search_point(lon, lat);
        let zones: Vec<&ZoneRecord> = indices
            .into_iter()
            .filter(|&i| self.zones.shape(i).intersects(&point))
            .map(|i| self.zones.record(i))
            .collect();

        P::check(&zones, &locator)?;
        Ok(zones)
    }

    /// Zones rattachées à la commune (arrondissements normalisés)
    pub fn by_commune(&self, code: &str) -> Result<Vec<&'s ZoneRecord>, ZoneError> {
        let normalized = normalize_code_commune(code);
        let zones: Vec<&ZoneRecord> = self
            .zones
            .commune_zones(&normalized)
            .iter()
            .map(|&i| self.zones.record(i))
            .collect();

        P::check(&zones, &Locator::Municipality(normalized.into_owned()))?;
        Ok(zones)
    }

    pub fn resolve(&self, locator: &Locator) -> Result<Vec<&'s ZoneRecord>, ZoneError> {
        match locator {
            Locator::Point { lon, lat } => self.by_point(*lon, *lat),
            Locator::Municipality(code) => self.by_commune(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArreteRaw, ArreteStatus, RestrictionRaw, ZoneRaw};
    use geo::{polygon, Geometry, MultiPolygon};
    use std::time::SystemTime;

    fn zone(id: ZoneId, zone_type: WaterType, influenced: bool, geometry: Geometry<f64>) -> ZoneRaw {
        ZoneRaw {
            id,
            id_sandre: None,
            code: None,
            nom: format!("zone {id}"),
            zone_type,
            ressource_influencee: influenced,
            niveau_gravite: None,
            departement: None,
            bassin_versant: None,
            geometry,
            restriction: Some(RestrictionRaw {
                id,
                arrete: ArreteRaw {
                    id: 1,
                    date_debut: None,
                    date_fin: None,
                    statut: ArreteStatus::Publie,
                    departement: None,
                    chemin_fichier: None,
                    chemin_fichier_arrete_cadre: None,
                },
                usages: vec![],
            }),
            communes: vec!["01001".into()],
        }
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)])
    }

    fn snapshot(zones: Vec<ZoneRaw>) -> Snapshot {
        Snapshot::build(1, zones, vec![], SystemTime::now()).unwrap()
    }

    fn ids(zones: &[&ZoneRecord]) -> Vec<ZoneId> {
        zones.iter().map(|z| z.id).collect()
    }

    #[test]
    fn test_invalid_coordinates() {
        let snap = snapshot(vec![]);
        let resolver = ZoneResolver::new(&snap);
        for (lon, lat) in [(180.0, 0.0), (-180.0, 0.0), (0.0, 85.0), (0.0, -85.0), (f64::NAN, 0.0)] {
            assert!(matches!(
                resolver.by_point(lon, lat),
                Err(ZoneError::InvalidCoordinate { .. })
            ));
        }
        assert!(resolver.by_point(179.9, 84.9).unwrap().is_empty());
    }

    #[test]
    fn test_bbox_candidate_is_not_enough() {
        // Triangle: le coin (0.9, 0.9) est dans la bbox mais hors du polygone
        let triangle = Geometry::Polygon(polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 0., y: 1.)]);
        let snap = snapshot(vec![zone(1, WaterType::Sup, false, triangle)]);
        let resolver = ZoneResolver::new(&snap);
        assert_eq!(ids(&resolver.candidates(0.9, 0.9)), vec![1]);
        assert!(resolver.by_point(0.9, 0.9).unwrap().is_empty());
        assert_eq!(ids(&resolver.by_point(0.1, 0.1).unwrap()), vec![1]);
    }

    #[test]
    fn test_boundary_point_is_inside() {
        let snap = snapshot(vec![zone(1, WaterType::Sup, false, rect(0., 0., 1., 1.))]);
        let resolver = ZoneResolver::new(&snap);
        assert_eq!(ids(&resolver.by_point(1.0, 0.5).unwrap()), vec![1]);
    }

    #[test]
    fn test_multipolygon_and_hole() {
        let with_hole = polygon!(
            exterior: [(x: 0., y: 0.), (x: 4., y: 0.), (x: 4., y: 4.), (x: 0., y: 4.)],
            interiors: [[(x: 1., y: 1.), (x: 3., y: 1.), (x: 3., y: 3.), (x: 1., y: 3.)]],
        );
        let island = polygon![(x: 10., y: 10.), (x: 11., y: 10.), (x: 11., y: 11.), (x: 10., y: 11.)];
        let geometry = Geometry::MultiPolygon(MultiPolygon::new(vec![with_hole, island]));
        let snap = snapshot(vec![zone(1, WaterType::Sou, false, geometry)]);
        let resolver = ZoneResolver::new(&snap);

        assert_eq!(ids(&resolver.by_point(0.5, 0.5).unwrap()), vec![1]);
        assert!(resolver.by_point(2.0, 2.0).unwrap().is_empty());
        assert_eq!(ids(&resolver.by_point(10.5, 10.5).unwrap()), vec![1]);
        // Entre les deux parties: dans la bbox globale, hors géométrie
        assert!(resolver.by_point(7.0, 7.0).unwrap().is_empty());
    }

    #[test]
    fn test_conflict_and_influenced_resource() {
        let overlapping = vec![
            zone(1, WaterType::Sup, false, rect(0., 0., 2., 2.)),
            zone(2, WaterType::Sup, false, rect(1., 1., 3., 3.)),
            zone(3, WaterType::Aep, false, rect(0., 0., 3., 3.)),
        ];
        let snap = snapshot(overlapping.clone());
        let resolver = ZoneResolver::new(&snap);
        match resolver.by_point(1.5, 1.5) {
            Err(ZoneError::AmbiguousZoneConflict {
                zone_type,
                zone_ids,
                ..
            }) => {
                assert_eq!(zone_type, WaterType::Sup);
                assert_eq!(zone_ids, vec![1, 2]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(matches!(
            resolver.by_commune("01001"),
            Err(ZoneError::AmbiguousZoneConflict { .. })
        ));
        // Hors recouvrement, pas de conflit
        assert_eq!(ids(&resolver.by_point(0.5, 0.5).unwrap()), vec![1, 3]);

        let diagnostic = ZoneResolver::diagnostic(&snap);
        assert_eq!(ids(&diagnostic.by_point(1.5, 1.5).unwrap()), vec![1, 2, 3]);

        let mut influenced = overlapping;
        influenced[1].ressource_influencee = true;
        let snap = snapshot(influenced);
        let resolver = ZoneResolver::new(&snap);
        assert_eq!(ids(&resolver.by_point(1.5, 1.5).unwrap()), vec![1, 2, 3]);
        assert_eq!(ids(&resolver.by_commune("01001").unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn test_by_commune_normalizes() {
        let mut z = zone(1, WaterType::Aep, false, rect(2.2, 48.8, 2.5, 48.9));
        z.communes = vec!["75056".into()];
        let snap = snapshot(vec![z]);
        let resolver = ZoneResolver::new(&snap);
        assert_eq!(ids(&resolver.by_commune("75101").unwrap()), vec![1]);
        assert_eq!(ids(&resolver.by_commune("75056").unwrap()), vec![1]);
        assert!(resolver.by_commune("38185").unwrap().is_empty());
    }

    #[test]
    fn test_find_conflict_ignores_other_types() {
        let snap = snapshot(vec![
            zone(1, WaterType::Sup, false, rect(0., 0., 1., 1.)),
            zone(2, WaterType::Sou, false, rect(0., 0., 1., 1.)),
            zone(3, WaterType::Aep, false, rect(0., 0., 1., 1.)),
        ]);
        let records: Vec<&ZoneRecord> = snap.zones().records().iter().collect();
        assert!(find_conflict(&records).is_none());
    }
}
