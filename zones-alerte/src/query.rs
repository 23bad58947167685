//! Opérations exposées aux appelants (couche HTTP, abonnements...)

use crate::format::{format_zone, format_zones, ZoneView};
use crate::resolve::{Locator, ZoneResolver};
use crate::types::{Profile, WaterType, ZoneId};
use crate::{Snapshot, ZoneError};

/// Paramètres d'une recherche de zones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveQuery {
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    /// Code commune: localisation si aucun point n'est fourni, sinon
    /// seulement utilisé pour l'arrêté municipal
    pub commune: Option<String>,
    pub profile: Option<Profile>,
    pub zone_type: Option<WaterType>,
}

impl ResolveQuery {
    pub fn point(lon: f64, lat: f64) -> Self {
        Self {
            lon: Some(lon),
            lat: Some(lat),
            ..Default::default()
        }
    }

    pub fn commune(code: impl Into<String>) -> Self {
        Self {
            commune: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_zone_type(mut self, zone_type: WaterType) -> Self {
        self.zone_type = Some(zone_type);
        self
    }

    /// Le point est prioritaire sur la commune
    pub fn locator(&self) -> Result<Locator, ZoneError> {
        match (self.lon, self.lat, self.commune.as_deref()) {
            (Some(lon), Some(lat), _) => Locator::point(lon, lat),
            (_, _, Some(code)) if !code.trim().is_empty() => Ok(Locator::municipality(code)),
            _ => Err(ZoneError::MissingLocator),
        }
    }
}

impl Snapshot {
    /// Zones applicables à un point ou à une commune, formatées
    pub fn resolve(&self, query: &ResolveQuery) -> Result<Vec<ZoneView>, ZoneError> {
        let locator = query.locator()?;
        let zones = ZoneResolver::new(self).resolve(&locator)?;
        let decree = query
            .commune
            .as_deref()
            .and_then(|code| self.decrees().get(code));

        let views = format_zones(&zones, query.profile, query.zone_type, decree);
        if views.is_empty() {
            return Err(match locator {
                Locator::Point { .. } => ZoneError::ZoneNotFound,
                Locator::Municipality(code) => ZoneError::NoZoneForMunicipality(code),
            });
        }
        Ok(views)
    }

    /// Zone par identifiant
    pub fn zone_by_id(&self, id: ZoneId) -> Result<ZoneView, ZoneError> {
        self.zones()
            .get(id)
            .map(|zone| ZoneView::Zone(Box::new(format_zone(zone, None, None))))
            .ok_or(ZoneError::ZoneNotFound)
    }

    /// Zones d'un département
    pub fn zones_by_departement(&self, code: &str) -> Result<Vec<ZoneView>, ZoneError> {
        let views: Vec<ZoneView> = self
            .zones()
            .departement_zones(code)
            .map(|zone| ZoneView::Zone(Box::new(format_zone(zone, None, None))))
            .collect();
        if views.is_empty() {
            return Err(ZoneError::NoZoneForDepartement(code.to_string()));
        }
        Ok(views)
    }
}
