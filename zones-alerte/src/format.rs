//! Mise en forme des zones et de leurs restrictions
//!
//! Les jointures zone → restriction → arrêté → usages sont faites une seule
//! fois à la construction de l'instantané ([`ZoneRecord::from_raw`]). Au
//! moment de la requête il ne reste qu'à filtrer par profil et à rattacher
//! l'arrêté municipal éventuel.

use serde::Serialize;

use crate::types::{
    MunicipalDecree, Profile, RestrictionRaw, Severity, UsageRaw, WaterType, ZoneId, ZoneRaw,
};

/// Métadonnées de l'arrêté de restriction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArreteView {
    pub id: Option<i32>,
    pub date_debut_validite: Option<String>,
    pub date_fin_validite: Option<String>,
    pub chemin_fichier: Option<String>,
    pub chemin_fichier_arrete_cadre: Option<String>,
}

/// Usage restreint, avec la description du niveau de gravité courant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageView {
    pub id: i32,
    pub nom: String,
    pub thematique: String,
    pub description: String,
    pub concerne_particulier: bool,
    pub concerne_entreprise: bool,
    pub concerne_collectivite: bool,
    pub concerne_exploitation: bool,
}

impl UsageView {
    fn from_raw(usage: &UsageRaw, severity: Option<Severity>) -> Self {
        Self {
            id: usage.id,
            nom: usage.nom.clone(),
            thematique: usage.thematique.clone(),
            description: usage.description_for(severity).unwrap_or_default().to_string(),
            concerne_particulier: usage.concerne_particulier,
            concerne_entreprise: usage.concerne_entreprise,
            concerne_collectivite: usage.concerne_collectivite,
            concerne_exploitation: usage.concerne_exploitation,
        }
    }

    /// Usage pertinent pour le profil demandé
    pub fn concerns(&self, profile: Profile) -> bool {
        match profile {
            Profile::Particulier => self.concerne_particulier,
            Profile::Entreprise => self.concerne_entreprise,
            Profile::Collectivite => self.concerne_collectivite,
            Profile::Exploitation => self.concerne_exploitation,
        }
    }
}

/// Zone enrichie, pré-calculée au chargement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub id: ZoneId,
    pub id_sandre: Option<i32>,
    pub code: Option<String>,
    pub nom: String,
    #[serde(rename = "type")]
    pub zone_type: WaterType,
    pub ressource_influencee: bool,
    pub niveau_gravite: Option<Severity>,
    pub departement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bassin_versant: Option<String>,
    pub arrete: ArreteView,
    pub usages: Vec<UsageView>,
}

impl ZoneRecord {
    /// Joint la zone à sa restriction et pré-calcule les usages
    ///
    /// Seuls les usages concernant le type de ressource de la zone sont
    /// conservés. Le département de l'arrêté prime sur celui de la zone.
    pub fn from_raw(zone: &ZoneRaw) -> Self {
        let restriction: Option<&RestrictionRaw> = zone.restriction.as_ref();
        let arrete = restriction.map(|r| &r.arrete);

        let usages = restriction
            .map(|r| {
                r.usages
                    .iter()
                    .filter(|u| u.concerns_water_type(zone.zone_type))
                    .map(|u| UsageView::from_raw(u, zone.niveau_gravite))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: zone.id,
            id_sandre: zone.id_sandre,
            code: zone.code.clone(),
            nom: zone.nom.clone(),
            zone_type: zone.zone_type,
            ressource_influencee: zone.ressource_influencee,
            niveau_gravite: zone.niveau_gravite,
            departement: arrete
                .and_then(|a| a.departement.clone())
                .or_else(|| zone.departement.clone()),
            bassin_versant: zone.bassin_versant.clone(),
            arrete: ArreteView {
                id: arrete.map(|a| a.id),
                date_debut_validite: arrete.and_then(|a| a.date_debut.clone()),
                date_fin_validite: arrete.and_then(|a| a.date_fin.clone()),
                chemin_fichier: arrete.and_then(|a| a.chemin_fichier.clone()),
                chemin_fichier_arrete_cadre: arrete
                    .and_then(|a| a.chemin_fichier_arrete_cadre.clone()),
            },
            usages,
        }
    }
}

/// Zone formatée pour un demandeur, avec les alias SANDRE
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedZone {
    #[serde(flatten)]
    pub zone: ZoneRecord,
    pub arrete_municipal_chemin_fichier: Option<String>,
    pub gid: Option<i32>,
    #[serde(rename = "CdZAS")]
    pub cd_zas: Option<String>,
    #[serde(rename = "LbZAS")]
    pub lb_zas: String,
    #[serde(rename = "TypeZAS")]
    pub type_zas: WaterType,
}

/// Entrée portant uniquement la référence d'un arrêté municipal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecreePlaceholder {
    /// Toujours `null`: aucune zone derrière cette entrée
    pub id: Option<ZoneId>,
    #[serde(rename = "type")]
    pub zone_type: WaterType,
    pub arrete_municipal_chemin_fichier: String,
}

/// Élément de réponse d'une recherche de zones
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ZoneView {
    Zone(Box<FormattedZone>),
    DecreeOnly(DecreePlaceholder),
}

impl ZoneView {
    pub fn id(&self) -> Option<ZoneId> {
        match self {
            ZoneView::Zone(z) => Some(z.zone.id),
            ZoneView::DecreeOnly(_) => None,
        }
    }

    pub fn zone_type(&self) -> WaterType {
        match self {
            ZoneView::Zone(z) => z.zone.zone_type,
            ZoneView::DecreeOnly(p) => p.zone_type,
        }
    }

    pub fn as_zone(&self) -> Option<&FormattedZone> {
        match self {
            ZoneView::Zone(z) => Some(z),
            ZoneView::DecreeOnly(_) => None,
        }
    }

    pub fn municipal_decree_file(&self) -> Option<&str> {
        match self {
            ZoneView::Zone(z) => z.arrete_municipal_chemin_fichier.as_deref(),
            ZoneView::DecreeOnly(p) => Some(&p.arrete_municipal_chemin_fichier),
        }
    }
}

/// Formate une zone pour un profil, avec l'arrêté municipal éventuel
pub fn format_zone(
    zone: &ZoneRecord,
    profile: Option<Profile>,
    decree: Option<&MunicipalDecree>,
) -> FormattedZone {
    let mut zone = zone.clone();
    if let Some(profile) = profile {
        zone.usages.retain(|u| u.concerns(profile));
    }

    FormattedZone {
        arrete_municipal_chemin_fichier: decree.and_then(|d| d.chemin_fichier.clone()),
        gid: zone.id_sandre,
        cd_zas: zone.code.clone(),
        lb_zas: zone.nom.clone(),
        type_zas: zone.zone_type,
        zone,
    }
}

/// Formate le résultat d'une recherche
///
/// Avec `zone_type`, au plus une entrée est retournée. Sans filtre de type,
/// un arrêté municipal publié ajoute une entrée pour chaque type de
/// ressource sans zone, de sorte que l'appelant en ait toujours connaissance.
pub fn format_zones(
    zones: &[&ZoneRecord],
    profile: Option<Profile>,
    zone_type: Option<WaterType>,
    decree: Option<&MunicipalDecree>,
) -> Vec<ZoneView> {
    let decree_file = decree.and_then(|d| d.chemin_fichier.as_deref());
    let placeholder = |zone_type: WaterType, file: &str| {
        ZoneView::DecreeOnly(DecreePlaceholder {
            id: None,
            zone_type,
            arrete_municipal_chemin_fichier: file.to_string(),
        })
    };

    if let Some(zone_type) = zone_type {
        return match zones.iter().find(|z| z.zone_type == zone_type) {
            Some(zone) => vec![ZoneView::Zone(Box::new(format_zone(zone, profile, decree)))],
            None => decree_file
                .map(|file| vec![placeholder(zone_type, file)])
                .unwrap_or_default(),
        };
    }

    let mut views: Vec<ZoneView> = zones
        .iter()
        .map(|z| ZoneView::Zone(Box::new(format_zone(z, profile, decree))))
        .collect();

    if let Some(file) = decree_file {
        for zone_type in WaterType::ALL {
            if !views.iter().any(|v| v.zone_type() == zone_type) {
                views.push(placeholder(zone_type, file));
            }
        }
    }

    views
}
