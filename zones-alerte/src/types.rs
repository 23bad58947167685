//! Types de données pour le crate zones-alerte

use std::fmt;
use std::str::FromStr;

use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::UnknownValue;

/// Identifiant interne d'une zone (`zone_alerte_computed.id`)
pub type ZoneId = i32;

/// Type de ressource en eau d'une zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WaterType {
    /// Eaux superficielles
    #[serde(rename = "SUP")]
    Sup,
    /// Eaux souterraines
    #[serde(rename = "SOU")]
    Sou,
    /// Eau potable (réseau de distribution)
    #[serde(rename = "AEP")]
    Aep,
}

impl WaterType {
    /// Ordre d'ajout des entrées "arrêté municipal seul"
    pub const ALL: [WaterType; 3] = [WaterType::Aep, WaterType::Sou, WaterType::Sup];

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterType::Sup => "SUP",
            WaterType::Sou => "SOU",
            WaterType::Aep => "AEP",
        }
    }
}

impl fmt::Display for WaterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaterType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUP" => Ok(WaterType::Sup),
            "SOU" => Ok(WaterType::Sou),
            "AEP" => Ok(WaterType::Aep),
            _ => Err(UnknownValue::new("zone type", s)),
        }
    }
}

/// Niveau de gravité, ordonné: vigilance < alerte < alerte_renforcee < crise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Vigilance,
    Alerte,
    AlerteRenforcee,
    Crise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Vigilance => "vigilance",
            Severity::Alerte => "alerte",
            Severity::AlerteRenforcee => "alerte_renforcee",
            Severity::Crise => "crise",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vigilance" => Ok(Severity::Vigilance),
            "alerte" => Ok(Severity::Alerte),
            "alerte_renforcee" => Ok(Severity::AlerteRenforcee),
            "crise" => Ok(Severity::Crise),
            _ => Err(UnknownValue::new("severity", s)),
        }
    }
}

/// Profil du demandeur, utilisé pour filtrer les usages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Particulier,
    Entreprise,
    Collectivite,
    Exploitation,
}

impl FromStr for Profile {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "particulier" => Ok(Profile::Particulier),
            "entreprise" => Ok(Profile::Entreprise),
            // L'API publique documente la forme accentuée
            "collectivite" | "collectivité" => Ok(Profile::Collectivite),
            "exploitation" => Ok(Profile::Exploitation),
            _ => Err(UnknownValue::new("profile", s)),
        }
    }
}

/// Statut d'un arrêté (restriction ou municipal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArreteStatus {
    AValider,
    AVenir,
    Publie,
    Abroge,
}

impl FromStr for ArreteStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a_valider" => Ok(ArreteStatus::AValider),
            "a_venir" => Ok(ArreteStatus::AVenir),
            "publie" => Ok(ArreteStatus::Publie),
            "abroge" => Ok(ArreteStatus::Abroge),
            _ => Err(UnknownValue::new("arrete status", s)),
        }
    }
}

/// Usage réglementé tel que chargé depuis la base
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageRaw {
    pub id: i32,
    pub nom: String,
    pub thematique: String,

    pub concerne_particulier: bool,
    pub concerne_entreprise: bool,
    pub concerne_collectivite: bool,
    pub concerne_exploitation: bool,

    /// Concerne les eaux superficielles
    pub concerne_esu: bool,
    /// Concerne les eaux souterraines
    pub concerne_eso: bool,
    /// Concerne l'eau potable
    pub concerne_aep: bool,

    pub description_vigilance: Option<String>,
    pub description_alerte: Option<String>,
    pub description_alerte_renforcee: Option<String>,
    pub description_crise: Option<String>,
}

impl UsageRaw {
    /// Usage applicable au type de ressource de la zone
    pub fn concerns_water_type(&self, zone_type: WaterType) -> bool {
        match zone_type {
            WaterType::Sup => self.concerne_esu,
            WaterType::Sou => self.concerne_eso,
            WaterType::Aep => self.concerne_aep,
        }
    }

    /// Description correspondant au niveau de gravité
    pub fn description_for(&self, severity: Option<Severity>) -> Option<&str> {
        match severity? {
            Severity::Vigilance => self.description_vigilance.as_deref(),
            Severity::Alerte => self.description_alerte.as_deref(),
            Severity::AlerteRenforcee => self.description_alerte_renforcee.as_deref(),
            Severity::Crise => self.description_crise.as_deref(),
        }
    }
}

/// Arrêté de restriction gouvernant une restriction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArreteRaw {
    pub id: i32,
    pub date_debut: Option<String>,
    pub date_fin: Option<String>,
    pub statut: ArreteStatus,
    /// Code du département ayant pris l'arrêté
    pub departement: Option<String>,
    pub chemin_fichier: Option<String>,
    /// Fichier de l'arrêté cadre associé
    pub chemin_fichier_arrete_cadre: Option<String>,
}

/// Restriction appliquée à une zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionRaw {
    pub id: i32,
    pub arrete: ArreteRaw,
    #[serde(default)]
    pub usages: Vec<UsageRaw>,
}

/// Zone telle que produite par le chargeur de géométries
#[derive(Debug, Clone)]
pub struct ZoneRaw {
    pub id: ZoneId,
    pub id_sandre: Option<i32>,
    pub code: Option<String>,
    pub nom: String,
    pub zone_type: WaterType,
    /// Autorise la superposition avec une autre zone du même type
    pub ressource_influencee: bool,
    pub niveau_gravite: Option<Severity>,
    pub departement: Option<String>,
    pub bassin_versant: Option<String>,

    /// Géométrie en WGS84 (Polygon ou MultiPolygon)
    pub geometry: Geometry<f64>,

    /// Restriction rattachée (arrêté publié uniquement)
    pub restriction: Option<RestrictionRaw>,

    /// Codes INSEE des communes membres
    pub communes: Vec<String>,
}

/// Arrêté municipal publié sur une commune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalDecree {
    pub id: i32,
    /// Code INSEE de la commune (non normalisé)
    pub commune: String,
    pub statut: ArreteStatus,
    pub chemin_fichier: Option<String>,
}
