//! Lecture des zones d'alerte depuis PostgreSQL/PostGIS
//!
//! Les noms de tables et de colonnes sont ceux du schéma applicatif
//! (colonnes en camelCase, donc entre guillemets).

use std::collections::HashMap;
use std::time::SystemTime;

use deadpool_postgres::Pool;
use geozero::wkb::Wkb;
use geozero::ToGeo;
use tokio_postgres::Row;
use tracing::debug;
use zones_alerte::{ArreteRaw, MunicipalDecree, RestrictionRaw, UsageRaw, ZoneId, ZoneRaw};

use super::{StoreError, ZoneStore};

const ZONES_SQL: &str = r#"
    SELECT z.id, z."idSandre", z.code, z.nom, z.type, z."ressourceInfluencee",
           z."niveauGravite"::text AS "niveauGravite",
           d.code AS departement, bv.nom AS "bassinVersant",
           ST_AsBinary(ST_Transform(z.geom, 4326)) AS geom
    FROM zone_alerte_computed z
    LEFT JOIN departement d ON d.id = z."departementId"
    LEFT JOIN bassin_versant bv ON bv.id = z."bassinVersantId"
    ORDER BY z.id
"#;

const RESTRICTIONS_SQL: &str = r#"
    SELECT z.id AS "zoneId", r.id AS "restrictionId",
           ar.id AS "arreteId", ar."dateDebut"::text AS "dateDebut",
           ar."dateFin"::text AS "dateFin", ar.statut::text AS statut,
           d.code AS departement, f.url AS "cheminFichier",
           fc.url AS "cheminFichierArreteCadre"
    FROM zone_alerte_computed z
    JOIN restriction r ON r.id = z."restrictionId"
    JOIN arrete_restriction ar ON ar.id = r."arreteRestrictionId"
    LEFT JOIN departement d ON d.id = ar."departementId"
    LEFT JOIN fichier f ON f.id = ar."fichierId"
    LEFT JOIN arrete_cadre ac ON ac.id = r."arreteCadreId"
    LEFT JOIN fichier fc ON fc.id = ac."fichierId"
    WHERE z.id = ANY($1) AND ar.statut = 'publie'
"#;

const USAGES_SQL: &str = r#"
    SELECT u."restrictionId", u.id, u.nom, t.nom AS thematique,
           u."concerneParticulier", u."concerneEntreprise",
           u."concerneCollectivite", u."concerneExploitation",
           u."concerneEsu", u."concerneEso", u."concerneAep",
           u."descriptionVigilance", u."descriptionAlerte",
           u."descriptionAlerteRenforcee", u."descriptionCrise"
    FROM usage u
    LEFT JOIN thematique t ON t.id = u."thematiqueId"
    WHERE u."restrictionId" = ANY($1)
    ORDER BY u."restrictionId", u.id
"#;

const COMMUNES_SQL: &str = r#"
    SELECT zc."zoneAlerteComputedId" AS "zoneId", c.code
    FROM zone_alerte_computed_commune zc
    JOIN commune c ON c.id = zc."communeId"
    WHERE zc."zoneAlerteComputedId" = ANY($1)
    ORDER BY zc."zoneAlerteComputedId", c.code
"#;

const DECREES_SQL: &str = r#"
    SELECT am.id, c.code AS commune, am.statut::text AS statut, f.url AS "cheminFichier"
    FROM arrete_municipal am
    JOIN arrete_municipal_commune amc ON amc."arreteMunicipalId" = am.id
    JOIN commune c ON c.id = amc."communeId"
    LEFT JOIN fichier f ON f.id = am."fichierId"
    WHERE am.statut = 'publie'
    ORDER BY am.id
"#;

const ZONES_COMPUTED_AT_SQL: &str =
    r#"SELECT MAX("computeZoneAlerteComputedDate")::timestamptz FROM config"#;

const DECREES_UPDATED_AT_SQL: &str =
    "SELECT MAX(updated_at)::timestamptz FROM arrete_municipal";

/// Source PostgreSQL, partagée entre les lots via le pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn timestamp(&self, sql: &str) -> Result<Option<SystemTime>, StoreError> {
        let client = self.pool.get().await?;
        let row = client.query_one(sql, &[]).await?;
        Ok(row.try_get(0)?)
    }
}

fn zone_from_row(row: &Row) -> Result<ZoneRaw, StoreError> {
    let id: ZoneId = row.try_get("id")?;
    let zone_type: String = row.try_get("type")?;
    let severity: Option<String> = row.try_get("niveauGravite")?;
    let wkb: Vec<u8> = row.try_get("geom")?;

    let geometry = Wkb(wkb).to_geo().map_err(|e| StoreError::Geometry {
        zone_id: id,
        reason: e.to_string(),
    })?;

    Ok(ZoneRaw {
        id,
        id_sandre: row.try_get("idSandre")?,
        code: row.try_get("code")?,
        nom: row.try_get("nom")?,
        zone_type: zone_type.parse()?,
        ressource_influencee: row.try_get("ressourceInfluencee")?,
        niveau_gravite: severity.as_deref().map(str::parse).transpose()?,
        departement: row.try_get("departement")?,
        bassin_versant: row.try_get("bassinVersant")?,
        geometry,
        restriction: None,
        communes: Vec::new(),
    })
}

fn usage_from_row(row: &Row) -> Result<UsageRaw, StoreError> {
    Ok(UsageRaw {
        id: row.try_get("id")?,
        nom: row.try_get("nom")?,
        thematique: row
            .try_get::<_, Option<String>>("thematique")?
            .unwrap_or_default(),
        concerne_particulier: row.try_get("concerneParticulier")?,
        concerne_entreprise: row.try_get("concerneEntreprise")?,
        concerne_collectivite: row.try_get("concerneCollectivite")?,
        concerne_exploitation: row.try_get("concerneExploitation")?,
        concerne_esu: row.try_get("concerneEsu")?,
        concerne_eso: row.try_get("concerneEso")?,
        concerne_aep: row.try_get("concerneAep")?,
        description_vigilance: row.try_get("descriptionVigilance")?,
        description_alerte: row.try_get("descriptionAlerte")?,
        description_alerte_renforcee: row.try_get("descriptionAlerteRenforcee")?,
        description_crise: row.try_get("descriptionCrise")?,
    })
}

impl ZoneStore for PgStore {
    async fn fetch_zones(&self) -> Result<Vec<ZoneRaw>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client.query(ZONES_SQL, &[]).await?;
        rows.iter().map(zone_from_row).collect()
    }

    async fn fetch_restrictions(
        &self,
        zone_ids: &[ZoneId],
    ) -> Result<HashMap<ZoneId, RestrictionRaw>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client.query(RESTRICTIONS_SQL, &[&zone_ids]).await?;

        let mut restrictions = HashMap::with_capacity(rows.len());
        let mut restriction_ids: Vec<i32> = Vec::with_capacity(rows.len());
        for row in &rows {
            let zone_id: ZoneId = row.try_get("zoneId")?;
            let statut: String = row.try_get("statut")?;
            let restriction = RestrictionRaw {
                id: row.try_get("restrictionId")?,
                arrete: ArreteRaw {
                    id: row.try_get("arreteId")?,
                    date_debut: row.try_get("dateDebut")?,
                    date_fin: row.try_get("dateFin")?,
                    statut: statut.parse()?,
                    departement: row.try_get("departement")?,
                    chemin_fichier: row.try_get("cheminFichier")?,
                    chemin_fichier_arrete_cadre: row.try_get("cheminFichierArreteCadre")?,
                },
                usages: Vec::new(),
            };
            restriction_ids.push(restriction.id);
            restrictions.insert(zone_id, restriction);
        }

        if restriction_ids.is_empty() {
            return Ok(restrictions);
        }
        restriction_ids.sort_unstable();
        restriction_ids.dedup();

        // Plusieurs zones peuvent partager une restriction
        let mut usages: HashMap<i32, Vec<UsageRaw>> = HashMap::new();
        for row in client.query(USAGES_SQL, &[&restriction_ids]).await? {
            let restriction_id: i32 = row.try_get("restrictionId")?;
            usages
                .entry(restriction_id)
                .or_default()
                .push(usage_from_row(&row)?);
        }
        for restriction in restrictions.values_mut() {
            if let Some(list) = usages.get(&restriction.id) {
                restriction.usages = list.clone();
            }
        }

        debug!(
            zones = zone_ids.len(),
            restrictions = restriction_ids.len(),
            "Restrictions fetched"
        );
        Ok(restrictions)
    }

    async fn fetch_communes(
        &self,
        zone_ids: &[ZoneId],
    ) -> Result<HashMap<ZoneId, Vec<String>>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client.query(COMMUNES_SQL, &[&zone_ids]).await?;

        let mut communes: HashMap<ZoneId, Vec<String>> = HashMap::new();
        for row in &rows {
            let zone_id: ZoneId = row.try_get("zoneId")?;
            communes.entry(zone_id).or_default().push(row.try_get("code")?);
        }
        Ok(communes)
    }

    async fn fetch_municipal_decrees(&self) -> Result<Vec<MunicipalDecree>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client.query(DECREES_SQL, &[]).await?;
        rows.iter()
            .map(|row| {
                let statut: String = row.try_get("statut")?;
                Ok(MunicipalDecree {
                    id: row.try_get("id")?,
                    commune: row.try_get("commune")?,
                    statut: statut.parse()?,
                    chemin_fichier: row.try_get("cheminFichier")?,
                })
            })
            .collect()
    }

    async fn zones_computed_at(&self) -> Result<Option<SystemTime>, StoreError> {
        self.timestamp(ZONES_COMPUTED_AT_SQL).await
    }

    async fn decrees_updated_at(&self) -> Result<Option<SystemTime>, StoreError> {
        self.timestamp(DECREES_UPDATED_AT_SQL).await
    }
}
