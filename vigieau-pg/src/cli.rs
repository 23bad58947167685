//! Définition et implémentation des commandes CLI
//!
//! - `watch`: chargement initial puis rafraîchissement périodique
//! - `resolve`, `zone`, `departement`, `situation`: recherches ponctuelles
//! - `conflicts`: communes portant plusieurs zones actives de même type
//! - `export`: zones publiées vers GeoJSON

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;
use zones_alerte::resolve::find_conflict;
use zones_alerte::{Profile, ResolveQuery, Snapshot, WaterType, ZoneError, ZoneId, ZoneResolver};

use vigieau_pg::export::export_to_geojson;
use vigieau_pg::store::SslMode;
use vigieau_pg::{DatabaseConfig, EngineConfig, RefreshController, Scheduler, ZoneStore, ZonesService};

/// Source des données (PostgreSQL par défaut)
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Fichier JSON de zones à la place de PostgreSQL
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env PGDATABASE / vigieau)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// SSL mode: disable, require, verify-ca, verify-full (défaut : env PGSSLMODE / disable)
    #[arg(long, global = true)]
    pub ssl: Option<SslMode>,
}

impl SourceArgs {
    /// Configuration PostgreSQL: environnement, puis options, pool ajusté au chargeur
    pub fn database_config(&self, engine: &EngineConfig) -> Result<DatabaseConfig> {
        Ok(DatabaseConfig::from_env()?
            .host(self.host.clone())
            .port(self.port)
            .dbname(self.database.clone())
            .user(self.user.clone())
            .password(self.password.clone())
            .ssl_mode(self.ssl)
            .sized_for(engine))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load zones and keep them fresh until Ctrl-C
    Watch,

    /// Resolve the zones applicable to a point or a municipality
    Resolve {
        /// Longitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Latitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        /// INSEE municipality code (arrondissements accepted)
        #[arg(long)]
        commune: Option<String>,

        /// Profile used to filter usages (particulier, entreprise, collectivite, exploitation)
        #[arg(long)]
        profil: Option<Profile>,

        /// Water type (SUP, SOU, AEP)
        #[arg(long = "type")]
        zone_type: Option<WaterType>,
    },

    /// Show one zone by id
    Zone {
        id: ZoneId,
    },

    /// List the zones of a departement
    Departement {
        code: String,
    },

    /// Maximum severity per departement
    Situation {
        /// Departement code (all departements if omitted)
        code: Option<String>,
    },

    /// List municipalities with several active zones of the same water type
    Conflicts,

    /// Export published zones to GeoJSON
    Export {
        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Commune en conflit, pour le diagnostic
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Conflict<'a> {
    commune: &'a str,
    #[serde(rename = "type")]
    zone_type: WaterType,
    zones: Vec<ZoneId>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exécute une commande sur une source de données
pub async fn run<S: ZoneStore>(store: Arc<S>, config: EngineConfig, command: Commands) -> Result<()> {
    let controller = Arc::new(RefreshController::new(store, config));

    if let Commands::Watch = command {
        return cmd_watch(controller).await;
    }

    controller
        .refresh_zones()
        .await
        .context("Failed to load zones")?;
    let snapshot = controller
        .current()
        .context("No snapshot published after load")?;

    match command {
        Commands::Watch => Ok(()),
        Commands::Resolve {
            lon,
            lat,
            commune,
            profil,
            zone_type,
        } => {
            let query = ResolveQuery {
                lon,
                lat,
                commune,
                profile: profil,
                zone_type,
            };
            print_json(&snapshot.resolve(&query)?)
        }
        Commands::Zone { id } => print_json(&snapshot.zone_by_id(id)?),
        Commands::Departement { code } => print_json(&snapshot.zones_by_departement(&code)?),
        Commands::Situation { code: Some(code) } => {
            let situation = snapshot
                .departement_situation(&code)
                .ok_or(ZoneError::NoZoneForDepartement(code))?;
            print_json(&situation)
        }
        Commands::Situation { code: None } => print_json(&snapshot.departement_situations()),
        Commands::Conflicts => cmd_conflicts(&snapshot),
        Commands::Export { output } => {
            let count = export_to_geojson(&snapshot, &output)?;
            info!(zones = count, output = %output.display(), "GeoJSON export done");
            Ok(())
        }
    }
}

/// Service: chargement initial bloquant, puis deux minuteries
async fn cmd_watch<S: ZoneStore>(controller: Arc<RefreshController<S>>) -> Result<()> {
    let snapshot = controller.initial_load().await;
    info!(
        version = snapshot.version(),
        zones = snapshot.zones().len(),
        "Ready"
    );

    let service = ZonesService::new(controller.subscribe());
    let situations = service.situations().await?;
    info!(departements = situations.len(), "Departements covered");

    let scheduler = Scheduler::start(Arc::clone(&controller));
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    scheduler.shutdown();
    info!("Stopped");
    Ok(())
}

/// Parcourt toutes les communes avec le résolveur de diagnostic
fn cmd_conflicts(snapshot: &Snapshot) -> Result<()> {
    let resolver = ZoneResolver::diagnostic(snapshot);
    let mut conflicts = Vec::new();
    for commune in snapshot.zones().communes() {
        let zones = resolver.by_commune(commune)?;
        if let Some((zone_type, zones)) = find_conflict(&zones) {
            conflicts.push(Conflict {
                commune,
                zone_type,
                zones,
            });
        }
    }
    info!(
        communes = snapshot.zones().communes().len(),
        conflicts = conflicts.len(),
        "Overlap scan done"
    );
    print_json(&conflicts)
}
