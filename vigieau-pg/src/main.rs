//! Point d'entrée CLI pour vigieau-pg

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use vigieau_pg::store::check_postgis;
use vigieau_pg::{create_pool, EngineConfig, FixtureStore, PgStore};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, SourceArgs};

/// Résoudre les zones d'alerte sécheresse applicables à un point ou une commune
#[derive(Parser)]
#[command(name = "vigieau-pg")]
#[command(author, version)]
#[command(about = "Zones d'alerte sécheresse: chargement depuis PostGIS, recherche et export")]
#[command(long_about = "Charge les zones d'alerte et leurs restrictions depuis PostGIS (ou un fichier JSON), construit un index spatial et répond aux recherches par point ou par commune.\n\nLa commande 'watch' garde l'instantané à jour tant que le processus tourne.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier JSON de configuration du moteur (défaut : variables d'environnement)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    source: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let config = EngineConfig::resolve(cli.config.as_deref())?;

    match &cli.source.fixture {
        Some(path) => {
            info!(fixture = %path.display(), "Using JSON fixture");
            let store = FixtureStore::from_path(path)
                .context(format!("Failed to load fixture {}", path.display()))?;
            cli::run(Arc::new(store), config, cli.command).await
        }
        None => {
            let db_config = cli.source.database_config(&config)?;
            info!(
                host = %db_config.host,
                port = db_config.port,
                database = %db_config.dbname,
                user = %db_config.user,
                ssl = ?db_config.ssl_mode,
                connections = db_config.max_connections,
                "Connecting to PostgreSQL"
            );
            let pool = create_pool(&db_config)?;
            let postgis = check_postgis(&pool).await?;
            info!(postgis = %postgis, "PostgreSQL ready");
            cli::run(Arc::new(PgStore::new(pool)), config, cli.command).await
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout est réservé aux résultats JSON
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
