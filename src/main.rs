use atlas_import::config::ImportConfig;
use atlas_import::datasets::run;
use atlas_import::logging::init_logging;
use atlas_import::pl_sql::Database;
use tracing::info;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logging();
    let config = ImportConfig::from_env()?;
    info!(database = %config.database.display(), "starting import");
    let db = Database::open(&config.database)?;
    run(&db, &config)?;
    Ok(())
}
