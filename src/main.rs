use sea_orm::{Database, DatabaseConnection};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use baranki_seeder::entities::setup_schema;
use baranki_seeder::{FakerSource, SeaOrmSink, SeedConfig, SeedingPipeline};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match SeedConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };

    let db: DatabaseConnection = match Database::connect(&config.database_url).await {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, "could not connect to the database");
            std::process::exit(1);
        }
    };
    if let Err(err) = setup_schema(&db, config.reset).await {
        error!(error = %err, "could not set up the schema");
        std::process::exit(1);
    }

    let mut pipeline = SeedingPipeline::new(config, SeaOrmSink::new(db), Box::new(FakerSource));
    match pipeline.run().await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => info!("run report:\n{json}"),
            Err(err) => error!(error = %err, "could not serialize the run report"),
        },
        Err(err) => {
            error!(
                stage = %err.stage,
                error = %err.source,
                committed = err.completed.len(),
                "seeding aborted"
            );
            std::process::exit(1);
        }
    }
}
