//! Initialize the database: create it if missing, recreate every table, then seed the
//! admin user, the default project and the default data source.

use genai_controller::{ensure_database_exists, Client, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .init();

    ensure_database_exists(&settings.database_url).await?;
    let client = Client::connect(&settings).await?;

    tracing::info!("running init db");
    client.create_tables(true, None).await.with_raise()?;

    let mut session = client.session().await?;
    let seeded = client.bootstrap(Some(&mut *session)).await?;
    tracing::info!(
        admin = %seeded.admin.metadata.name,
        project = %seeded.project.metadata.name,
        data_source = %seeded.data_source.metadata.name,
        "database initialized"
    );
    Ok(())
}
