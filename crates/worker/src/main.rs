//! History audit sweep.
//!
//! Connects to the database, applies migrations, then verifies the delta
//! chain of every stored document and logs a summary. Exits non-zero when
//! any document has a broken history.

use std::process::ExitCode;

use folio_core::config::VersioningConfig;
use folio_core::versioning::VersionManager;
use folio_db::repositories::ContentRecordRepo;
use folio_db::{DbConfig, PgArchiveStore, PgVersionStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_worker=debug,folio_db=info,folio_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_config = DbConfig::from_env().expect("Invalid database configuration");
    let versioning = VersioningConfig::from_env().expect("Invalid versioning configuration");

    let pool = folio_db::create_pool(&db_config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    folio_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    folio_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let document_ids = ContentRecordRepo::list_document_ids(&pool)
        .await
        .expect("Failed to list documents");
    tracing::info!(documents = document_ids.len(), "Starting history audit");

    let manager = VersionManager::new(
        PgVersionStore::from_config(pool.clone(), &versioning),
        PgArchiveStore::new(pool),
        versioning,
    );

    let mut healthy = 0usize;
    let mut broken = 0usize;
    let mut failed = 0usize;
    for document_id in document_ids {
        match manager.verify_history(document_id).await {
            Ok(audit) if audit.is_healthy() => healthy += 1,
            Ok(audit) => {
                broken += 1;
                let issues = serde_json::to_string(&audit.issues).unwrap_or_default();
                tracing::warn!(
                    document_id,
                    current_version = audit.current_version,
                    checked_versions = audit.checked_versions,
                    %issues,
                    "Broken document history"
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(document_id, error = %e, "History audit failed");
            }
        }
    }

    tracing::info!(healthy, broken, failed, "History audit finished");
    if broken + failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
