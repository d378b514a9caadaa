//! Migrate command - schema management for the users table.

use sea_orm::DbErr;

use crate::cli::args::{MigrateAction, MigrateArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::Database;

/// Execute the migrate command
pub async fn execute(args: MigrateArgs, config: Config) -> AppResult<()> {
    // Migrations run only when asked for here
    let db = Database::connect_without_migrations(&config)
        .await
        .map_err(|e| failed("connect", e))?;

    match args.action {
        MigrateAction::Up => {
            db.run_migrations().await.map_err(|e| failed("up", e))?;
            tracing::info!("Users schema is up to date");
        }
        MigrateAction::Down => {
            db.rollback_migration()
                .await
                .map_err(|e| failed("down", e))?;
            tracing::info!("Rolled back the last migration");
        }
        MigrateAction::Status => {
            let status = db
                .migration_status()
                .await
                .map_err(|e| failed("status", e))?;
            for (name, applied) in status {
                println!("{}: {}", name, if applied { "applied" } else { "pending" });
            }
        }
        MigrateAction::Fresh => {
            tracing::warn!("Dropping every table, including users");
            db.fresh_migrations()
                .await
                .map_err(|e| failed("fresh", e))?;
            tracing::info!("Schema recreated");
        }
    }

    Ok(())
}

fn failed(step: &str, e: DbErr) -> AppError {
    AppError::internal(format!("migrate {} failed: {}", step, e))
}
