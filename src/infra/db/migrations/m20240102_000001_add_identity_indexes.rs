//! Migration: Partial unique indexes backing the identity invariants.
//!
//! Uniqueness of external ids, case-folded usernames and the email of
//! accounts without an external identity is enforced here; application
//! pre-checks only avoid the round trip.

use sea_orm_migration::prelude::*;

/// Index names are matched when translating unique violations.
pub const USERNAME_INDEX: &str = "uq_users_username_lower";
pub const EXTERNAL_ID_INDEX: &str = "uq_users_external_id";
pub const LOCAL_EMAIL_INDEX: &str = "uq_users_local_email";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON users (external_id) \
             WHERE external_id IS NOT NULL",
            EXTERNAL_ID_INDEX
        ))
        .await?;

        db.execute_unprepared(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON users (LOWER(username)) \
             WHERE username IS NOT NULL AND username <> ''",
            USERNAME_INDEX
        ))
        .await?;

        // Emails are stored lower-cased
        db.execute_unprepared(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON users (email) \
             WHERE external_id IS NULL",
            LOCAL_EMAIL_INDEX
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(&format!("DROP INDEX IF EXISTS {}", LOCAL_EMAIL_INDEX))
            .await?;
        db.execute_unprepared(&format!("DROP INDEX IF EXISTS {}", USERNAME_INDEX))
            .await?;
        db.execute_unprepared(&format!("DROP INDEX IF EXISTS {}", EXTERNAL_ID_INDEX))
            .await?;

        Ok(())
    }
}
