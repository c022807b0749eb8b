//! Database schema for the observation log.
//!
//! Applied once when the analytics sink connects.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the `observation_log` table and its indexes (idempotent).
///
/// Safe to call on every startup; no-op if the objects already exist.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // One flattened row per resolved observation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observation_log (
            id                BIGSERIAL PRIMARY KEY,
            client_mac        TEXT,
            observation_type  TEXT             NOT NULL,
            latitude          DOUBLE PRECISION NOT NULL,
            longitude         DOUBLE PRECISION NOT NULL,
            floor             TEXT             NOT NULL,
            accuracy          DOUBLE PRECISION,
            observed_at       TIMESTAMPTZ      NOT NULL,
            ap_mac            TEXT,
            ap_tags           TEXT[]           NOT NULL DEFAULT '{}',
            rssi              INTEGER,
            ipv4              TEXT,
            area              TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_observation_log_client_mac
            ON observation_log (client_mac);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_observation_log_observed_at
            ON observation_log (observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
