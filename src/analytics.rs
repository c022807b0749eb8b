//! Observation log in PostgreSQL.
//!
//! Every resolved observation is flattened into one row and inserted on a
//! spawned task. The sink never reports back: failures are logged and the
//! ingest response is unaffected.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, error, info};

use crate::models::{IndoorLocation, Observation};
use crate::schema;

/// One row of `observation_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub client_mac: Option<String>,
    pub observation_type: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub floor: String,
    pub accuracy: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub ap_mac: Option<String>,
    pub ap_tags: Vec<String>,
    pub rssi: Option<i32>,
    pub ipv4: Option<String>,
    pub area: Option<String>,
}

impl ObservationRecord {
    pub fn new(
        observation: &Observation,
        location: &IndoorLocation,
        area: Option<&str>,
    ) -> Self {
        // ---
        let observed_at =
            DateTime::from_timestamp_millis(location.timestamp).unwrap_or_else(Utc::now);

        Self {
            client_mac: observation.device_id.clone(),
            observation_type: observation.observation_type.as_str(),
            latitude: location.latitude,
            longitude: location.longitude,
            floor: location.floor.to_string(),
            accuracy: location.accuracy,
            observed_at,
            ap_mac: observation.ap_mac.clone(),
            ap_tags: observation.ap_tags.clone(),
            rssi: observation.rssi,
            ipv4: observation.ip.map(|ip| ip.to_string()),
            area: area.map(str::to_string),
        }
    }
}

/// Handle to the observation log. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AnalyticsSink {
    pool: PgPool,
}

impl AnalyticsSink {
    /// Open the pool and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        // ---
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| anyhow!("Failed to connect to analytics database: {}", e))?;

        schema::create_schema(&pool).await?;
        info!("Analytics sink ready");

        Ok(Self { pool })
    }

    /// Queue one row. Returns immediately.
    pub fn record(&self, record: ObservationRecord) {
        // ---
        let pool = self.pool.clone();
        tokio::spawn(async move {
            match insert(&pool, &record).await {
                Ok(()) => debug!(client_mac = ?record.client_mac, "Observation logged"),
                Err(e) => error!(error = %e, "Failed to log observation"),
            }
        });
    }
}

async fn insert(pool: &PgPool, record: &ObservationRecord) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO observation_log (
            client_mac, observation_type, latitude, longitude, floor, accuracy,
            observed_at, ap_mac, ap_tags, rssi, ipv4, area
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(&record.client_mac)
    .bind(record.observation_type)
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(&record.floor)
    .bind(record.accuracy)
    .bind(record.observed_at)
    .bind(&record.ap_mac)
    .bind(&record.ap_tags)
    .bind(record.rssi)
    .bind(&record.ipv4)
    .bind(&record.area)
    .execute(pool)
    .await?;

    Ok(())
}
