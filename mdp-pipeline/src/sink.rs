//! Downstream sink for fused rows
//!
//! The sink receives every successful fusion pass. [`SqliteSink`] bulk-loads
//! into a vessel registry (`ships`) plus a position table (`ais_data`) that
//! references it.

use crate::error::PipelineResult;
use crate::fusion::FusedRecord;
use async_trait::async_trait;

#[async_trait]
pub trait FusedSink: Send + Sync {
    /// Name used in log entries
    fn name(&self) -> &'static str;

    /// Store `rows`; returns how many rows were accepted
    async fn write(&self, rows: &[FusedRecord]) -> PipelineResult<usize>;
}

#[cfg(feature = "sqlx")]
pub use sqlite::SqliteSink;

#[cfg(feature = "sqlx")]
mod sqlite {
    use super::FusedSink;
    use crate::error::{PipelineError, PipelineResult};
    use crate::fusion::FusedRecord;
    use async_trait::async_trait;
    use mdp_common::time::from_epoch_millis;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
    use std::path::Path;
    use tracing::{debug, info};

    const SCHEMA: &[&str] = &[
        r#"CREATE TABLE IF NOT EXISTS ships (
            vessel_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            mmsi TEXT UNIQUE,
            imo INTEGER
        )"#,
        r#"CREATE TABLE IF NOT EXISTS ais_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vessel_id TEXT NOT NULL REFERENCES ships(vessel_id),
            "timestamp" TEXT,
            latitude REAL,
            longitude REAL,
            sog REAL,
            cog REAL,
            heading REAL,
            nav_stat INTEGER,
            port_call_id INTEGER,
            site_number INTEGER,
            sea_state TEXT,
            match_distance_deg REAL,
            UNIQUE(vessel_id, "timestamp")
        )"#,
    ];

    /// SQLite bulk-load sink keyed by vessel identity (mmsi)
    #[derive(Debug, Clone)]
    pub struct SqliteSink {
        pool: SqlitePool,
    }

    impl SqliteSink {
        /// Open (creating if missing) the database at `path` and its tables
        pub async fn connect(path: &Path) -> PipelineResult<Self> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);

            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .map_err(sink_error)?;

            for statement in SCHEMA {
                sqlx::query(*statement).execute(&pool).await.map_err(sink_error)?;
            }

            info!(path = %path.display(), "SQLite sink ready");
            Ok(Self { pool })
        }

        pub fn pool(&self) -> &SqlitePool {
            &self.pool
        }
    }

    #[async_trait]
    impl FusedSink for SqliteSink {
        fn name(&self) -> &'static str {
            "sqlite"
        }

        async fn write(&self, rows: &[FusedRecord]) -> PipelineResult<usize> {
            let mut tx = self.pool.begin().await.map_err(sink_error)?;
            let mut inserted = 0usize;

            for row in rows {
                let vessel_id = row.vessel.mmsi.as_str();
                let call = row.port_call.as_ref();
                let name = call
                    .and_then(|c| c.vessel_name.clone())
                    .unwrap_or_else(|| vessel_id.to_string());
                let imo = call.and_then(|c| c.imo);

                sqlx::query(
                    r#"INSERT INTO ships (vessel_id, name, mmsi, imo)
                       VALUES (?, ?, ?, ?)
                       ON CONFLICT(vessel_id) DO UPDATE SET
                           name = excluded.name,
                           imo = COALESCE(excluded.imo, ships.imo)"#,
                )
                .bind(vessel_id)
                .bind(name.as_str())
                .bind(vessel_id)
                .bind(imo)
                .execute(&mut *tx)
                .await
                .map_err(sink_error)?;

                let timestamp = row
                    .vessel
                    .timestamp_external
                    .and_then(from_epoch_millis)
                    .map(|t| t.to_rfc3339());

                let result = sqlx::query(
                    r#"INSERT OR IGNORE INTO ais_data (
                           vessel_id, "timestamp", latitude, longitude, sog, cog, heading,
                           nav_stat, port_call_id, site_number, sea_state, match_distance_deg
                       ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(vessel_id)
                .bind(timestamp)
                .bind(row.vessel.latitude)
                .bind(row.vessel.longitude)
                .bind(row.vessel.sog)
                .bind(row.vessel.cog)
                .bind(row.vessel.heading)
                .bind(row.vessel.nav_stat)
                .bind(call.map(|c| c.port_call_id))
                .bind(row.sea_state.site_number)
                .bind(row.sea_state.sea_state.as_deref())
                .bind(row.match_distance_deg)
                .execute(&mut *tx)
                .await
                .map_err(sink_error)?;

                inserted += result.rows_affected() as usize;
            }

            tx.commit().await.map_err(sink_error)?;
            debug!(rows = rows.len(), inserted, "Fused rows loaded into SQLite");
            Ok(inserted)
        }
    }

    fn sink_error(e: sqlx::Error) -> PipelineError {
        PipelineError::Sink(e.to_string())
    }
}
