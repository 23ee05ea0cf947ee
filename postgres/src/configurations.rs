//! Versioned platform configuration.

use crate::{PostgresStore, Result, col, db_err, json, to_json};
use chrono::{DateTime, Utc};
use marketplace_core::BoxFuture;
use marketplace_core::commission::{CommissionRates, Configuration};
use marketplace_core::store::ConfigurationStore;
use marketplace_core::types::{ConfigurationId, UserId};
use sqlx::postgres::PgRow;
use uuid::Uuid;

fn configuration_from_row(row: &PgRow) -> Result<Configuration> {
    Ok(Configuration {
        id: ConfigurationId::from_uuid(col(row, "id")?),
        version: col(row, "version")?,
        commission_rates: json(col(row, "commission_rates")?, "commission_rates")?,
        is_active: col(row, "is_active")?,
        updated_by: col::<Option<Uuid>>(row, "updated_by")?.map(UserId::from_uuid),
        updated_at: col(row, "updated_at")?,
    })
}

impl ConfigurationStore for PostgresStore {
    fn active_configuration(&self) -> BoxFuture<'_, Result<Option<Configuration>>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT id, version, commission_rates, is_active, updated_by, updated_at
                FROM configurations
                WHERE is_active
                ",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            row.as_ref().map(configuration_from_row).transpose()
        })
    }

    fn activate_configuration(
        &self,
        rates: CommissionRates,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Configuration>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            // Serializes activations so versions stay gapless and only one
            // row is ever active.
            sqlx::query("LOCK TABLE configurations IN EXCLUSIVE MODE")
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM configurations")
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;

            sqlx::query("UPDATE configurations SET is_active = FALSE WHERE is_active")
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let row = sqlx::query(
                r"
                INSERT INTO configurations (id, version, commission_rates, is_active, updated_by, updated_at)
                VALUES ($1, $2, $3, TRUE, $4, $5)
                RETURNING id, version, commission_rates, is_active, updated_by, updated_at
                ",
            )
            .bind(ConfigurationId::new().as_uuid())
            .bind(current.unwrap_or(0) + 1)
            .bind(to_json(&rates)?)
            .bind(actor.as_uuid())
            .bind(at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;

            let configuration = configuration_from_row(&row)?;
            tracing::info!(
                version = configuration.version,
                actor = %actor,
                "Configuration activated"
            );
            Ok(configuration)
        })
    }
}
