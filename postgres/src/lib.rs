//! `PostgreSQL` stores for the booking marketplace.
//!
//! [`PostgresStore`] implements every persistence port from
//! `marketplace-core` over one connection pool:
//!
//! - Guarded transitions run as single transactions with conditional
//!   `UPDATE ... WHERE status = ...` statements
//! - Gateway references, booking codes and settlement ids are unique keys
//! - At most one configuration row is active (partial unique index)
//!
//! # Example
//!
//! ```ignore
//! use marketplace_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/marketplace", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod configurations;
mod listings;
mod payments;
mod schema;
mod settlements;
mod vendors;

use marketplace_core::error::{StoreError, ValidationError};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use std::str::FromStr;

pub use schema::MIGRATIONS;

/// Result alias used throughout the crate
type Result<T> = std::result::Result<T, StoreError>;

/// `PostgreSQL` implementation of the marketplace stores.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if any statement fails; the whole
    /// migration is rolled back.
    pub async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        tracing::info!(statements = MIGRATIONS.len(), "Database schema up to date");
        Ok(())
    }
}

/// Maps driver errors, keeping unique violations distinguishable.
pub(crate) fn db_err(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(error.to_string())
}

/// Reads a column, reporting type mismatches as corrupt data.
pub(crate) fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("{name}: {e}")))
}

/// Parses a text column into a domain enum.
pub(crate) fn parse<T>(row: &PgRow, name: &str) -> Result<T>
where
    T: FromStr<Err = ValidationError>,
{
    let text: String = col(row, name)?;
    text.parse()
        .map_err(|e: ValidationError| StoreError::Corrupt(format!("{name}: {e}")))
}

/// Parses a nullable text column into a domain enum.
pub(crate) fn parse_opt<T>(row: &PgRow, name: &str) -> Result<Option<T>>
where
    T: FromStr<Err = ValidationError>,
{
    let text: Option<String> = col(row, name)?;
    text.map(|t| {
        t.parse()
            .map_err(|e: ValidationError| StoreError::Corrupt(format!("{name}: {e}")))
    })
    .transpose()
}

/// Decodes a JSONB column with serde.
pub(crate) fn json<T: serde::de::DeserializeOwned>(value: serde_json::Value, name: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt(format!("{name}: {e}")))
}

/// Encodes a value for a JSONB column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Converts a page size or offset to a SQL bind value.
pub(crate) fn bind_u32(value: u32) -> i64 {
    i64::from(value)
}
