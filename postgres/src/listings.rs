//! Listing ownership lookups.
//!
//! The listing catalog itself lives elsewhere; this table mirrors the
//! `(category, id) -> vendor` mapping needed to resolve booking ownership.

use crate::{PostgresStore, Result, col, db_err};
use marketplace_core::BoxFuture;
use marketplace_core::listing::{ListingDirectory, ListingRef};
use marketplace_core::types::{Category, UserId};

impl PostgresStore {
    /// Registers or re-points a listing
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](marketplace_core::error::StoreError::Database)
    /// on failure.
    pub async fn upsert_listing(&self, category: Category, listing_id: &str, vendor: UserId) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO listings (category, id, vendor_id) VALUES ($1, $2, $3)
            ON CONFLICT (category, id) DO UPDATE SET vendor_id = EXCLUDED.vendor_id
            ",
        )
        .bind(category.as_str())
        .bind(listing_id)
        .bind(vendor.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

impl ListingDirectory for PostgresStore {
    fn find_listing<'a>(
        &'a self,
        category: Category,
        listing_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ListingRef>>> {
        Box::pin(async move {
            let row = sqlx::query("SELECT vendor_id FROM listings WHERE category = $1 AND id = $2")
                .bind(category.as_str())
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.map(|row| {
                Ok(ListingRef {
                    listing_id: listing_id.to_string(),
                    category,
                    vendor: UserId::from_uuid(col(&row, "vendor_id")?),
                })
            })
            .transpose()
        })
    }
}
