//! Vendor payout profiles.

use crate::{PostgresStore, Result, col, db_err, parse, parse_opt};
use chrono::{DateTime, Utc};
use marketplace_core::BoxFuture;
use marketplace_core::store::VendorStore;
use marketplace_core::error::StoreError;
use marketplace_core::types::{Category, Percentage, UserId};
use marketplace_core::vendor::{BankDetails, Subaccount, VendorProfile};
use sqlx::postgres::PgRow;

const VENDOR_COLUMNS: &str = "id, vendor_account_preference, commission_rate_bps, subaccount_id, \
     subaccount_status, business_name, settlement_bank, account_number, bank_code, account_name, \
     bank_name, last_verified_at, subaccount_created_at, subaccount_updated_at";

fn vendor_from_row(row: &PgRow) -> Result<VendorProfile> {
    let commission_rate = col::<Option<i32>>(row, "commission_rate_bps")?
        .map(|bps| {
            u32::try_from(bps)
                .ok()
                .and_then(|bps| Percentage::from_bps(bps).ok())
                .ok_or_else(|| StoreError::Corrupt(format!("commission_rate_bps: {bps}")))
        })
        .transpose()?;

    let subaccount = match col::<Option<String>>(row, "subaccount_id")? {
        Some(subaccount_id) => Some(Subaccount {
            subaccount_id,
            status: parse(row, "subaccount_status")?,
            business_name: col::<Option<String>>(row, "business_name")?.unwrap_or_default(),
            settlement_bank: col::<Option<String>>(row, "settlement_bank")?.unwrap_or_default(),
            bank_details: BankDetails {
                account_number: col::<Option<String>>(row, "account_number")?.unwrap_or_default(),
                bank_code: col::<Option<String>>(row, "bank_code")?.unwrap_or_default(),
                account_name: col(row, "account_name")?,
                bank_name: col(row, "bank_name")?,
            },
            last_verified_at: col(row, "last_verified_at")?,
            created_at: col::<Option<DateTime<Utc>>>(row, "subaccount_created_at")?
                .ok_or_else(|| StoreError::Corrupt("subaccount_created_at: null".into()))?,
            updated_at: col::<Option<DateTime<Utc>>>(row, "subaccount_updated_at")?
                .ok_or_else(|| StoreError::Corrupt("subaccount_updated_at: null".into()))?,
        }),
        None => None,
    };

    Ok(VendorProfile {
        id: UserId::from_uuid(col(row, "id")?),
        vendor_account_preference: parse_opt(row, "vendor_account_preference")?,
        commission_rate,
        subaccount,
    })
}

fn rate_to_bps(rate: Option<Percentage>) -> Option<i32> {
    rate.and_then(|r| i32::try_from(r.bps()).ok())
}

impl VendorStore for PostgresStore {
    fn get_vendor(&self, id: UserId) -> BoxFuture<'_, Result<Option<VendorProfile>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.as_ref().map(vendor_from_row).transpose()
        })
    }

    fn find_by_subaccount<'a>(&'a self, subaccount_id: &'a str) -> BoxFuture<'a, Result<Option<VendorProfile>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE subaccount_id = $1"))
                .bind(subaccount_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.as_ref().map(vendor_from_row).transpose()
        })
    }

    fn list_subaccount_vendors(&self) -> BoxFuture<'_, Result<Vec<VendorProfile>>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {VENDOR_COLUMNS} FROM vendors WHERE subaccount_id IS NOT NULL ORDER BY id"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.iter().map(vendor_from_row).collect()
        })
    }

    fn reserve_subaccount(&self, id: UserId, preference: Option<Category>) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let reserved = sqlx::query(
                r"
                INSERT INTO vendors (id, vendor_account_preference, subaccount_reserved)
                VALUES ($1, $2, TRUE)
                ON CONFLICT (id) DO UPDATE
                SET subaccount_reserved = TRUE,
                    vendor_account_preference = COALESCE(vendors.vendor_account_preference, EXCLUDED.vendor_account_preference),
                    updated_at = now()
                WHERE vendors.subaccount_id IS NULL AND NOT vendors.subaccount_reserved
                RETURNING id
                ",
            )
            .bind(id.as_uuid())
            .bind(preference.map(Category::as_str))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .is_some();

            if !reserved {
                tracing::debug!(vendor = %id, "Sub-account exists or creation in progress");
            }
            Ok(reserved)
        })
    }

    fn release_subaccount(&self, id: UserId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query("UPDATE vendors SET subaccount_reserved = FALSE, updated_at = now() WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(())
        })
    }

    fn save_subaccount(&self, id: UserId, subaccount: Subaccount) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO vendors (
                    id, subaccount_id, subaccount_status, business_name, settlement_bank,
                    account_number, bank_code, account_name, bank_name, last_verified_at,
                    subaccount_created_at, subaccount_updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (id) DO UPDATE
                SET subaccount_id = EXCLUDED.subaccount_id,
                    subaccount_status = EXCLUDED.subaccount_status,
                    subaccount_reserved = FALSE,
                    business_name = EXCLUDED.business_name,
                    settlement_bank = EXCLUDED.settlement_bank,
                    account_number = EXCLUDED.account_number,
                    bank_code = EXCLUDED.bank_code,
                    account_name = EXCLUDED.account_name,
                    bank_name = EXCLUDED.bank_name,
                    last_verified_at = EXCLUDED.last_verified_at,
                    subaccount_created_at = COALESCE(vendors.subaccount_created_at, EXCLUDED.subaccount_created_at),
                    subaccount_updated_at = EXCLUDED.subaccount_updated_at,
                    updated_at = now()
                ",
            )
            .bind(id.as_uuid())
            .bind(&subaccount.subaccount_id)
            .bind(subaccount.status.as_str())
            .bind(&subaccount.business_name)
            .bind(&subaccount.settlement_bank)
            .bind(&subaccount.bank_details.account_number)
            .bind(&subaccount.bank_details.bank_code)
            .bind(subaccount.bank_details.account_name.as_deref())
            .bind(subaccount.bank_details.bank_name.as_deref())
            .bind(subaccount.last_verified_at)
            .bind(subaccount.created_at)
            .bind(subaccount.updated_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            tracing::info!(
                vendor = %id,
                subaccount_id = %subaccount.subaccount_id,
                status = %subaccount.status,
                "Sub-account saved"
            );
            Ok(())
        })
    }

    fn set_commission_rate(&self, id: UserId, rate: Option<Percentage>) -> BoxFuture<'_, Result<VendorProfile>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                r"
                INSERT INTO vendors (id, commission_rate_bps) VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE
                SET commission_rate_bps = EXCLUDED.commission_rate_bps, updated_at = now()
                RETURNING {VENDOR_COLUMNS}
                "
            ))
            .bind(id.as_uuid())
            .bind(rate_to_bps(rate))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            vendor_from_row(&row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_bind_as_basis_points() {
        assert_eq!(rate_to_bps(None), None);
        assert_eq!(rate_to_bps(Percentage::from_bps(750).ok()), Some(750));
    }
}
