//! Schema, applied in order by [`PostgresStore::migrate`](crate::PostgresStore::migrate).

/// DDL statements; every statement is idempotent.
pub const MIGRATIONS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS configurations (
        id UUID PRIMARY KEY,
        version BIGINT NOT NULL UNIQUE,
        commission_rates JSONB NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT FALSE,
        updated_by UUID,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS configurations_single_active
        ON configurations (is_active) WHERE is_active
    ",
    r"
    CREATE TABLE IF NOT EXISTS listings (
        category TEXT NOT NULL,
        id TEXT NOT NULL,
        vendor_id UUID NOT NULL,
        PRIMARY KEY (category, id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS bookings (
        id UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        explorer_id UUID NOT NULL,
        vendor_id UUID NOT NULL,
        category TEXT NOT NULL,
        listing_id TEXT NOT NULL,
        details JSONB NOT NULL,
        total_amount BIGINT NOT NULL CHECK (total_amount >= 0),
        service_fee BIGINT NOT NULL CHECK (service_fee >= 0),
        coupon JSONB NOT NULL,
        status TEXT NOT NULL,
        payment_id UUID,
        payment_status TEXT NOT NULL,
        payment_reference TEXT,
        vendor_approval JSONB,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        version BIGINT NOT NULL DEFAULT 0
    )
    ",
    "CREATE INDEX IF NOT EXISTS bookings_explorer ON bookings (explorer_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS bookings_vendor ON bookings (vendor_id, created_at DESC)",
    r"
    CREATE TABLE IF NOT EXISTS booking_audit (
        id BIGSERIAL PRIMARY KEY,
        booking_id UUID NOT NULL REFERENCES bookings (id),
        from_status TEXT NOT NULL,
        to_status TEXT NOT NULL,
        actor_id UUID NOT NULL,
        actor_role TEXT NOT NULL,
        reason TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        booking_id UUID NOT NULL REFERENCES bookings (id),
        vendor_id UUID NOT NULL,
        explorer_id UUID NOT NULL,
        reference TEXT NOT NULL UNIQUE,
        amount BIGINT NOT NULL,
        currency TEXT NOT NULL,
        status TEXT NOT NULL,
        payment_method TEXT,
        customer_email TEXT NOT NULL,
        customer_name TEXT,
        metadata JSONB NOT NULL,
        paid_at TIMESTAMPTZ,
        settlement_id TEXT,
        settlement_status TEXT NOT NULL DEFAULT 'pending',
        vendor_amount BIGINT NOT NULL DEFAULT 0,
        platform_amount BIGINT NOT NULL DEFAULT 0,
        gateway_fees BIGINT NOT NULL DEFAULT 0,
        gateway_response TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS payments_booking ON payments (booking_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS payments_single_success ON payments (booking_id) WHERE status = 'success'",
    "CREATE INDEX IF NOT EXISTS payments_vendor_pending ON payments (vendor_id) WHERE status = 'success' AND settlement_status = 'pending'",
    r"
    CREATE TABLE IF NOT EXISTS vendors (
        id UUID PRIMARY KEY,
        vendor_account_preference TEXT,
        commission_rate_bps INTEGER CHECK (commission_rate_bps BETWEEN 0 AND 10000),
        subaccount_id TEXT UNIQUE,
        subaccount_status TEXT,
        subaccount_reserved BOOLEAN NOT NULL DEFAULT FALSE,
        business_name TEXT,
        settlement_bank TEXT,
        account_number TEXT,
        bank_code TEXT,
        account_name TEXT,
        bank_name TEXT,
        last_verified_at TIMESTAMPTZ,
        subaccount_created_at TIMESTAMPTZ,
        subaccount_updated_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS settlements (
        settlement_id TEXT PRIMARY KEY,
        vendor_id UUID,
        subaccount_id TEXT,
        total_amount BIGINT NOT NULL,
        currency TEXT NOT NULL,
        status TEXT NOT NULL,
        settled_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS settlement_payments (
        settlement_id TEXT NOT NULL REFERENCES settlements (settlement_id),
        reference TEXT NOT NULL,
        PRIMARY KEY (settlement_id, reference)
    )
    ",
];
