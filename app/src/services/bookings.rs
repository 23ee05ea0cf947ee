//! Booking lifecycle: creation, vendor decisions, overrides and reads.

use super::effects::run_effects;
use super::{Collaborators, page_size};
use crate::auth::SessionUser;
use marketplace_core::booking::{
    Booking, BookingAction, BookingEnvironment, BookingReducer, BookingState, Coupon, NewBooking, StatusChange,
};
use marketplace_core::details;
use marketplace_core::error::{MarketplaceError, Result, StoreError, ValidationError};
use marketplace_core::reducer::Reducer;
use marketplace_core::store::BookingFilter;
use marketplace_core::types::{BookingId, BookingStatus, Category, Money, Role};

/// Attempts at a guarded write before giving up on a busy booking
const MAX_ATTEMPTS: usize = 3;

/// Input for a new booking
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// Vertical name (`events`, `accommodations`, ...)
    pub booking_type: String,
    /// Listing id within the vertical
    pub listing_id: String,
    /// Vertical-specific details
    pub details: serde_json::Value,
    /// Amount to charge, after any discount
    pub total_amount: i64,
    /// Platform service fee included in the total
    pub service_fee: i64,
    /// Coupon applied by the client, if any
    pub coupon: Option<CouponInput>,
}

/// Coupon as submitted
#[derive(Clone, Debug, Default)]
pub struct CouponInput {
    /// Coupon code
    pub code: Option<String>,
    /// Discount already taken off the total
    pub discount: i64,
}

/// Query for listing bookings
#[derive(Clone, Debug, Default)]
pub struct BookingQuery {
    /// Only bookings in this status
    pub status: Option<BookingStatus>,
    /// Only bookings in this vertical
    pub category: Option<Category>,
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Booking operations
#[derive(Clone)]
pub struct BookingService {
    ports: Collaborators,
    env: BookingEnvironment,
}

impl BookingService {
    /// Creates the service
    #[must_use]
    pub fn new(ports: Collaborators) -> Self {
        let env = BookingEnvironment::new(ports.clock.clone(), ports.notifier.clone());
        Self { ports, env }
    }

    /// Creates a booking for the calling explorer.
    ///
    /// Accommodations start as `requested`, everything else as `pending`.
    ///
    /// # Errors
    ///
    /// - `UNSUPPORTED_TYPE` / `INVALID_DETAILS` for bad details
    /// - `VALIDATION_ERROR` for bad amounts or a listing in another vertical
    /// - `NOT_FOUND` for unknown listings
    #[tracing::instrument(skip_all, fields(user_id = %session.user_id, booking_type = %input.booking_type))]
    pub async fn create(&self, session: &SessionUser, input: CreateBooking) -> Result<Booking> {
        session.require(Role::Explorer)?;
        let details = details::validate(&input.booking_type, &input.details)?;
        let category = details.category();
        let (total_amount, service_fee, coupon) = amounts(&input)?;

        let listing_id = input.listing_id.trim();
        if listing_id.is_empty() {
            return Err(ValidationError::field("listingId", "must not be empty").into());
        }
        let Some(listing) = self.ports.listings.find_listing(category, listing_id).await? else {
            return Err(self.missing_listing(category, listing_id).await);
        };

        let new = NewBooking {
            explorer: session.user_id,
            vendor: listing.vendor,
            listing_id: listing.listing_id,
            details,
            total_amount,
            service_fee,
            coupon,
        };
        // Codes are random; retry the rare collision with a fresh one.
        for _ in 0..MAX_ATTEMPTS {
            let booking = Booking::create(new.clone(), self.ports.clock.now());
            match self.ports.bookings.insert_booking(booking.clone()).await {
                Ok(()) => {
                    tracing::info!(booking_id = %booking.id, code = %booking.code, status = %booking.status, "Booking created");
                    return Ok(booking);
                },
                Err(StoreError::Duplicate(what)) => {
                    tracing::debug!(duplicate = %what, "Booking code collision, regenerating");
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::Duplicate("booking code".to_string()).into())
    }

    /// `NOT_FOUND`, or `VALIDATION_ERROR` when the listing lives in another
    /// vertical
    async fn missing_listing(&self, category: Category, listing_id: &str) -> MarketplaceError {
        for other in Category::ALL.iter().copied().filter(|c| *c != category) {
            match self.ports.listings.find_listing(other, listing_id).await {
                Ok(Some(_)) => {
                    return ValidationError::field(
                        "listingId",
                        format!("listing belongs to {other}, not {category}"),
                    )
                    .into();
                },
                Ok(None) => {},
                Err(e) => return e.into(),
            }
        }
        MarketplaceError::not_found("listing", listing_id)
    }

    /// Loads a booking the caller may see.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `FORBIDDEN`.
    pub async fn get(&self, session: &SessionUser, id: BookingId) -> Result<Booking> {
        let booking = self.load(id).await?;
        if !booking.visible_to(session.user_id, session.role) {
            return Err(MarketplaceError::Forbidden("booking belongs to another user".to_string()));
        }
        Ok(booking)
    }

    /// Lists bookings scoped to the caller.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self, session: &SessionUser, query: BookingQuery) -> Result<Vec<Booking>> {
        let mut filter = BookingFilter {
            status: query.status,
            category: query.category,
            limit: page_size(query.limit),
            offset: query.offset.unwrap_or(0),
            ..BookingFilter::default()
        };
        match session.role {
            Role::Explorer => filter.explorer = Some(session.user_id),
            Role::Vendor => filter.vendor = Some(session.user_id),
            Role::Admin => {},
        }
        Ok(self.ports.bookings.list_bookings(filter).await?)
    }

    /// Override audit trail of a booking.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` or `FORBIDDEN`.
    pub async fn history(&self, session: &SessionUser, id: BookingId) -> Result<Vec<StatusChange>> {
        self.get(session, id).await?;
        Ok(self.ports.bookings.status_history(id).await?)
    }

    /// Vendor approves an accommodation request.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for other vendors, `ALREADY_PROCESSED` once decided,
    /// `INVALID_STATUS` for bookings that never needed approval.
    pub async fn approve(&self, session: &SessionUser, id: BookingId, message: Option<String>) -> Result<Booking> {
        session.require(Role::Vendor)?;
        self.apply(
            id,
            BookingAction::Approve {
                actor: session.user_id,
                message,
            },
        )
        .await
    }

    /// Vendor rejects an accommodation request, cancelling it.
    ///
    /// # Errors
    ///
    /// As for [`BookingService::approve`].
    pub async fn reject(&self, session: &SessionUser, id: BookingId, message: Option<String>) -> Result<Booking> {
        session.require(Role::Vendor)?;
        self.apply(
            id,
            BookingAction::Reject {
                actor: session.user_id,
                message,
            },
        )
        .await
    }

    /// Forces a booking status, leaving an audit record.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for explorers and other vendors, `VALIDATION_ERROR`
    /// without a reason.
    pub async fn override_status(
        &self,
        session: &SessionUser,
        id: BookingId,
        status: BookingStatus,
        reason: String,
    ) -> Result<Booking> {
        let booking = self
            .apply(
                id,
                BookingAction::OverrideStatus {
                    actor: session.user_id,
                    role: session.role,
                    status,
                    reason,
                },
            )
            .await?;
        tracing::warn!(booking_id = %id, status = %status, actor = %session.user_id, role = %session.role, "Booking status overridden");
        Ok(booking)
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.ports
            .bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("booking", id))
    }

    /// Reduces `action` against the stored booking and writes the result
    /// guarded on the version it was computed from. Effects run only after a
    /// successful write.
    async fn apply(&self, id: BookingId, action: BookingAction) -> Result<Booking> {
        for _ in 0..MAX_ATTEMPTS {
            let mut state = BookingState::new(self.load(id).await?);
            let effects = BookingReducer.reduce(&mut state, action.clone(), &self.env);
            if let Some(error) = state.last_error {
                return Err(error.into());
            }
            if self
                .ports
                .bookings
                .update_booking(state.booking.clone(), state.audit)
                .await?
            {
                run_effects(effects).await;
                return Ok(state.booking);
            }
            tracing::debug!(booking_id = %id, "Booking changed concurrently, retrying");
        }
        Err(MarketplaceError::AlreadyProcessed("booking is being changed concurrently".to_string()))
    }
}

fn amounts(input: &CreateBooking) -> std::result::Result<(Money, Money, Coupon), ValidationError> {
    if input.total_amount < 0 {
        return Err(ValidationError::field("totalAmount", "must not be negative"));
    }
    if input.service_fee < 0 {
        return Err(ValidationError::field("serviceFee", "must not be negative"));
    }
    let coupon = match &input.coupon {
        None => Coupon::default(),
        Some(c) => {
            if c.discount < 0 || c.discount > input.total_amount {
                return Err(ValidationError::field(
                    "coupon.discount",
                    "must be between zero and the total amount",
                ));
            }
            let code = c.code.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
            Coupon {
                applied: code.is_some() || c.discount > 0,
                code,
                discount: Money::from_minor(c.discount),
            }
        },
    };
    Ok((Money::from_minor(input.total_amount), Money::from_minor(input.service_fee), coupon))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::services::fixtures::{World, session};
    use marketplace_core::types::{ApprovalStatus, UserId};
    use serde_json::json;

    fn stay_input(listing_id: &str) -> CreateBooking {
        CreateBooking {
            booking_type: "accommodations".into(),
            listing_id: listing_id.into(),
            details: json!({"checkInDate": "2025-03-01", "checkOutDate": "2025-03-04", "guests": 2}),
            total_amount: 90_000,
            service_fee: 2_000,
            coupon: None,
        }
    }

    fn ticket_input(listing_id: &str) -> CreateBooking {
        CreateBooking {
            booking_type: "events".into(),
            listing_id: listing_id.into(),
            details: json!([{"ticketTypeId": "regular", "quantity": 3}]),
            total_amount: 15_000,
            service_fee: 500,
            coupon: Some(CouponInput {
                code: Some("WELCOME".into()),
                discount: 1_000,
            }),
        }
    }

    #[tokio::test]
    async fn creates_bookings_in_their_initial_status() {
        let world = World::new();
        let vendor = UserId::new();
        world.listings.add(Category::Accommodations, "villa-9", vendor);
        world.listings.add(Category::Events, "afro-nation", vendor);
        let service = BookingService::new(world.collaborators.clone());
        let explorer = session(Role::Explorer);

        let stay = service.create(&explorer, stay_input("villa-9")).await.unwrap();
        let event = service.create(&explorer, ticket_input("afro-nation")).await.unwrap();

        assert_eq!(stay.status, BookingStatus::Requested);
        assert!(stay.code.starts_with("ACC-"));
        assert_eq!(stay.vendor, vendor);
        assert_eq!(event.status, BookingStatus::Pending);
        assert!(event.coupon.applied);
        assert_eq!(event.coupon.discount, Money::from_minor(1_000));
        assert_eq!(world.store.booking(event.id).unwrap(), event);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let world = World::new();
        world.listings.add(Category::Events, "afro-nation", UserId::new());
        let service = BookingService::new(world.collaborators.clone());
        let explorer = session(Role::Explorer);

        let mut unsupported = ticket_input("afro-nation");
        unsupported.booking_type = "flights".into();
        assert_eq!(
            service.create(&explorer, unsupported).await.unwrap_err().code(),
            "UNSUPPORTED_TYPE"
        );

        let mut bad_details = ticket_input("afro-nation");
        bad_details.details = json!({"tickets": "two"});
        assert_eq!(
            service.create(&explorer, bad_details).await.unwrap_err().code(),
            "INVALID_DETAILS"
        );

        let mut negative = ticket_input("afro-nation");
        negative.total_amount = -1;
        assert_eq!(
            service.create(&explorer, negative).await.unwrap_err().code(),
            "VALIDATION_ERROR"
        );

        assert_eq!(
            service.create(&explorer, ticket_input("nowhere")).await.unwrap_err().code(),
            "NOT_FOUND"
        );
        assert_eq!(
            service
                .create(&session(Role::Vendor), ticket_input("afro-nation"))
                .await
                .unwrap_err()
                .code(),
            "FORBIDDEN"
        );
    }

    #[tokio::test]
    async fn listing_in_another_vertical_is_a_validation_error() {
        let world = World::new();
        world.listings.add(Category::Leisure, "boat-cruise", UserId::new());
        let service = BookingService::new(world.collaborators.clone());

        let error = service
            .create(&session(Role::Explorer), ticket_input("boat-cruise"))
            .await
            .unwrap_err();

        assert_eq!(error.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn vendor_approval_flow() {
        let world = World::new();
        let vendor = session(Role::Vendor);
        world.listings.add(Category::Accommodations, "villa-9", vendor.user_id);
        let service = BookingService::new(world.collaborators.clone());
        let stay = service
            .create(&session(Role::Explorer), stay_input("villa-9"))
            .await
            .unwrap();

        let stranger = service
            .approve(&session(Role::Vendor), stay.id, None)
            .await
            .unwrap_err();
        assert_eq!(stranger.code(), "FORBIDDEN");

        let approved = service
            .approve(&vendor, stay.id, Some("See you soon".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, BookingStatus::Pending);
        assert_eq!(
            approved.vendor_approval.as_ref().unwrap().status,
            ApprovalStatus::Approved
        );
        assert_eq!(world.notifier.sent_of_kind("booking_approved").len(), 1);

        let again = service.reject(&vendor, stay.id, None).await.unwrap_err();
        assert_eq!(again.code(), "ALREADY_PROCESSED");
        assert_eq!(world.store.booking(stay.id).unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn approval_is_only_for_requests() {
        let world = World::new();
        let vendor = session(Role::Vendor);
        world.listings.add(Category::Events, "afro-nation", vendor.user_id);
        let service = BookingService::new(world.collaborators.clone());
        let event = service
            .create(&session(Role::Explorer), ticket_input("afro-nation"))
            .await
            .unwrap();

        let error = service.approve(&vendor, event.id, None).await.unwrap_err();

        assert_eq!(error.code(), "INVALID_STATUS");
    }

    #[tokio::test]
    async fn overrides_are_audited() {
        let world = World::new();
        let vendor = session(Role::Vendor);
        world.listings.add(Category::Events, "afro-nation", vendor.user_id);
        let service = BookingService::new(world.collaborators.clone());
        let explorer = session(Role::Explorer);
        let event = service.create(&explorer, ticket_input("afro-nation")).await.unwrap();

        let no_reason = service
            .override_status(&vendor, event.id, BookingStatus::Cancelled, "  ".into())
            .await
            .unwrap_err();
        assert_eq!(no_reason.code(), "VALIDATION_ERROR");

        let by_explorer = service
            .override_status(&explorer, event.id, BookingStatus::Cancelled, "changed my mind".into())
            .await
            .unwrap_err();
        assert_eq!(by_explorer.code(), "FORBIDDEN");

        let admin = session(Role::Admin);
        let cancelled = service
            .override_status(&admin, event.id, BookingStatus::Cancelled, "venue closed".into())
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let history = service.history(&explorer, event.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, BookingStatus::Pending);
        assert_eq!(history[0].to, BookingStatus::Cancelled);
        assert_eq!(history[0].reason, "venue closed");
        assert_eq!(world.notifier.sent_of_kind("status_overridden").len(), 1);
    }

    #[tokio::test]
    async fn reads_are_scoped() {
        let world = World::new();
        let vendor = session(Role::Vendor);
        world.listings.add(Category::Events, "afro-nation", vendor.user_id);
        let service = BookingService::new(world.collaborators.clone());
        let explorer = session(Role::Explorer);
        let event = service.create(&explorer, ticket_input("afro-nation")).await.unwrap();

        assert_eq!(service.get(&vendor, event.id).await.unwrap().id, event.id);
        assert_eq!(
            service
                .get(&session(Role::Explorer), event.id)
                .await
                .unwrap_err()
                .code(),
            "FORBIDDEN"
        );
        assert_eq!(service.list(&explorer, BookingQuery::default()).await.unwrap().len(), 1);
        assert_eq!(service.list(&vendor, BookingQuery::default()).await.unwrap().len(), 1);
        assert!(
            service
                .list(&session(Role::Vendor), BookingQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
        let confirmed_only = BookingQuery {
            status: Some(BookingStatus::Confirmed),
            ..BookingQuery::default()
        };
        assert!(service.list(&explorer, confirmed_only).await.unwrap().is_empty());
    }
}
