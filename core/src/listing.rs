//! Listing catalog port.
//!
//! Listings belong to the catalog service; bookings only need to know that a
//! listing exists in the requested vertical and who owns it.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::{Category, UserId};

/// What a booking needs to know about a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRef {
    /// Listing id
    pub listing_id: String,
    /// Vertical
    pub category: Category,
    /// Owner
    pub vendor: UserId,
}

/// Read access to the listing catalog
pub trait ListingDirectory: Send + Sync {
    /// Finds a listing in `category`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the catalog cannot be queried.
    fn find_listing<'a>(
        &'a self,
        category: Category,
        listing_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ListingRef>, StoreError>>;
}
