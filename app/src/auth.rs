//! Session extraction.
//!
//! Authentication happens upstream: the identity provider terminates the
//! session and forwards the caller's identity in trusted headers.
//!
//! | Header | Meaning |
//! |---|---|
//! | `x-user-id` | User UUID (required) |
//! | `x-user-role` | `explorer`, `vendor` or `admin` (required) |
//! | `x-vendor-preference` | Vendor's primary vertical |
//! | `x-user-email` | Email, used as the payer email |
//! | `x-user-name` | Display name |
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn list_bookings(session: SessionUser) -> Result<Json<Vec<Booking>>, AppError> {
//!     session.require(Role::Vendor)?;
//!     ...
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use marketplace_core::error::MarketplaceError;
use marketplace_core::types::{Category, Role, UserId};
use marketplace_web::AppError;

/// Header carrying the user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Header carrying the vendor's vertical
pub const VENDOR_PREFERENCE_HEADER: &str = "x-vendor-preference";
/// Header carrying the email
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Header carrying the display name
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// User id
    pub user_id: UserId,
    /// Role
    pub role: Role,
    /// Vendor's primary vertical
    pub vendor_preference: Option<Category>,
    /// Email
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
}

impl SessionUser {
    /// Fails with `FORBIDDEN` unless the caller has `role`.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Forbidden`] for any other role.
    pub fn require(&self, role: Role) -> Result<(), MarketplaceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(MarketplaceError::Forbidden(format!("{role} role required")))
        }
    }

    /// Vendor scope for list queries: own records for vendors, everything
    /// for admins.
    ///
    /// # Errors
    ///
    /// [`MarketplaceError::Forbidden`] for explorers.
    pub fn vendor_scope(&self) -> Result<Option<UserId>, MarketplaceError> {
        match self.role {
            Role::Admin => Ok(None),
            Role::Vendor => Ok(Some(self.user_id)),
            Role::Explorer => Err(MarketplaceError::Forbidden(
                "vendor or admin role required".to_string(),
            )),
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing session"))?
            .parse::<UserId>()
            .map_err(|_| AppError::unauthorized("Invalid session user"))?;
        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing session role"))?
            .parse::<Role>()
            .map_err(|_| AppError::unauthorized("Invalid session role"))?;
        let vendor_preference = header(parts, VENDOR_PREFERENCE_HEADER).and_then(|v| v.parse().ok());

        Ok(Self {
            user_id,
            role,
            vendor_preference,
            email: header(parts, USER_EMAIL_HEADER).map(str::to_string),
            name: header(parts, USER_NAME_HEADER).map(str::to_string),
        })
    }
}
