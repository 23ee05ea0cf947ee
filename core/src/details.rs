//! Booking details: one shape per vertical, validated at construction.
//!
//! [`validate`] is the only way to build a [`BookingDetails`] value. Both the
//! booking creation flow and the storage layer go through it, so business
//! logic never sees an untyped bag of fields.

use crate::error::ValidationError;
use crate::types::Category;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};

/// One ticket type and how many of it were bought
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketLine {
    /// Ticket type identifier from the listing
    pub ticket_type_id: String,
    /// Number of tickets, always positive
    pub quantity: u32,
}

/// Stay window for an accommodation booking
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StayDetails {
    /// Arrival; strictly before `check_out`
    pub check_in: DateTime<Utc>,
    /// Departure
    pub check_out: DateTime<Utc>,
    /// Number of guests, always positive
    pub guests: u32,
    /// Optional room type label
    pub room_type: Option<String>,
}

/// Validated, vertical-specific booking details
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingDetails {
    /// Ticketed event
    Event {
        /// Tickets bought
        tickets: Vec<TicketLine>,
    },
    /// Stay at an accommodation
    Accommodation(StayDetails),
    /// Leisure activity
    Leisure {
        /// Tickets bought
        tickets: Vec<TicketLine>,
    },
    /// Cinema showing
    Movie {
        /// Showtime identifier
        showtime: String,
        /// Tickets bought
        tickets: Vec<TicketLine>,
    },
}

impl BookingDetails {
    /// Vertical these details belong to
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Event { .. } => Category::Events,
            Self::Accommodation(_) => Category::Accommodations,
            Self::Leisure { .. } => Category::Leisure,
            Self::Movie { .. } => Category::MoviesAndCinema,
        }
    }

    /// Client-facing JSON shape, the same shape [`validate`] accepts
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Event { tickets } | Self::Leisure { tickets } => tickets_value(tickets),
            Self::Accommodation(stay) => {
                let mut map = Map::new();
                map.insert("checkInDate".into(), json!(stay.check_in.to_rfc3339()));
                map.insert("checkOutDate".into(), json!(stay.check_out.to_rfc3339()));
                map.insert("guests".into(), json!(stay.guests));
                if let Some(room_type) = &stay.room_type {
                    map.insert("roomType".into(), json!(room_type));
                }
                Value::Object(map)
            },
            Self::Movie { showtime, tickets } => json!({
                "showtime": showtime,
                "tickets": tickets_value(tickets),
            }),
        }
    }
}

impl Serialize for BookingDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn tickets_value(tickets: &[TicketLine]) -> Value {
    Value::Array(
        tickets
            .iter()
            .map(|t| json!({ "ticketTypeId": t.ticket_type_id, "quantity": t.quantity }))
            .collect(),
    )
}

/// One ticket line as clients send it
#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawTicket {
    ticket_type_id: String,
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawStay {
    check_in_date: String,
    check_out_date: String,
    guests: u32,
    #[serde(default)]
    room_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMovie {
    showtime: String,
    tickets: Vec<RawTicket>,
}

/// Validates raw details against the schema of `booking_type`.
///
/// The raw value is first deserialized into the vertical's wire shape, then
/// checked for the rules serde cannot express (non-empty strings, positive
/// counts, date order).
///
/// # Errors
///
/// - `UNSUPPORTED_TYPE` when `booking_type` is not a known vertical
/// - `INVALID_DETAILS` when `raw` does not match the vertical's schema
pub fn validate(booking_type: &str, raw: &Value) -> Result<BookingDetails, ValidationError> {
    let category: Category = booking_type
        .parse()
        .map_err(|_| ValidationError::UnsupportedType(booking_type.to_string()))?;

    match category {
        Category::Events => Ok(BookingDetails::Event {
            tickets: ticket_list(shape(raw, "details")?, "details")?,
        }),
        Category::Leisure => Ok(BookingDetails::Leisure {
            tickets: ticket_list(shape(raw, "details")?, "details")?,
        }),
        Category::Accommodations => stay(shape(raw, "details")?).map(BookingDetails::Accommodation),
        Category::MoviesAndCinema => {
            let movie: RawMovie = shape(raw, "details")?;
            Ok(BookingDetails::Movie {
                showtime: non_empty(movie.showtime, "showtime")?,
                tickets: ticket_list(movie.tickets, "tickets")?,
            })
        },
    }
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidDetails(reason.into())
}

fn shape<'a, T: Deserialize<'a>>(raw: &'a Value, what: &str) -> Result<T, ValidationError> {
    T::deserialize(raw).map_err(|e| invalid(format!("{what}: {e}")))
}

fn non_empty(value: String, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{field} must be a non-empty string")));
    }
    Ok(trimmed.to_string())
}

fn positive(value: u32, field: &str) -> Result<u32, ValidationError> {
    if value == 0 {
        return Err(invalid(format!("{field} must be a positive integer")));
    }
    Ok(value)
}

fn ticket_list(raw: Vec<RawTicket>, what: &str) -> Result<Vec<TicketLine>, ValidationError> {
    if raw.is_empty() {
        return Err(invalid(format!("{what} must contain at least one ticket")));
    }
    raw.into_iter()
        .map(|ticket| {
            Ok(TicketLine {
                ticket_type_id: non_empty(ticket.ticket_type_id, "ticketTypeId")?,
                quantity: positive(ticket.quantity, "quantity")?,
            })
        })
        .collect()
}

fn stay(raw: RawStay) -> Result<StayDetails, ValidationError> {
    let check_in = date(&raw.check_in_date, "checkInDate")?;
    let check_out = date(&raw.check_out_date, "checkOutDate")?;
    if check_in >= check_out {
        return Err(invalid("checkInDate must be before checkOutDate"));
    }
    Ok(StayDetails {
        check_in,
        check_out,
        guests: positive(raw.guests, "guests")?,
        room_type: raw.room_type.map(|r| non_empty(r, "roomType")).transpose()?,
    })
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn date(text: &str, field: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| invalid(format!("{field} '{text}' is not a valid date")))
}
