use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus};
use crate::services::pricing;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn iso(dt: &NaiveDateTime) -> String {
    dt.format(ISO_FORMAT).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub total_amount: Decimal,
    pub reference_code: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Payment> for PaymentSummary {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            method: p.method,
            status: p.status,
            total_amount: p.total_amount,
            reference_code: p.reference_code,
            created_at: iso(&p.created_at),
            updated_at: iso(&p.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub id: String,
    pub venue: VenueSummary,
    pub start_at: String,
    pub end_at: String,
    pub status: BookingStatus,
    pub total_cost: Decimal,
    pub addons_total: Decimal,
    pub payment: Option<PaymentSummary>,
}

fn summarize(conn: &Connection, booking: Booking) -> Result<BookingSummary, AppError> {
    let venue = queries::get_venue(conn, &booking.venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {}", booking.venue_id)))?;
    let addons = queries::get_booking_addons(conn, &booking.id)?;
    let costs = pricing::cost_breakdown(&venue, &booking, &addons);
    let payment = queries::get_payment_for_booking(conn, &booking.id)?.map(PaymentSummary::from);

    Ok(BookingSummary {
        id: booking.id,
        venue: VenueSummary {
            id: venue.id,
            name: venue.name,
        },
        start_at: iso(&booking.start_at),
        end_at: iso(&booking.end_at),
        status: booking.status,
        total_cost: costs.total_cost,
        addons_total: costs.addons_total,
        payment,
    })
}

/// A user's own bookings, most recent start first.
pub fn list_for_owner(
    conn: &Connection,
    owner_id: &str,
    statuses: &[BookingStatus],
) -> Result<Vec<BookingSummary>, AppError> {
    let bookings = queries::list_bookings_for_owner(conn, owner_id, statuses)?;
    bookings
        .into_iter()
        .map(|b| summarize(conn, b))
        .collect()
}

/// The global admin view, earliest start first so pending requests surface
/// in approval order.
pub fn list_all(
    conn: &Connection,
    statuses: &[BookingStatus],
) -> Result<Vec<BookingSummary>, AppError> {
    let bookings = queries::list_all_bookings(conn, statuses)?;
    bookings
        .into_iter()
        .map(|b| summarize(conn, b))
        .collect()
}
