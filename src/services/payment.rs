use chrono::Utc;
use rust_decimal::Decimal;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Payment, PaymentMethod, PaymentStatus};

const REFERENCE_CODE_ATTEMPTS: usize = 3;

fn generate_reference_code() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_uppercase()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Idempotent: return the booking's payment, creating it with the given
/// totals if it does not exist yet, or refreshing `total_amount` if it does.
pub fn ensure_payment(
    conn: &Connection,
    booking_id: &str,
    total_cost: Decimal,
    deposit_amount: Decimal,
) -> Result<Payment, AppError> {
    if let Some(existing) = queries::get_payment_for_booking(conn, booking_id)? {
        if existing.total_amount != total_cost {
            queries::update_payment_amount(conn, &existing.id, &total_cost)?;
            return Ok(Payment {
                total_amount: total_cost,
                ..existing
            });
        }
        return Ok(existing);
    }

    let now = Utc::now().naive_utc();
    let mut last_err = None;
    for _ in 0..REFERENCE_CODE_ATTEMPTS {
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.to_string(),
            method: PaymentMethod::Qris,
            status: PaymentStatus::Waiting,
            total_amount: total_cost,
            deposit_amount,
            reference_code: generate_reference_code(),
            created_at: now,
            updated_at: now,
        };

        match queries::insert_payment(conn, &payment) {
            Ok(()) => return Ok(payment),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!("payment reference code collision, retrying");
                last_err = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Conflict(format!(
        "could not allocate a unique payment reference code: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Push a freshly computed total into an existing payment. No-op when the
/// booking has no payment yet.
pub fn resync(
    conn: &Connection,
    booking_id: &str,
    total_cost: Decimal,
) -> Result<Option<Payment>, AppError> {
    match queries::get_payment_for_booking(conn, booking_id)? {
        Some(payment) => {
            queries::update_payment_amount(conn, &payment.id, &total_cost)?;
            Ok(Some(Payment {
                total_amount: total_cost,
                ..payment
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::db;
    use crate::models::{Actor, Booking, BookingStatus, Venue};

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();

        let user = Actor {
            id: "u1".to_string(),
            name: "member".to_string(),
            is_admin: false,
        };
        queries::insert_user(&conn, &user).unwrap();

        let now = Utc::now().naive_utc();
        let venue = Venue {
            id: "v1".to_string(),
            slug: "court-one".to_string(),
            name: "Court One".to_string(),
            category: "Futsal".to_string(),
            city: "Jakarta".to_string(),
            hourly_rate: Decimal::from_str("100000.00").unwrap(),
            capacity: 10,
            open_time: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            close_time: chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            created_at: now,
            updated_at: now,
        };
        queries::insert_venue(&conn, &venue).unwrap();

        let booking = Booking {
            id: "b1".to_string(),
            owner_id: "u1".to_string(),
            venue_id: "v1".to_string(),
            start_at: NaiveDateTime::parse_from_str("2024-06-01 09:00", "%Y-%m-%d %H:%M").unwrap(),
            end_at: NaiveDateTime::parse_from_str("2024-06-01 11:00", "%Y-%m-%d %H:%M").unwrap(),
            notes: None,
            status: BookingStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(&conn, &booking).unwrap();

        conn
    }

    #[test]
    fn test_ensure_payment_creates_once() {
        let conn = setup();
        let total = Decimal::from_str("200000.00").unwrap();
        let deposit = Decimal::from_str("10000").unwrap();

        let first = ensure_payment(&conn, "b1", total, deposit).unwrap();
        assert_eq!(first.status, PaymentStatus::Waiting);
        assert_eq!(first.total_amount, total);
        assert_eq!(first.reference_code.len(), 12);

        let second = ensure_payment(&conn, "b1", total, deposit).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.reference_code, first.reference_code);
    }

    #[test]
    fn test_ensure_payment_refreshes_stale_total() {
        let conn = setup();
        let deposit = Decimal::from_str("10000").unwrap();

        let first =
            ensure_payment(&conn, "b1", Decimal::from_str("200000.00").unwrap(), deposit).unwrap();

        let new_total = Decimal::from_str("250000.00").unwrap();
        let refreshed = ensure_payment(&conn, "b1", new_total, deposit).unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(refreshed.total_amount, new_total);

        let stored = queries::get_payment_for_booking(&conn, "b1").unwrap().unwrap();
        assert_eq!(stored.total_amount, new_total);
    }

    #[test]
    fn test_resync_without_payment_is_noop() {
        let conn = setup();
        let result = resync(&conn, "b1", Decimal::from_str("200000.00").unwrap()).unwrap();
        assert!(result.is_none());
        assert!(queries::get_payment_for_booking(&conn, "b1").unwrap().is_none());
    }

    #[test]
    fn test_resync_updates_existing_payment() {
        let conn = setup();
        let deposit = Decimal::from_str("10000").unwrap();
        ensure_payment(&conn, "b1", Decimal::from_str("200000.00").unwrap(), deposit).unwrap();

        let new_total = Decimal::from_str("321000.00").unwrap();
        let updated = resync(&conn, "b1", new_total).unwrap().unwrap();
        assert_eq!(updated.total_amount, new_total);

        let stored = queries::get_payment_for_booking(&conn, "b1").unwrap().unwrap();
        assert_eq!(stored.total_amount, new_total);
    }
}
