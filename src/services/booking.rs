use std::collections::BTreeSet;

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::{AppError, FieldError};
use crate::models::{Actor, AddOn, Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, Venue};
use crate::services::{payment, pricing};

/// Typed input for booking creation. Handlers parse and validate raw request
/// fields into this before the engine runs.
#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub venue_id: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub addon_ids: Vec<String>,
    pub notes: Option<String>,
}

fn validate_time_range(start: &NaiveDateTime, end: &NaiveDateTime) -> Vec<FieldError> {
    let mut fields = vec![];
    if end <= start {
        fields.push(FieldError::new(
            "end_at",
            "end must be after start".to_string(),
        ));
    }
    fields
}

/// Deduplicate the requested add-on set and check every id refers to an
/// add-on of the booked venue. Returns the ids alongside the loaded rows.
fn validate_addon_set(
    conn: &Connection,
    venue: &Venue,
    addon_ids: &[String],
) -> Result<(Vec<String>, Vec<AddOn>), AppError> {
    let unique: BTreeSet<&String> = addon_ids.iter().collect();

    let mut ids = Vec::with_capacity(unique.len());
    let mut addons = Vec::with_capacity(unique.len());
    for id in unique {
        let addon = queries::get_addon(conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("add-on {id}")))?;
        if addon.venue_id != venue.id {
            return Err(AppError::invalid(
                "addon_ids",
                format!("add-on {id} does not belong to venue {}", venue.id),
            ));
        }
        ids.push(addon.id.clone());
        addons.push(addon);
    }
    Ok((ids, addons))
}

pub fn create_booking(
    conn: &mut Connection,
    config: &AppConfig,
    actor: &Actor,
    input: CreateBookingInput,
) -> Result<Booking, AppError> {
    let fields = validate_time_range(&input.start_at, &input.end_at);
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }
    if actor.is_admin {
        return Err(AppError::Forbidden(
            "administrators cannot create bookings".to_string(),
        ));
    }

    let tx = conn.transaction()?;

    let venue = queries::get_venue(&tx, &input.venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {}", input.venue_id)))?;
    let (addon_ids, addons) = validate_addon_set(&tx, &venue, &input.addon_ids)?;

    if config.reject_overlaps {
        let overlapping =
            queries::count_overlapping_bookings(&tx, &venue.id, &input.start_at, &input.end_at)?;
        if overlapping > 0 {
            return Err(AppError::Conflict(
                "the requested time range overlaps an existing booking".to_string(),
            ));
        }
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        owner_id: actor.id.clone(),
        venue_id: venue.id.clone(),
        start_at: input.start_at,
        end_at: input.end_at,
        notes: input.notes,
        status: BookingStatus::Pending,
        approved_by: None,
        approved_at: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;
    queries::set_booking_addons(&tx, &booking.id, &addon_ids)?;

    let costs = pricing::cost_breakdown(&venue, &booking, &addons);
    payment::ensure_payment(&tx, &booking.id, costs.total_cost, config.deposit_amount)?;

    tx.commit()?;

    tracing::info!(booking_id = %booking.id, venue_id = %venue.id, "booking created");
    Ok(booking)
}

pub fn approve_booking(
    conn: &mut Connection,
    config: &AppConfig,
    actor: &Actor,
    booking_id: &str,
) -> Result<Booking, AppError> {
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can approve bookings".to_string(),
        ));
    }

    let tx = conn.transaction()?;

    let mut booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.status != BookingStatus::Pending {
        return Err(AppError::InvalidState {
            action: "approve",
            current: booking.status,
        });
    }

    booking.status = BookingStatus::Active;
    booking.approved_by = Some(actor.id.clone());
    booking.approved_at = Some(Utc::now().naive_utc());
    queries::update_booking_state(&tx, &booking)?;

    // Totals are refreshed with live prices on every approval.
    let costs = recompute_costs(&tx, &booking)?;
    payment::ensure_payment(&tx, &booking.id, costs.total_cost, config.deposit_amount)?;

    tx.commit()?;

    tracing::info!(booking_id = %booking.id, approved_by = %actor.id, "booking approved");
    Ok(booking)
}

pub fn cancel_booking(
    conn: &mut Connection,
    config: &AppConfig,
    actor: &Actor,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;

    let mut booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.owner_id != actor.id && !actor.is_admin {
        return Err(AppError::Forbidden(
            "only the booking owner or an administrator can cancel".to_string(),
        ));
    }
    if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Active) {
        return Err(AppError::InvalidState {
            action: "cancel",
            current: booking.status,
        });
    }

    booking.status = BookingStatus::Cancelled;
    booking.approved_by = None;
    booking.approved_at = None;
    queries::update_booking_state(&tx, &booking)?;

    // The payment is kept (audit trail) and reset to waiting.
    let costs = recompute_costs(&tx, &booking)?;
    let ledger =
        payment::ensure_payment(&tx, &booking.id, costs.total_cost, config.deposit_amount)?;
    queries::update_payment_status(&tx, &ledger.id, PaymentStatus::Waiting, None)?;

    tx.commit()?;

    tracing::info!(booking_id = %booking.id, "booking cancelled");
    Ok(booking)
}

pub fn confirm_payment(
    conn: &mut Connection,
    config: &AppConfig,
    actor: &Actor,
    booking_id: &str,
    method: PaymentMethod,
) -> Result<(Booking, Payment), AppError> {
    let tx = conn.transaction()?;

    let mut booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.owner_id != actor.id {
        return Err(AppError::Forbidden(
            "only the booking owner can pay".to_string(),
        ));
    }
    // Pending means approval has not happened yet; terminal means the booking
    // is no longer payable. Both surface the current status to the caller.
    if booking.status != BookingStatus::Active {
        return Err(AppError::InvalidState {
            action: "pay for",
            current: booking.status,
        });
    }

    let costs = recompute_costs(&tx, &booking)?;
    let ledger =
        payment::ensure_payment(&tx, &booking.id, costs.total_cost, config.deposit_amount)?;
    queries::update_payment_status(&tx, &ledger.id, PaymentStatus::Confirmed, Some(method))?;

    booking.status = BookingStatus::Confirmed;
    queries::update_booking_state(&tx, &booking)?;

    let ledger = Payment {
        status: PaymentStatus::Confirmed,
        method,
        ..ledger
    };

    tx.commit()?;

    tracing::info!(booking_id = %booking.id, reference = %ledger.reference_code, "payment confirmed");
    Ok((booking, ledger))
}

pub fn set_addons(
    conn: &mut Connection,
    config: &AppConfig,
    actor: &Actor,
    booking_id: &str,
    addon_ids: &[String],
) -> Result<(Booking, pricing::CostBreakdown), AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.owner_id != actor.id && !actor.is_admin {
        return Err(AppError::Forbidden(
            "only the booking owner or an administrator can change add-ons".to_string(),
        ));
    }
    if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Active) {
        return Err(AppError::InvalidState {
            action: "change add-ons on",
            current: booking.status,
        });
    }

    let venue = queries::get_venue(&tx, &booking.venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {}", booking.venue_id)))?;
    let (ids, addons) = validate_addon_set(&tx, &venue, addon_ids)?;
    queries::set_booking_addons(&tx, &booking.id, &ids)?;

    let costs = pricing::cost_breakdown(&venue, &booking, &addons);
    payment::resync(&tx, &booking.id, costs.total_cost)?;

    tx.commit()?;
    Ok((booking, costs))
}

pub fn complete_booking(
    conn: &mut Connection,
    actor: &Actor,
    booking_id: &str,
) -> Result<Booking, AppError> {
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can complete bookings".to_string(),
        ));
    }

    let tx = conn.transaction()?;

    let mut booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.status != BookingStatus::Confirmed {
        return Err(AppError::InvalidState {
            action: "complete",
            current: booking.status,
        });
    }

    booking.status = BookingStatus::Completed;
    queries::update_booking_state(&tx, &booking)?;

    tx.commit()?;
    Ok(booking)
}

fn recompute_costs(
    conn: &Connection,
    booking: &Booking,
) -> Result<pricing::CostBreakdown, AppError> {
    let venue = queries::get_venue(conn, &booking.venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {}", booking.venue_id)))?;
    let addons = queries::get_booking_addons(conn, &booking.id)?;
    Ok(pricing::cost_breakdown(&venue, booking, &addons))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::db;

    fn test_config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            deposit_amount: Decimal::from_str("10000").unwrap(),
            reject_overlaps: false,
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn member(id: &str) -> Actor {
        Actor {
            id: id.to_string(),
            name: id.to_string(),
            is_admin: false,
        }
    }

    fn admin(id: &str) -> Actor {
        Actor {
            id: id.to_string(),
            name: id.to_string(),
            is_admin: true,
        }
    }

    fn seed(conn: &Connection) {
        for user in [member("member-1"), member("member-2"), admin("admin-1")] {
            queries::insert_user(conn, &user).unwrap();
        }

        let now = Utc::now().naive_utc();
        let venue = Venue {
            id: "v1".to_string(),
            slug: "skyline-arena".to_string(),
            name: "Skyline Arena".to_string(),
            category: "Futsal".to_string(),
            city: "Jakarta".to_string(),
            hourly_rate: Decimal::from_str("150000.00").unwrap(),
            capacity: 10,
            open_time: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            close_time: chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            created_at: now,
            updated_at: now,
        };
        queries::insert_venue(conn, &venue).unwrap();

        let racket = AddOn {
            id: "addon-racket".to_string(),
            venue_id: "v1".to_string(),
            name: "Racket".to_string(),
            description: None,
            price: Decimal::from_str("25000.00").unwrap(),
            created_at: now,
        };
        let balls = AddOn {
            id: "addon-balls".to_string(),
            venue_id: "v1".to_string(),
            name: "Balls".to_string(),
            description: None,
            price: Decimal::from_str("15000.00").unwrap(),
            created_at: now,
        };
        queries::insert_addon(conn, &racket).unwrap();
        queries::insert_addon(conn, &balls).unwrap();
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        seed(&conn);
        conn
    }

    fn three_hour_input() -> CreateBookingInput {
        CreateBookingInput {
            venue_id: "v1".to_string(),
            start_at: dt("2024-06-01 09:00"),
            end_at: dt("2024-06-01 12:00"),
            addon_ids: vec!["addon-racket".to_string()],
            notes: None,
        }
    }

    #[test]
    fn test_create_sets_pending_and_payment_in_lockstep() {
        let mut conn = setup();
        let booking =
            create_booking(&mut conn, &test_config(), &member("member-1"), three_hour_input())
                .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);

        // 3h x 150000 + 25000 racket
        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.status, PaymentStatus::Waiting);
        assert_eq!(ledger.total_amount, Decimal::from_str("475000.00").unwrap());
        assert_eq!(ledger.deposit_amount, Decimal::from_str("10000").unwrap());
        assert_eq!(ledger.reference_code.len(), 12);
    }

    #[test]
    fn test_create_rejects_inverted_range_without_rows() {
        let mut conn = setup();
        let input = CreateBookingInput {
            start_at: dt("2024-06-01 12:00"),
            end_at: dt("2024-06-01 12:00"),
            ..three_hour_input()
        };
        let err = create_booking(&mut conn, &test_config(), &member("member-1"), input)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let payments: i64 = conn
            .query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(payments, 0);
    }

    #[test]
    fn test_create_rejects_admin_actor() {
        let mut conn = setup();
        let err = create_booking(&mut conn, &test_config(), &admin("admin-1"), three_hour_input())
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_create_rejects_unknown_venue_and_addon() {
        let mut conn = setup();

        let input = CreateBookingInput {
            venue_id: "missing".to_string(),
            ..three_hour_input()
        };
        let err =
            create_booking(&mut conn, &test_config(), &member("member-1"), input).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let input = CreateBookingInput {
            addon_ids: vec!["missing-addon".to_string()],
            ..three_hour_input()
        };
        let err =
            create_booking(&mut conn, &test_config(), &member("member-1"), input).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_create_dedupes_addon_set() {
        let mut conn = setup();
        let input = CreateBookingInput {
            addon_ids: vec!["addon-racket".to_string(), "addon-racket".to_string()],
            ..three_hour_input()
        };
        let booking =
            create_booking(&mut conn, &test_config(), &member("member-1"), input).unwrap();

        let addons = queries::get_booking_addons(&conn, &booking.id).unwrap();
        assert_eq!(addons.len(), 1);

        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.total_amount, Decimal::from_str("475000.00").unwrap());
    }

    #[test]
    fn test_overlap_guard_disabled_by_default() {
        let mut conn = setup();
        let config = test_config();
        create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        // Same venue, same range: accepted while the guard is off.
        create_booking(&mut conn, &config, &member("member-2"), three_hour_input()).unwrap();
    }

    #[test]
    fn test_overlap_guard_rejects_when_enabled() {
        let mut conn = setup();
        let config = AppConfig {
            reject_overlaps: true,
            ..test_config()
        };
        create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let overlapping = CreateBookingInput {
            start_at: dt("2024-06-01 11:00"),
            end_at: dt("2024-06-01 13:00"),
            addon_ids: vec![],
            ..three_hour_input()
        };
        let err =
            create_booking(&mut conn, &config, &member("member-2"), overlapping).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // An adjacent range starting exactly at the previous end is fine.
        let adjacent = CreateBookingInput {
            start_at: dt("2024-06-01 12:00"),
            end_at: dt("2024-06-01 14:00"),
            addon_ids: vec![],
            ..three_hour_input()
        };
        create_booking(&mut conn, &config, &member("member-2"), adjacent).unwrap();
    }

    #[test]
    fn test_approve_transitions_and_stamps_metadata() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let approved = approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();
        assert_eq!(approved.status, BookingStatus::Active);
        assert_eq!(approved.approved_by.as_deref(), Some("admin-1"));
        assert!(approved.approved_at.is_some());

        // Payment stays waiting until the owner confirms.
        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.status, PaymentStatus::Waiting);
    }

    #[test]
    fn test_approve_twice_fails() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();
        let err =
            approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidState {
                current: BookingStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn test_approve_requires_admin() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let err =
            approve_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_confirm_payment_requires_approval_first() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let err = confirm_payment(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            PaymentMethod::Qris,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidState {
                current: BookingStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_full_happy_path() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();
        let (confirmed, ledger) = confirm_payment(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            PaymentMethod::Gopay,
        )
        .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(ledger.status, PaymentStatus::Confirmed);
        assert_eq!(ledger.method, PaymentMethod::Gopay);

        let completed = complete_booking(&mut conn, &admin("admin-1"), &booking.id).unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
    }

    #[test]
    fn test_cancel_resets_payment_and_approval() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();

        let cancelled =
            cancel_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.approved_by.is_none());
        assert!(cancelled.approved_at.is_none());

        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.status, PaymentStatus::Waiting);
    }

    #[test]
    fn test_cancel_active_booking_resets_confirmed_payment() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();

        // Payment flipped to confirmed out of band; cancel still resets it.
        conn.execute(
            "UPDATE payments SET status = 'confirmed' WHERE booking_id = ?1",
            rusqlite::params![booking.id],
        )
        .unwrap();

        cancel_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap();

        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.status, PaymentStatus::Waiting);
    }

    #[test]
    fn test_cancel_then_pay_fails() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        cancel_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap();

        let err = confirm_payment(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            PaymentMethod::Qris,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidState {
                current: BookingStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_cancel_completed_booking_fails() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        approve_booking(&mut conn, &config, &admin("admin-1"), &booking.id).unwrap();
        confirm_payment(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            PaymentMethod::Qris,
        )
        .unwrap();
        complete_booking(&mut conn, &admin("admin-1"), &booking.id).unwrap();

        let err =
            cancel_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap_err();
        assert!(matches!(err, AppError::InvalidState { .. }));
    }

    #[test]
    fn test_cancel_by_other_member_forbidden() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let err =
            cancel_booking(&mut conn, &config, &member("member-2"), &booking.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_set_addons_resyncs_payment() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let (_, costs) = set_addons(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            &["addon-racket".to_string(), "addon-balls".to_string()],
        )
        .unwrap();
        assert_eq!(costs.addons_total, Decimal::from_str("40000.00").unwrap());
        assert_eq!(costs.total_cost, Decimal::from_str("490000.00").unwrap());

        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.total_amount, Decimal::from_str("490000.00").unwrap());

        // Clearing the set drops the total back to the base cost.
        let (_, costs) =
            set_addons(&mut conn, &config, &member("member-1"), &booking.id, &[]).unwrap();
        assert_eq!(costs.total_cost, Decimal::from_str("450000.00").unwrap());
    }

    #[test]
    fn test_set_addons_rejects_foreign_venue_addon() {
        let mut conn = setup();
        let config = test_config();

        let now = Utc::now().naive_utc();
        let other = Venue {
            id: "v2".to_string(),
            slug: "other-court".to_string(),
            name: "Other Court".to_string(),
            category: "Padel".to_string(),
            city: "Bandung".to_string(),
            hourly_rate: Decimal::from_str("90000.00").unwrap(),
            capacity: 4,
            open_time: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            close_time: chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            created_at: now,
            updated_at: now,
        };
        queries::insert_venue(&conn, &other).unwrap();
        let foreign = AddOn {
            id: "addon-foreign".to_string(),
            venue_id: "v2".to_string(),
            name: "Towel".to_string(),
            description: None,
            price: Decimal::from_str("5000.00").unwrap(),
            created_at: now,
        };
        queries::insert_addon(&conn, &foreign).unwrap();

        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        let err = set_addons(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            &["addon-foreign".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_live_repricing_uses_current_addon_prices() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        // Catalog repricing after creation: the next resync picks it up.
        conn.execute(
            "UPDATE addons SET price = '30000.00' WHERE id = 'addon-racket'",
            [],
        )
        .unwrap();

        let (_, costs) = set_addons(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            &["addon-racket".to_string()],
        )
        .unwrap();
        assert_eq!(costs.total_cost, Decimal::from_str("480000.00").unwrap());

        let ledger = queries::get_payment_for_booking(&conn, &booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.total_amount, Decimal::from_str("480000.00").unwrap());
    }

    #[test]
    fn test_set_addons_on_terminal_booking_fails() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();
        cancel_booking(&mut conn, &config, &member("member-1"), &booking.id).unwrap();

        let err = set_addons(
            &mut conn,
            &config,
            &member("member-1"),
            &booking.id,
            &["addon-balls".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidState { .. }));
    }

    #[test]
    fn test_complete_requires_confirmed() {
        let mut conn = setup();
        let config = test_config();
        let booking =
            create_booking(&mut conn, &config, &member("member-1"), three_hour_input()).unwrap();

        let err = complete_booking(&mut conn, &admin("admin-1"), &booking.id).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidState {
                current: BookingStatus::Pending,
                ..
            }
        ));
    }
}
