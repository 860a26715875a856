use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rusqlite::{params, Connection};

use crate::models::{
    Actor, AddOn, Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus, Review, Venue,
};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

fn format_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, TIME_FORMAT).unwrap_or_default()
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

// ── Users ──

pub fn insert_user(conn: &Connection, user: &Actor) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, is_admin) VALUES (?1, ?2, ?3)",
        params![user.id, user.name, user.is_admin as i32],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<Actor>> {
    let result = conn.query_row(
        "SELECT id, name, is_admin FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(Actor {
                id: row.get(0)?,
                name: row.get(1)?,
                is_admin: row.get::<_, i32>(2)? != 0,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

// ── Venues ──

fn parse_venue_row(row: &rusqlite::Row) -> rusqlite::Result<Venue> {
    Ok(Venue {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        city: row.get(4)?,
        hourly_rate: parse_decimal(&row.get::<_, String>(5)?),
        capacity: row.get(6)?,
        open_time: parse_time(&row.get::<_, String>(7)?),
        close_time: parse_time(&row.get::<_, String>(8)?),
        created_at: parse_dt(&row.get::<_, String>(9)?),
        updated_at: parse_dt(&row.get::<_, String>(10)?),
    })
}

const VENUE_COLUMNS: &str =
    "id, slug, name, category, city, hourly_rate, capacity, open_time, close_time, created_at, updated_at";

pub fn insert_venue(conn: &Connection, venue: &Venue) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO venues (id, slug, name, category, city, hourly_rate, capacity, open_time, close_time, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            venue.id,
            venue.slug,
            venue.name,
            venue.category,
            venue.city,
            venue.hourly_rate.to_string(),
            venue.capacity,
            venue.open_time.format(TIME_FORMAT).to_string(),
            venue.close_time.format(TIME_FORMAT).to_string(),
            format_dt(&venue.created_at),
            format_dt(&venue.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_venue(conn: &Connection, venue: &Venue) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE venues SET name = ?1, category = ?2, city = ?3, hourly_rate = ?4, capacity = ?5,
                open_time = ?6, close_time = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            venue.name,
            venue.category,
            venue.city,
            venue.hourly_rate.to_string(),
            venue.capacity,
            venue.open_time.format(TIME_FORMAT).to_string(),
            venue.close_time.format(TIME_FORMAT).to_string(),
            format_dt(&Utc::now().naive_utc()),
            venue.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_venue(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute("DELETE FROM venues WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_venue(conn: &Connection, id: &str) -> rusqlite::Result<Option<Venue>> {
    let result = conn.query_row(
        &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = ?1"),
        params![id],
        parse_venue_row,
    );

    match result {
        Ok(venue) => Ok(Some(venue)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_venues(conn: &Connection) -> rusqlite::Result<Vec<Venue>> {
    let mut stmt = conn.prepare(&format!("SELECT {VENUE_COLUMNS} FROM venues ORDER BY name ASC"))?;
    let rows = stmt.query_map([], parse_venue_row)?;

    let mut venues = vec![];
    for row in rows {
        venues.push(row?);
    }
    Ok(venues)
}

// ── Add-ons ──

fn parse_addon_row(row: &rusqlite::Row) -> rusqlite::Result<AddOn> {
    Ok(AddOn {
        id: row.get(0)?,
        venue_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: parse_decimal(&row.get::<_, String>(4)?),
        created_at: parse_dt(&row.get::<_, String>(5)?),
    })
}

const ADDON_COLUMNS: &str = "id, venue_id, name, description, price, created_at";

pub fn insert_addon(conn: &Connection, addon: &AddOn) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO addons (id, venue_id, name, description, price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            addon.id,
            addon.venue_id,
            addon.name,
            addon.description,
            addon.price.to_string(),
            format_dt(&addon.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_addon(conn: &Connection, id: &str) -> rusqlite::Result<Option<AddOn>> {
    let result = conn.query_row(
        &format!("SELECT {ADDON_COLUMNS} FROM addons WHERE id = ?1"),
        params![id],
        parse_addon_row,
    );

    match result {
        Ok(addon) => Ok(Some(addon)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn list_addons_for_venue(conn: &Connection, venue_id: &str) -> rusqlite::Result<Vec<AddOn>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ADDON_COLUMNS} FROM addons WHERE venue_id = ?1 ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map(params![venue_id], parse_addon_row)?;

    let mut addons = vec![];
    for row in rows {
        addons.push(row?);
    }
    Ok(addons)
}

pub fn get_booking_addons(conn: &Connection, booking_id: &str) -> rusqlite::Result<Vec<AddOn>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.venue_id, a.name, a.description, a.price, a.created_at
         FROM addons a
         INNER JOIN booking_addons ba ON ba.addon_id = a.id
         WHERE ba.booking_id = ?1
         ORDER BY a.name ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], parse_addon_row)?;

    let mut addons = vec![];
    for row in rows {
        addons.push(row?);
    }
    Ok(addons)
}

/// Replace a booking's add-on set. Callers pass an already-deduplicated list
/// and run this inside the transition's transaction.
pub fn set_booking_addons(
    conn: &Connection,
    booking_id: &str,
    addon_ids: &[String],
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM booking_addons WHERE booking_id = ?1",
        params![booking_id],
    )?;
    for addon_id in addon_ids {
        conn.execute(
            "INSERT INTO booking_addons (booking_id, addon_id) VALUES (?1, ?2)",
            params![booking_id, addon_id],
        )?;
    }
    Ok(())
}

// ── Bookings ──

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let approved_at: Option<String> = row.get(8)?;
    Ok(Booking {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        venue_id: row.get(2)?,
        start_at: parse_dt(&row.get::<_, String>(3)?),
        end_at: parse_dt(&row.get::<_, String>(4)?),
        notes: row.get(5)?,
        status: BookingStatus::parse(&row.get::<_, String>(6)?),
        approved_by: row.get(7)?,
        approved_at: approved_at.map(|s| parse_dt(&s)),
        created_at: parse_dt(&row.get::<_, String>(9)?),
        updated_at: parse_dt(&row.get::<_, String>(10)?),
    })
}

const BOOKING_COLUMNS: &str =
    "id, owner_id, venue_id, start_at, end_at, notes, status, approved_by, approved_at, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, owner_id, venue_id, start_at, end_at, notes, status, approved_by, approved_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.owner_id,
            booking.venue_id,
            format_dt(&booking.start_at),
            format_dt(&booking.end_at),
            booking.notes,
            booking.status.as_str(),
            booking.approved_by,
            booking.approved_at.as_ref().map(format_dt),
            format_dt(&booking.created_at),
            format_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> rusqlite::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    );

    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Persist a transition's outcome: status plus the approval metadata that
/// travels with it.
pub fn update_booking_state(conn: &Connection, booking: &Booking) -> rusqlite::Result<bool> {
    let now = format_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, approved_by = ?2, approved_at = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            booking.status.as_str(),
            booking.approved_by,
            booking.approved_at.as_ref().map(format_dt),
            now,
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

fn status_placeholders(statuses: &[BookingStatus], offset: usize) -> String {
    (0..statuses.len())
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn list_bookings_for_owner(
    conn: &Connection,
    owner_id: &str,
    statuses: &[BookingStatus],
) -> rusqlite::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = if statuses.is_empty() {
        (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE owner_id = ?1 ORDER BY start_at DESC"
            ),
            vec![Box::new(owner_id.to_string()) as Box<dyn rusqlite::types::ToSql>],
        )
    } else {
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(owner_id.to_string())];
        for status in statuses {
            params_vec.push(Box::new(status.as_str().to_string()));
        }
        (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE owner_id = ?1 AND status IN ({}) ORDER BY start_at DESC",
                status_placeholders(statuses, 2)
            ),
            params_vec,
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Global listing for the admin view. Earliest start first so the approval
/// queue surfaces the most urgent requests.
pub fn list_all_bookings(
    conn: &Connection,
    statuses: &[BookingStatus],
) -> rusqlite::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = if statuses.is_empty() {
        (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY start_at ASC"),
            vec![],
        )
    } else {
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];
        for status in statuses {
            params_vec.push(Box::new(status.as_str().to_string()));
        }
        (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status IN ({}) ORDER BY start_at ASC",
                status_placeholders(statuses, 1)
            ),
            params_vec,
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Count non-cancelled bookings on the venue whose range intersects
/// [start, end). Adjacent ranges (end == start) do not overlap.
pub fn count_overlapping_bookings(
    conn: &Connection,
    venue_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE venue_id = ?1 AND status != 'cancelled' AND start_at < ?2 AND end_at > ?3",
        params![venue_id, format_dt(end), format_dt(start)],
        |row| row.get(0),
    )
}

// ── Payments ──

fn parse_payment_row(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        method: PaymentMethod::parse(&row.get::<_, String>(2)?).unwrap_or(PaymentMethod::Qris),
        status: PaymentStatus::parse(&row.get::<_, String>(3)?),
        total_amount: parse_decimal(&row.get::<_, String>(4)?),
        deposit_amount: parse_decimal(&row.get::<_, String>(5)?),
        reference_code: row.get(6)?,
        created_at: parse_dt(&row.get::<_, String>(7)?),
        updated_at: parse_dt(&row.get::<_, String>(8)?),
    })
}

const PAYMENT_COLUMNS: &str =
    "id, booking_id, method, status, total_amount, deposit_amount, reference_code, created_at, updated_at";

pub fn insert_payment(conn: &Connection, payment: &Payment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, method, status, total_amount, deposit_amount, reference_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            payment.id,
            payment.booking_id,
            payment.method.as_str(),
            payment.status.as_str(),
            payment.total_amount.to_string(),
            payment.deposit_amount.to_string(),
            payment.reference_code,
            format_dt(&payment.created_at),
            format_dt(&payment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> rusqlite::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1"),
        params![booking_id],
        parse_payment_row,
    );

    match result {
        Ok(payment) => Ok(Some(payment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn update_payment_amount(
    conn: &Connection,
    payment_id: &str,
    total_amount: &Decimal,
) -> rusqlite::Result<()> {
    let now = format_dt(&Utc::now().naive_utc());
    conn.execute(
        "UPDATE payments SET total_amount = ?1, updated_at = ?2 WHERE id = ?3",
        params![total_amount.to_string(), now, payment_id],
    )?;
    Ok(())
}

pub fn update_payment_status(
    conn: &Connection,
    payment_id: &str,
    status: PaymentStatus,
    method: Option<PaymentMethod>,
) -> rusqlite::Result<()> {
    let now = format_dt(&Utc::now().naive_utc());
    match method {
        Some(method) => conn.execute(
            "UPDATE payments SET status = ?1, method = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), method.as_str(), now, payment_id],
        )?,
        None => conn.execute(
            "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, payment_id],
        )?,
    };
    Ok(())
}

// ── Reviews ──

pub fn upsert_review(conn: &Connection, review: &Review) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, user_id, venue_id, rating, comment, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, venue_id) DO UPDATE SET
           rating = excluded.rating,
           comment = excluded.comment,
           updated_at = excluded.updated_at",
        params![
            review.id,
            review.user_id,
            review.venue_id,
            review.rating,
            review.comment,
            format_dt(&review.created_at),
            format_dt(&review.updated_at),
        ],
    )?;
    Ok(())
}

pub fn list_reviews_for_venue(conn: &Connection, venue_id: &str) -> rusqlite::Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, venue_id, rating, comment, created_at, updated_at
         FROM reviews WHERE venue_id = ?1 ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![venue_id], |row| {
        Ok(Review {
            id: row.get(0)?,
            user_id: row.get(1)?,
            venue_id: row.get(2)?,
            rating: row.get(3)?,
            comment: row.get(4)?,
            created_at: parse_dt(&row.get::<_, String>(5)?),
            updated_at: parse_dt(&row.get::<_, String>(6)?),
        })
    })?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row?);
    }
    Ok(reviews)
}
