use rust_decimal::Decimal;

use crate::models::{AddOn, Booking, Venue};

#[derive(Debug, Clone)]
pub struct CostBreakdown {
    pub duration_hours: i64,
    pub base_cost: Decimal,
    pub addons_total: Decimal,
    pub total_cost: Decimal,
}

/// Derive a booking's cost from the venue's current rate and the current
/// add-on prices. There is no price snapshot: repricing an add-on changes
/// every non-terminal booking's total the next time this runs.
pub fn cost_breakdown(venue: &Venue, booking: &Booking, addons: &[AddOn]) -> CostBreakdown {
    let duration_hours = booking.duration_hours();
    let base_cost = venue.hourly_total(duration_hours);
    let addons_total = addons.iter().fold(Decimal::ZERO, |acc, a| acc + a.price);

    CostBreakdown {
        duration_hours,
        base_cost,
        addons_total,
        total_cost: base_cost + addons_total,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::models::BookingStatus;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn venue(rate: &str) -> Venue {
        Venue {
            id: "v1".to_string(),
            slug: "court-one".to_string(),
            name: "Court One".to_string(),
            category: "Futsal".to_string(),
            city: "Jakarta".to_string(),
            hourly_rate: Decimal::from_str(rate).unwrap(),
            capacity: 10,
            open_time: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            close_time: chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            created_at: dt("2024-01-01 00:00"),
            updated_at: dt("2024-01-01 00:00"),
        }
    }

    fn booking(start: &str, end: &str) -> Booking {
        Booking {
            id: "b1".to_string(),
            owner_id: "u1".to_string(),
            venue_id: "v1".to_string(),
            start_at: dt(start),
            end_at: dt(end),
            notes: None,
            status: BookingStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: dt("2024-01-01 00:00"),
            updated_at: dt("2024-01-01 00:00"),
        }
    }

    fn addon(price: &str) -> AddOn {
        AddOn {
            id: "a1".to_string(),
            venue_id: "v1".to_string(),
            name: "Racket".to_string(),
            description: None,
            price: Decimal::from_str(price).unwrap(),
            created_at: dt("2024-01-01 00:00"),
        }
    }

    #[test]
    fn test_duration_truncates_to_whole_hours() {
        // 90 minutes bills as one hour, not 1.5
        let b = booking("2024-06-01 09:00", "2024-06-01 10:30");
        let costs = cost_breakdown(&venue("100000.00"), &b, &[]);
        assert_eq!(costs.duration_hours, 1);
        assert_eq!(costs.base_cost, Decimal::from_str("100000.00").unwrap());
    }

    #[test]
    fn test_sub_hour_booking_bills_zero_hours() {
        let b = booking("2024-06-01 09:00", "2024-06-01 09:45");
        let costs = cost_breakdown(&venue("100000.00"), &b, &[]);
        assert_eq!(costs.duration_hours, 0);
        assert_eq!(costs.base_cost, Decimal::ZERO);
    }

    #[test]
    fn test_base_plus_addons() {
        // 3 hours at 150000/hr with one 25000 add-on
        let b = booking("2024-06-01 09:00", "2024-06-01 12:00");
        let costs = cost_breakdown(&venue("150000.00"), &b, &[addon("25000.00")]);
        assert_eq!(costs.duration_hours, 3);
        assert_eq!(costs.base_cost, Decimal::from_str("450000.00").unwrap());
        assert_eq!(costs.addons_total, Decimal::from_str("25000.00").unwrap());
        assert_eq!(costs.total_cost, Decimal::from_str("475000.00").unwrap());
    }

    #[test]
    fn test_no_addons_totals_zero() {
        let b = booking("2024-06-01 09:00", "2024-06-01 11:00");
        let costs = cost_breakdown(&venue("120000.00"), &b, &[]);
        assert_eq!(costs.addons_total, Decimal::ZERO);
        assert_eq!(costs.total_cost, Decimal::from_str("240000.00").unwrap());
    }
}
