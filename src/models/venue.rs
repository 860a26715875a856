use chrono::{NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub category: String,
    pub city: String,
    pub hourly_rate: Decimal,
    pub capacity: i64,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Venue {
    pub fn hourly_total(&self, hours: i64) -> Decimal {
        self.hourly_rate * Decimal::from(hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOn {
    pub id: String,
    pub venue_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: NaiveDateTime,
}
