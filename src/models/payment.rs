use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub reference_code: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Qris,
    Gopay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Qris => "qris",
            PaymentMethod::Gopay => "gopay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qris" => Some(PaymentMethod::Qris),
            "gopay" => Some(PaymentMethod::Gopay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Waiting,
    Confirmed,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Waiting => "waiting",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => PaymentStatus::Confirmed,
            "completed" => PaymentStatus::Completed,
            _ => PaymentStatus::Waiting,
        }
    }
}
