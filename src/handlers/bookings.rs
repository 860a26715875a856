use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::errors::{AppError, FieldError};
use crate::models::{BookingStatus, PaymentMethod};
use crate::services::booking::{self, CreateBookingInput};
use crate::services::directory;
use crate::state::AppState;

fn parse_request_dt(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub owner_id: String,
    pub venue_id: String,
    pub start_at: String,
    pub end_at: String,
    #[serde(default)]
    pub addon_ids: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.owner_id)?;

    let mut fields = vec![];
    let start_at = parse_request_dt(&body.start_at);
    if start_at.is_none() {
        fields.push(FieldError::new("start_at", "invalid datetime"));
    }
    let end_at = parse_request_dt(&body.end_at);
    if end_at.is_none() {
        fields.push(FieldError::new("end_at", "invalid datetime"));
    }
    let (Some(start_at), Some(end_at)) = (start_at, end_at) else {
        return Err(AppError::Validation(fields));
    };

    let input = CreateBookingInput {
        venue_id: body.venue_id,
        start_at,
        end_at,
        addon_ids: body.addon_ids,
        notes: body.notes,
    };
    let created = booking::create_booking(&mut db, &state.config, &actor, input)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "booking_id": created.id,
            "status": created.status.as_str(),
        })),
    ))
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor_id: String,
}

// POST /api/bookings/:id/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let booking = booking::approve_booking(&mut db, &state.config, &actor, &id)?;

    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "approved_by": booking.approved_by,
    })))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let booking = booking::cancel_booking(&mut db, &state.config, &actor, &id)?;

    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
    })))
}

// POST /api/bookings/:id/pay
#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub actor_id: String,
    pub method: String,
}

pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let method = PaymentMethod::parse(&body.method)
        .ok_or_else(|| AppError::invalid("method", format!("unknown payment method: {}", body.method)))?;

    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let (booking, payment) = booking::confirm_payment(&mut db, &state.config, &actor, &id, method)?;

    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "payment": directory::PaymentSummary::from(payment),
    })))
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let booking = booking::complete_booking(&mut db, &actor, &id)?;

    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
    })))
}

// POST /api/bookings/:id/addons
#[derive(Deserialize)]
pub struct SetAddonsRequest {
    pub actor_id: String,
    #[serde(default)]
    pub addon_ids: Vec<String>,
}

pub async fn set_addons(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetAddonsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let (booking, costs) =
        booking::set_addons(&mut db, &state.config, &actor, &id, &body.addon_ids)?;

    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.as_str(),
        "base_cost": costs.base_cost,
        "addons_total": costs.addons_total,
        "total_cost": costs.total_cost,
    })))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub actor_id: String,
    pub owner_id: Option<String>,
    pub status: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &query.actor_id)?;

    let statuses: Vec<BookingStatus> = query
        .status
        .as_deref()
        .unwrap_or("")
        .split(',')
        .filter(|s| !s.is_empty())
        .map(BookingStatus::parse)
        .collect();

    let bookings = match query.owner_id {
        Some(owner_id) => {
            if owner_id != actor.id && !actor.is_admin {
                return Err(AppError::Forbidden(
                    "cannot list another user's bookings".to_string(),
                ));
            }
            directory::list_for_owner(&db, &owner_id, &statuses)?
        }
        None => {
            if !actor.is_admin {
                return Err(AppError::Forbidden(
                    "only administrators can list all bookings".to_string(),
                ));
            }
            directory::list_all(&db, &statuses)?
        }
    };

    Ok(Json(serde_json::json!({ "bookings": bookings })))
}
