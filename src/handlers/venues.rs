use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, FieldError};
use crate::models::{AddOn, Venue};
use crate::state::AppState;

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_price(field: &'static str, raw: &str, fields: &mut Vec<FieldError>) -> Decimal {
    match Decimal::from_str(raw) {
        Ok(value) if value >= Decimal::ZERO => value,
        Ok(_) => {
            fields.push(FieldError::new(field, "must not be negative"));
            Decimal::ZERO
        }
        Err(_) => {
            fields.push(FieldError::new(field, "invalid decimal amount"));
            Decimal::ZERO
        }
    }
}

#[derive(Serialize)]
pub struct VenueDetail {
    #[serde(flatten)]
    pub venue: Venue,
    pub addons: Vec<AddOn>,
}

fn venue_detail(conn: &rusqlite::Connection, venue: Venue) -> Result<VenueDetail, AppError> {
    let addons = queries::list_addons_for_venue(conn, &venue.id)?;
    Ok(VenueDetail { venue, addons })
}

// GET /api/venues
pub async fn list_venues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let venues = queries::list_venues(&db)?;

    let mut details = Vec::with_capacity(venues.len());
    for venue in venues {
        details.push(venue_detail(&db, venue)?);
    }

    Ok(Json(serde_json::json!({ "venues": details })))
}

// GET /api/venues/:id
pub async fn get_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VenueDetail>, AppError> {
    let db = state.db.lock().unwrap();
    let venue =
        queries::get_venue(&db, &id)?.ok_or_else(|| AppError::NotFound(format!("venue {id}")))?;
    Ok(Json(venue_detail(&db, venue)?))
}

// POST /api/venues
#[derive(Deserialize)]
pub struct NewAddOnRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
}

#[derive(Deserialize)]
pub struct CreateVenueRequest {
    pub actor_id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub category: String,
    pub city: String,
    pub hourly_rate: String,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub addons: Vec<NewAddOnRequest>,
}

pub async fn create_venue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateVenueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can manage venues".to_string(),
        ));
    }

    let mut fields = vec![];
    if body.name.trim().is_empty() {
        fields.push(FieldError::new("name", "name must not be empty"));
    }
    let hourly_rate = parse_price("hourly_rate", &body.hourly_rate, &mut fields);

    let open_time = match body.open_time.as_deref() {
        Some(raw) => parse_time_of_day(raw).unwrap_or_else(|| {
            fields.push(FieldError::new("open_time", "invalid time of day"));
            NaiveTime::default()
        }),
        None => NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
    };
    let close_time = match body.close_time.as_deref() {
        Some(raw) => parse_time_of_day(raw).unwrap_or_else(|| {
            fields.push(FieldError::new("close_time", "invalid time of day"));
            NaiveTime::default()
        }),
        None => NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
    };

    let mut addon_prices = Vec::with_capacity(body.addons.len());
    for addon in &body.addons {
        addon_prices.push(parse_price("addons", &addon.price, &mut fields));
    }
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }

    let now = Utc::now().naive_utc();
    let venue = Venue {
        id: Uuid::new_v4().to_string(),
        slug: body.slug.unwrap_or_else(|| slugify(&body.name)),
        name: body.name,
        category: body.category,
        city: body.city,
        hourly_rate,
        capacity: body.capacity.unwrap_or(1).max(1),
        open_time,
        close_time,
        created_at: now,
        updated_at: now,
    };
    queries::insert_venue(&db, &venue)?;

    for (addon, price) in body.addons.iter().zip(addon_prices) {
        let record = AddOn {
            id: Uuid::new_v4().to_string(),
            venue_id: venue.id.clone(),
            name: addon.name.clone(),
            description: addon.description.clone(),
            price,
            created_at: now,
        };
        queries::insert_addon(&db, &record)?;
    }

    tracing::info!(venue_id = %venue.id, slug = %venue.slug, "venue created");
    let detail = venue_detail(&db, venue)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

// PUT /api/venues/:id
#[derive(Deserialize)]
pub struct UpdateVenueRequest {
    pub actor_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
}

pub async fn update_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateVenueRequest>,
) -> Result<Json<VenueDetail>, AppError> {
    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can manage venues".to_string(),
        ));
    }

    let mut venue =
        queries::get_venue(&db, &id)?.ok_or_else(|| AppError::NotFound(format!("venue {id}")))?;

    let mut fields = vec![];
    if let Some(name) = body.name {
        venue.name = name;
    }
    if let Some(category) = body.category {
        venue.category = category;
    }
    if let Some(city) = body.city {
        venue.city = city;
    }
    if let Some(raw) = body.hourly_rate.as_deref() {
        venue.hourly_rate = parse_price("hourly_rate", raw, &mut fields);
    }
    if let Some(capacity) = body.capacity {
        venue.capacity = capacity.max(1);
    }
    if let Some(raw) = body.open_time.as_deref() {
        match parse_time_of_day(raw) {
            Some(t) => venue.open_time = t,
            None => fields.push(FieldError::new("open_time", "invalid time of day")),
        }
    }
    if let Some(raw) = body.close_time.as_deref() {
        match parse_time_of_day(raw) {
            Some(t) => venue.close_time = t,
            None => fields.push(FieldError::new("close_time", "invalid time of day")),
        }
    }
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }

    queries::update_venue(&db, &venue)?;
    Ok(Json(venue_detail(&db, venue)?))
}

// POST /api/venues/:id/addons
#[derive(Deserialize)]
pub struct AddAddonRequest {
    pub actor_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
}

pub async fn add_addon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AddAddonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can manage venues".to_string(),
        ));
    }

    let venue =
        queries::get_venue(&db, &id)?.ok_or_else(|| AppError::NotFound(format!("venue {id}")))?;

    let mut fields = vec![];
    let price = parse_price("price", &body.price, &mut fields);
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }

    let addon = AddOn {
        id: Uuid::new_v4().to_string(),
        venue_id: venue.id,
        name: body.name,
        description: body.description,
        price,
        created_at: Utc::now().naive_utc(),
    };
    queries::insert_addon(&db, &addon)?;

    Ok((StatusCode::CREATED, Json(addon)))
}

// DELETE /api/venues/:id
#[derive(Deserialize)]
pub struct DeleteVenueRequest {
    pub actor_id: String,
}

pub async fn delete_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DeleteVenueRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    if !actor.is_admin {
        return Err(AppError::Forbidden(
            "only administrators can manage venues".to_string(),
        ));
    }

    // Bookings, add-ons, and payments go with the venue (FK cascade).
    let removed = queries::delete_venue(&db, &id)?;
    if !removed {
        return Err(AppError::NotFound(format!("venue {id}")));
    }

    tracing::info!(venue_id = %id, "venue deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}
