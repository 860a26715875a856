use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Review;
use crate::state::AppState;

// POST /api/venues/:id/reviews
#[derive(Deserialize)]
pub struct SubmitReviewRequest {
    pub actor_id: String,
    pub rating: i64,
    pub comment: String,
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<String>,
    Json(body): Json<SubmitReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !(1..=5).contains(&body.rating) {
        return Err(AppError::invalid("rating", "rating must be between 1 and 5"));
    }

    let db = state.db.lock().unwrap();
    let actor = super::resolve_actor(&db, &body.actor_id)?;
    let venue = queries::get_venue(&db, &venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {venue_id}")))?;

    // One review per user and venue; resubmitting replaces the old one.
    let now = Utc::now().naive_utc();
    let review = Review {
        id: Uuid::new_v4().to_string(),
        user_id: actor.id,
        venue_id: venue.id,
        rating: body.rating,
        comment: body.comment,
        created_at: now,
        updated_at: now,
    };
    queries::upsert_review(&db, &review)?;

    Ok((StatusCode::CREATED, Json(review)))
}

// GET /api/venues/:id/reviews
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let venue = queries::get_venue(&db, &venue_id)?
        .ok_or_else(|| AppError::NotFound(format!("venue {venue_id}")))?;
    let reviews = queries::list_reviews_for_venue(&db, &venue.id)?;

    Ok(Json(serde_json::json!({ "reviews": reviews })))
}
