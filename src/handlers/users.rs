use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Actor;
use crate::state::AppState;

// POST /api/users
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::invalid("name", "name must not be empty"));
    }

    let user = Actor {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        is_admin: body.is_admin,
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_user(&db, &user)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": user.id, "name": user.name, "is_admin": user.is_admin })),
    ))
}
