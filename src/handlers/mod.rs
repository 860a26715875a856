pub mod bookings;
pub mod health;
pub mod reviews;
pub mod users;
pub mod venues;

use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Actor;

/// Look up the calling user once at the boundary; every engine operation
/// receives the resolved actor with its capability flag.
pub(crate) fn resolve_actor(conn: &Connection, id: &str) -> Result<Actor, AppError> {
    queries::get_user(conn, id)?.ok_or_else(|| AppError::NotFound(format!("user {id}")))
}
