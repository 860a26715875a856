use serde::{Deserialize, Serialize};

/// A resolved caller identity. The capability flag is looked up once at the
/// request boundary and carried into every engine operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub is_admin: bool,
}
