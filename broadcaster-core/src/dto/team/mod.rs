//! Team DTOs

use serde::{Deserialize, Serialize};

/// Entry of `GET /api/v1/teams`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}
