//! Token endpoint DTOs

use serde::{Deserialize, Serialize};

/// Successful response of the OAuth2 token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds; absent means the token does not expire.
    #[serde(default)]
    pub expires_in: Option<i64>,
}
