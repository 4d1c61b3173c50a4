/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

/// Service identifier sent with every login (REST and feed).
pub const SERVICE: &str = "NEXTAPI";

/// Body of `POST login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub service: String,
    /// Base64 RSA ciphertext of the credential triple
    pub auth: String,
}

impl LoginRequest {
    pub fn new(auth: impl Into<String>) -> Self {
        Self {
            service: SERVICE.to_string(),
            auth: auth.into(),
        }
    }
}
