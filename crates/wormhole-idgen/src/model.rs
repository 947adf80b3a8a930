use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeResponse {
    pub id: u64,
    pub short_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
