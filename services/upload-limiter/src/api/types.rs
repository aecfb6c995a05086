use serde::{Deserialize, Serialize};

use crate::tracker::ProviderRecord;

/// Query parameters stay raw strings; handlers parse the numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordLimitParams {
    pub miner: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSizeParams {
    pub miner: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckLimitParams {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderRecord>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<serde_json::Value>,
}
