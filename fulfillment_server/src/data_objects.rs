use std::fmt::Display;

use fulfillment_engine::db_types::WithdrawalStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of a cancellation request. The body may be omitted entirely, in which case a default reason is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelParams {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectParams {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawalSearch {
    #[serde(default)]
    pub status: Option<WithdrawalStatus>,
}
