use serde::Serialize;
use std::collections::HashMap;

use crate::metrics::RouteMetrics;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub totals: RouteMetrics,
    pub routes: HashMap<String, RouteMetrics>,
}
