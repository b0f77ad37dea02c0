use serde::Serialize;

use crate::data_capture::types::RequestSummary;

/// Message pushed to observers, e.g. `{"type": "new_request", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    NewRequest(RequestSummary),
}
