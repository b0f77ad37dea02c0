use serde::Serialize;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub detail: String,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new("Request not found")
    }
}

/// Acknowledgement for delete operations and health checks.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Ack = Ack { ok: true };
}

/// Payload of `GET /` when no frontend is bundled.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub status: &'static str,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "http-intercepter",
            status: "running",
        }
    }
}
