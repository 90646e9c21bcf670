//! `X-Device-Id` header extraction.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use forkreach_core::store::DeviceId;

use crate::error::ApiError;

pub const DEVICE_HEADER: &str = "x-device-id";

/// The caller's device id, if the header is present and non-blank.
pub fn device_from_headers(headers: &HeaderMap) -> Option<DeviceId> {
    headers
        .get(DEVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(DeviceId::parse)
}

/// Extractor that rejects requests without a device id with 400.
#[derive(Debug, Clone)]
pub struct Device(pub DeviceId);

impl<S: Send + Sync> FromRequestParts<S> for Device {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        device_from_headers(&parts.headers)
            .map(Device)
            .ok_or_else(|| ApiError::BadRequest("Missing X-Device-Id header".into()))
    }
}
