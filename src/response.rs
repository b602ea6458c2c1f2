//! Uniform success envelope for API responses.
//!
//! Every endpoint answers `{success, status, message, data}`; list endpoints
//! nest `{items, pagination}` inside `data`.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::pagination::PaginationMeta;

#[derive(Debug, Serialize, ToSchema)]
pub struct Envelope<T: Serialize> {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = 200)]
    pub status: u16,
    #[schema(example = "OK")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            status: StatusCode::OK.as_u16(),
            message: "OK".to_string(),
            data: Some(data),
        })
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self {
                success: true,
                status: StatusCode::CREATED.as_u16(),
                message: "Created".to_string(),
                data: Some(data),
            }),
        )
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            status: StatusCode::OK.as_u16(),
            message: message.into(),
            data: None,
        })
    }
}

/// Documentation stand-in for envelopes that carry no `data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageEnvelope {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = 200)]
    pub status: u16,
    #[schema(example = "Deleted")]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, pagination: PaginationMeta) -> Self {
        Self { items, pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let Json(envelope) = Envelope::ok(vec![1, 2, 3]);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], 200);
        assert_eq!(json["message"], "OK");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_message_envelope_omits_data() {
        let Json(envelope) = Envelope::message("Deleted");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["message"], "Deleted");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_created_envelope_status() {
        let (status, Json(envelope)) = Envelope::created("row");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(envelope.status, 201);
    }
}
