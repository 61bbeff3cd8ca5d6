//! JSON envelope returned by every API handler:
//! `{ "data": ..., "error": { "Id", "Title", "Detail", "Status" }, "meta": { "total_count" } }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    pub id: String,
    pub title: String,
    pub detail: String,
    pub status: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Meta {
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Output<T> {
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
    pub meta: Option<Meta>,
}

impl<T> Output<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn list(data: T, total_count: u64) -> Self {
        Self {
            data: Some(data),
            error: None,
            meta: Some(Meta { total_count }),
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            data: None,
            error: Some(error),
            meta: None,
        }
    }
}

impl Output<()> {
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
            meta: None,
        }
    }
}

/// Envelope paired with an explicit status, for handlers that create resources.
pub struct Created<T>(pub Output<T>);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_uses_pascal_case_keys() {
        let out = Output::<()>::failure(ErrorBody {
            id: "missing_param".into(),
            title: "Missing Parameter".into(),
            detail: "missing parameter: Id".into(),
            status: 400,
        });
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["error"]["Id"], "missing_param");
        assert_eq!(json["error"]["Status"], 400);
        assert!(json["data"].is_null());
        assert!(json["meta"].is_null());
    }

    #[test]
    fn list_carries_total_count() {
        let out = Output::list(vec![1, 2, 3], 3);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["meta"]["total_count"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
    }
}
