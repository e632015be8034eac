//! Standard API response types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::stores::Notice;

/// `{data, meta?}`. `meta.notices` carries the toasts a store raised while
/// serving the request.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    pub fn with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            data,
            meta: Some(meta),
        }
    }

    /// Attach notices; no `meta` when there are none.
    pub fn with_notices(data: T, notices: Vec<Notice>) -> Self {
        if notices.is_empty() {
            Self::new(data)
        } else {
            Self::with_meta(data, json!({ "notices": notices }))
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 201 with a JSON body.
pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_land_in_meta_only_when_present() {
        let plain = serde_json::to_value(ApiResponse::with_notices(1, Vec::new())).unwrap();
        assert!(plain.get("meta").is_none());

        let noted = serde_json::to_value(ApiResponse::with_notices(
            vec!["a"],
            vec![Notice::success("成功", "保存しました")],
        ))
        .unwrap();
        assert_eq!(noted["data"][0], "a");
        assert_eq!(noted["meta"]["notices"][0]["title"], "成功");
    }
}
