// src/common/response.rs

use serde::Serialize;

/// Envelope padrão das respostas de sucesso: `{ success, data, message? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(ApiResponse::ok(json!({ "id": 1 }))).unwrap();
        assert_eq!(body, json!({ "success": true, "data": { "id": 1 } }));

        let body = serde_json::to_value(ApiResponse::with_message(3, "ok")).unwrap();
        assert_eq!(body["message"], "ok");
    }
}
