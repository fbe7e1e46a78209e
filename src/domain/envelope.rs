//! The `{success, data?, meta?, message?}` wrapper around every response.

use serde::{Deserialize, Serialize};

use super::pagination::PageMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: None,
            message: None,
        }
    }

    pub fn paged(data: T, meta: PageMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(meta),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success without a payload, e.g. after a delete.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            meta: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            meta: None,
            message: Some(message.into()),
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_omitted() {
        let json = serde_json::to_value(ApiResponse::<()>::error("Title is required")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "Title is required"})
        );
    }

    #[test]
    fn test_decodes_without_data() {
        let body: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success":true,"message":"Deleted"}"#).unwrap();
        assert!(body.success);
        assert!(body.data.is_none());
        assert_eq!(body.message.as_deref(), Some("Deleted"));
    }

    #[test]
    fn test_paged_carries_meta() {
        let meta = PageMeta {
            page: 1,
            limit: 10,
            total: 3,
            total_pages: 1,
        };
        let json = serde_json::to_value(ApiResponse::paged(vec![1, 2, 3], meta)).unwrap();
        assert_eq!(json["meta"]["total"], 3);
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    }
}
