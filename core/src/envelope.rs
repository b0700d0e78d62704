use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CODE_OK: i64 = 0;
pub const MSG_OK: &str = "OK";

pub const CODE_AUTH_FAILED: i64 = 9999401001;
pub const MSG_AUTH_FAILED: &str = "Auth failed";
pub const CODE_STORAGE_FAILED: i64 = 9999500001;
pub const MSG_STORAGE_FAILED: &str = "Storage failed";

pub const CODE_GENERAL_FAILED: i64 = 9999999999;
pub const MSG_GENERAL_FAILED: &str = "General failed";

/// Structured response body shared by every JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub code: i64,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Successful envelope wrapping `data`
    pub fn wrap(data: Option<Value>) -> Self {
        Self {
            code: CODE_OK,
            status: 200,
            timestamp: Utc::now(),
            message: MSG_OK.to_string(),
            request_id: None,
            data,
        }
    }

    pub fn auth_failed() -> Self {
        Self::wrap(None)
            .with_status(401)
            .with_code(CODE_AUTH_FAILED)
            .with_message(MSG_AUTH_FAILED)
    }

    pub fn storage_failed() -> Self {
        Self::wrap(None)
            .with_status(500)
            .with_code(CODE_STORAGE_FAILED)
            .with_message(MSG_STORAGE_FAILED)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}
