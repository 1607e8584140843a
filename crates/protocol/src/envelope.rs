use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{HEALTH_OK, SUCCESS_CODE};

/// Envelope wrapping every agent response: `{code, message, data}`.
///
/// `data` defaults to `null` so error bodies without a payload still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: T,
}

/// Why an envelope could not be turned into its payload.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("agent returned code {code}: {message}")]
    Agent { code: i64, message: String },

    #[error("unexpected payload shape: {0}")]
    Payload(#[from] serde_json::Error),
}

impl<T> ApiResponse<T> {
    /// Builds a successful envelope around `data`.
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: "success".into(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

impl ApiResponse<serde_json::Value> {
    /// Builds an error envelope with a `null` payload.
    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Checks the envelope code, then decodes `data` into `T`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, EnvelopeError> {
        if !self.is_success() {
            return Err(EnvelopeError::Agent {
                code: self.code,
                message: self.message,
            });
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

/// Payload of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl HealthData {
    pub fn is_ok(&self) -> bool {
        self.status == HEALTH_OK
    }
}
