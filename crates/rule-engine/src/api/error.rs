//! HTTP 层错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::error::{EngineError, StoreError};
use crate::validation::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("规则校验失败，共 {} 处错误", .0.len())]
    InvalidRule(Vec<FieldError>),
    #[error("规则不存在: {0}")]
    RuleNotFound(String),
    #[error(transparent)]
    Engine(EngineError),
    #[error("存储错误: {0}")]
    Store(StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidRule(_) => StatusCode::BAD_REQUEST,
            Self::RuleNotFound(_) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::UnknownTrigger(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidRule(_) => "INVALID_RULE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::Engine(e) => e.code(),
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::RuleNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => e.into(),
            other => Self::Engine(other),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 存储层细节只写日志
        let message = match &self {
            Self::Store(e) => {
                tracing::error!(error = %e, "规则存储操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let data = match &self {
            Self::InvalidRule(errors) => json!(errors),
            _ => Value::Null,
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": data
        });

        (status, axum::Json(body)).into_response()
    }
}
