//! 统一错误类型
//!
//! 注册中心与负载均衡共用的错误定义，错误会以 JSON 形式返回给调用方

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Pulse Registry 统一错误类型
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// 实例不存在（标识未知，或注销请求来源地址与注册地址不一致）
    #[error("NoSuchInstance")]
    NoSuchInstance,

    /// 传输层错误（超时、连接被拒绝等）
    #[error("transport error: {0}")]
    Transport(String),

    /// 请求格式错误（在进入注册逻辑前被拒绝）
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// 配置错误
    #[error("config error: {0}")]
    Config(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// 创建传输层错误
    pub fn transport(msg: impl Into<String>) -> Self {
        RegistryError::Transport(msg.into())
    }

    /// 创建请求格式错误
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        RegistryError::InvalidRequest(msg.into())
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        RegistryError::Config(msg.into())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        RegistryError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(e: std::io::Error) -> Self {
        RegistryError::Io(e.to_string())
    }
}

/// 注册中心的错误应答：`{"error": "..."}` 加对应状态码
impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistryError::NoSuchInstance => StatusCode::NOT_FOUND,
            RegistryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
