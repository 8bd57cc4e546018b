// API处理器模块

pub mod explorer;

pub use explorer::*;

use serde::Serialize;

use crate::explorer::ExplorerError;

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    /// 部分成功：携带业务错误码，同时返回结果数据
    pub fn partial(err: ExplorerError, data: T) -> Self {
        Self {
            code: err.code.code(),
            message: err.message,
            data: Some(data),
        }
    }
}
