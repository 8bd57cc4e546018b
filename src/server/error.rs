// 错误到 HTTP 响应的映射

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::explorer::{ExplorerError, ExplorerErrorCode};

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// 错误码对应的 HTTP 状态码
pub fn status_for(code: ExplorerErrorCode) -> StatusCode {
    match code {
        ExplorerErrorCode::OutOfBounds => StatusCode::FORBIDDEN,
        ExplorerErrorCode::RootProtected => StatusCode::FORBIDDEN,
        ExplorerErrorCode::NotFound => StatusCode::NOT_FOUND,
        ExplorerErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
        ExplorerErrorCode::InvalidFileName => StatusCode::BAD_REQUEST,
        ExplorerErrorCode::EmptySelection => StatusCode::BAD_REQUEST,
        ExplorerErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ExplorerErrorCode::ArchiveTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        // 部分成功的结果以 200 + 非零业务码返回，这里只在被当作错误直接返回时使用
        ExplorerErrorCode::PartialArchive => StatusCode::OK,
        ExplorerErrorCode::PartialDelete => StatusCode::OK,
        ExplorerErrorCode::WriteError => StatusCode::INTERNAL_SERVER_ERROR,
        ExplorerErrorCode::ReadFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ExplorerErrorCode::ArchiveFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ExplorerErrorCode::TaskFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ExplorerError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for(self.code);

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        } else {
            tracing::debug!("请求被拒绝: {}", self);
        }

        let body = Json(ErrorResponse {
            code: self.code.code(),
            message: self.message,
            path: self.path,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ExplorerErrorCode::OutOfBounds), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ExplorerErrorCode::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ExplorerErrorCode::ArchiveTooLarge),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(ExplorerErrorCode::WriteError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_into_response() {
        let response = ExplorerError::new(ExplorerErrorCode::EmptySelection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
