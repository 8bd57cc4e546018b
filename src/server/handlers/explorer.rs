// 文件浏览 API 处理器

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::explorer::{
    ArchiveOutcome, DeleteReport, Entry, ExplorerError, ExplorerErrorCode, GotoRequest,
    GotoResponse, ListRequest, Listing, PathQuery, SelectionRequest,
};
use crate::server::state::AppState;

use super::ApiResponse;

/// 响应头：归档中被跳过的条目数
pub const ARCHIVE_SKIPPED_HEADER: &str = "x-archive-skipped";
/// 响应头：归档中成功写入的文件数
pub const ARCHIVE_ENTRIES_HEADER: &str = "x-archive-entries";

/// 在阻塞线程池中执行文件系统操作
async fn run_blocking<T, F>(f: F) -> Result<T, ExplorerError>
where
    F: FnOnce() -> Result<T, ExplorerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        ExplorerError::new(ExplorerErrorCode::TaskFailed).with_message(format!("后台任务执行失败: {}", e))
    })?
}

/// GET /api/v1/fs/list?path=/&page=0&page_size=500
/// 列出目录内容
pub async fn list_directory(
    State(app_state): State<AppState>,
    Query(req): Query<ListRequest>,
) -> Result<Json<ApiResponse<Listing>>, ExplorerError> {
    let service = app_state.explorer.clone();
    let listing = run_blocking(move || service.list(&req)).await?;
    Ok(Json(ApiResponse::success(listing)))
}

/// GET /api/v1/fs/goto?path=/srv/files/documents
/// 路径跳转（直达路径）
pub async fn goto_path(
    State(app_state): State<AppState>,
    Query(req): Query<GotoRequest>,
) -> Result<Json<ApiResponse<GotoResponse>>, ExplorerError> {
    let service = app_state.explorer.clone();
    let response = run_blocking(move || Ok(service.goto(&req))).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/fs/info?path=/srv/files/a.txt
/// 获取单个条目信息
pub async fn entry_info(
    State(app_state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ApiResponse<Entry>>, ExplorerError> {
    let service = app_state.explorer.clone();
    let entry = run_blocking(move || service.entry_info(&query.path)).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// POST /api/v1/fs/upload (multipart/form-data)
///
/// 字段 `dir` 为目标目录（缺省为根目录），其余带文件名的字段为上传文件
pub async fn upload_files(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<Entry>>>, ExplorerError> {
    let mut target_dir = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await.map_err(invalid_multipart)?;
                files.push((file_name, data));
            }
            None if field.name() == Some("dir") => {
                target_dir = field.text().await.map_err(invalid_multipart)?;
            }
            None => {}
        }
    }

    info!("API: 上传 {} 个文件到 {:?}", files.len(), target_dir);

    let service = app_state.explorer.clone();
    let entries = run_blocking(move || service.upload_batch(&target_dir, &files)).await?;

    Ok(Json(ApiResponse::success(entries)))
}

/// POST /api/v1/fs/archive  {"paths": [...]}
/// 将选中的文件/文件夹打包为 ZIP 并作为附件返回
pub async fn archive_selection(
    State(app_state): State<AppState>,
    Json(req): Json<SelectionRequest>,
) -> Result<Response, ExplorerError> {
    info!("API: 打包下载 {} 个条目", req.paths.len());

    let service = app_state.explorer.clone();
    let outcome = run_blocking(move || service.archive(&req.paths)).await?;

    if let Some(partial) = outcome.partial_error() {
        tracing::warn!("{}", partial);
    }

    archive_response(outcome)
}

/// POST /api/v1/fs/delete  {"paths": [...]}
/// 删除选中的文件/文件夹（不可恢复）
pub async fn delete_selection(
    State(app_state): State<AppState>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<ApiResponse<DeleteReport>>, ExplorerError> {
    info!("API: 删除 {} 个条目", req.paths.len());

    let service = app_state.explorer.clone();
    let report = run_blocking(move || service.delete(&req.paths)).await?;

    let response = match report.partial_error() {
        Some(err) => ApiResponse::partial(err, report),
        None => ApiResponse::success(report),
    };
    Ok(Json(response))
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> ExplorerError {
    ExplorerError::new(ExplorerErrorCode::InvalidRequest).with_message(format!("读取上传数据失败: {}", e))
}

/// 以流的方式返回归档临时文件
fn archive_response(outcome: ArchiveOutcome) -> Result<Response, ExplorerError> {
    let skipped = outcome.skipped_count();
    let entries = outcome.entries_added;
    let disposition = content_disposition(&outcome.file_name);

    let file = tokio::fs::File::from_std(outcome.file);
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(ARCHIVE_ENTRIES_HEADER, entries)
        .header(ARCHIVE_SKIPPED_HEADER, skipped)
        .body(body)
        .map_err(|e| {
            ExplorerError::new(ExplorerErrorCode::ArchiveFailed).with_message(format!("构建下载响应失败: {}", e))
        })
}

/// attachment 头：ASCII 回退名 + RFC 5987 编码的原始文件名
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}
