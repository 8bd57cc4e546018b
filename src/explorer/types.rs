// 文件浏览模块数据类型定义

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

// 重新导出配置模块中的 ExplorerConfig
pub use crate::config::ExplorerConfig;

/// 文件浏览错误码
/// 错误码范围：50001 - 50099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerErrorCode {
    /// 路径越出根目录
    OutOfBounds = 50001,
    /// 路径不存在
    NotFound = 50002,
    /// 不是目录
    NotADirectory = 50003,
    /// 写入失败
    WriteError = 50004,
    /// 未选择任何条目
    EmptySelection = 50005,
    /// 归档部分完成（有条目被跳过）
    PartialArchive = 50006,
    /// 删除部分完成（有条目失败）
    PartialDelete = 50007,
    /// 归档超出限制
    ArchiveTooLarge = 50008,
    /// 文件名无效
    InvalidFileName = 50009,
    /// 读取失败
    ReadFailed = 50010,
    /// 根目录受保护
    RootProtected = 50011,
    /// 归档生成失败
    ArchiveFailed = 50012,
    /// 请求格式无效
    InvalidRequest = 50013,
    /// 后台任务执行失败
    TaskFailed = 50014,
}

impl ExplorerErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::OutOfBounds => "路径不在允许访问的根目录范围内",
            Self::NotFound => "路径不存在",
            Self::NotADirectory => "指定路径不是目录",
            Self::WriteError => "写入文件失败",
            Self::EmptySelection => "未选择任何文件或文件夹",
            Self::PartialArchive => "部分条目无法读取，已跳过",
            Self::PartialDelete => "部分条目删除失败",
            Self::ArchiveTooLarge => "选中内容超出归档大小限制",
            Self::InvalidFileName => "文件名无效",
            Self::ReadFailed => "读取失败",
            Self::RootProtected => "不允许删除根目录",
            Self::ArchiveFailed => "生成压缩包失败",
            Self::InvalidRequest => "请求格式无效",
            Self::TaskFailed => "后台任务执行失败",
        }
    }
}

/// 文件浏览错误
#[derive(Debug)]
pub struct ExplorerError {
    pub code: ExplorerErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl ExplorerError {
    pub fn new(code: ExplorerErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl std::fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ExplorerError {}

/// 条目类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// 文件条目
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// 文件名
    pub name: String,
    /// 条目类型
    pub kind: EntryKind,
    /// 文件大小（文件夹为 None）
    pub size: Option<u64>,
    /// 可读的文件大小（文件夹为 "-"）
    #[serde(rename = "sizeLabel")]
    pub size_label: String,
    /// 修改时间 (ISO8601)
    #[serde(rename = "modifiedAt")]
    pub modified_at: String,
    /// 完整路径
    pub path: String,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// 列目录请求参数
#[derive(Debug, Deserialize)]
pub struct ListRequest {
    /// 目录路径（绝对路径或相对根目录；为空表示根目录）
    #[serde(default)]
    pub path: String,
    /// 页码，从 0 开始
    #[serde(default)]
    pub page: usize,
    /// 每页数量
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    500
}

impl ListRequest {
    /// 不分页地列出整个目录
    pub fn all(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            page: 0,
            page_size: usize::MAX,
        }
    }
}

/// 目录列表
#[derive(Debug, Serialize)]
pub struct Listing {
    /// 当前页条目（文件夹在前，同组内按名称不区分大小写升序）
    pub entries: Vec<Entry>,
    /// 当前路径
    #[serde(rename = "currentPath")]
    pub current_path: String,
    /// 父目录路径（位于根目录时为 None）
    #[serde(rename = "parentPath")]
    pub parent_path: Option<String>,
    /// 总条目数
    pub total: usize,
    /// 当前页码
    pub page: usize,
    /// 每页数量
    #[serde(rename = "pageSize")]
    pub page_size: usize,
    /// 是否还有更多
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// 路径跳转请求
#[derive(Debug, Deserialize)]
pub struct GotoRequest {
    pub path: String,
}

/// 路径跳转响应
#[derive(Debug, Serialize)]
pub struct GotoResponse {
    /// 路径是否有效
    pub valid: bool,
    /// 解析后的绝对路径
    #[serde(rename = "resolvedPath")]
    pub resolved_path: String,
    /// 目标类型
    pub kind: Option<EntryKind>,
    /// 错误信息
    pub message: Option<String>,
}

/// 单条路径查询参数
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// 选择集请求（归档、删除共用）
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub paths: Vec<String>,
}

/// 归档时被跳过的条目
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// 归档结果
///
/// `file` 是匿名临时文件，句柄释放后由操作系统回收
#[derive(Debug)]
pub struct ArchiveOutcome {
    pub file: File,
    /// 建议的下载文件名
    pub file_name: String,
    /// 成功写入的文件数
    pub entries_added: usize,
    /// 写入的原始字节数
    pub bytes_added: u64,
    /// 被跳过的条目
    pub skipped: Vec<SkippedEntry>,
}

impl ArchiveOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// 有条目被跳过时返回 PartialArchive 错误描述
    pub fn partial_error(&self) -> Option<ExplorerError> {
        if self.skipped.is_empty() {
            return None;
        }
        Some(
            ExplorerError::new(ExplorerErrorCode::PartialArchive)
                .with_message(format!("{} 个条目无法读取，已跳过", self.skipped.len())),
        )
    }
}

/// 单个路径的删除结果
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeleteOutcome {
    pub fn ok(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            success: true,
            code: None,
            reason: None,
        }
    }

    pub fn failed(path: impl Into<String>, err: &ExplorerError) -> Self {
        Self {
            path: path.into(),
            success: false,
            code: Some(err.code.code()),
            reason: Some(err.message.clone()),
        }
    }
}

/// 删除报告
#[derive(Debug, Clone, Serialize, Default)]
pub struct DeleteReport {
    pub results: Vec<DeleteOutcome>,
    pub deleted: usize,
    pub failed: usize,
}

impl DeleteReport {
    pub fn push(&mut self, outcome: DeleteOutcome) {
        if outcome.success {
            self.deleted += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    pub fn outcome_for(&self, path: &str) -> Option<&DeleteOutcome> {
        self.results.iter().find(|o| o.path == path)
    }

    /// 有条目删除失败时返回 PartialDelete 错误描述
    pub fn partial_error(&self) -> Option<ExplorerError> {
        if self.failed == 0 {
            return None;
        }
        Some(
            ExplorerError::new(ExplorerErrorCode::PartialDelete).with_message(format!(
                "已删除 {} 项，{} 项删除失败",
                self.deleted, self.failed
            )),
        )
    }
}

/// 将字节数格式化为可读字符串（1024 进制，最多两位小数）
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

    if size < 1024 {
        return format!("{} B", size);
    }

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// 路径显示用字符串
pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
